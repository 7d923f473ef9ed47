//! Test doubles for the engine.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use calbook_core::{
    Booking, BusyInterval, CalendarEvent, Credential, EventType, IntegrationCalendar, Owner, ProviderType,
    TimeWindow,
};
use calbook_providers::{
    AdapterRegistry, BoxFuture, EventResult, ProviderAdapter, ProviderError, ProviderErrorCode, ProviderResult,
};
use chrono::{DateTime, Utc};

use crate::error::{StoreError, StoreResult};
use crate::notify::{BookingNotification, NotificationGateway, NotifyError};
use crate::store::{InMemoryStore, Store};

/// An adapter call seen by a [`ScriptedAdapter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListCalendars,
    Busy(Vec<String>),
    Create { title: String },
    Update { external_id: String, start: DateTime<Utc> },
    Delete { external_id: String },
}

/// Tracks how many calls run at once across adapters.
#[derive(Debug, Default)]
pub struct Gauge {
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl Gauge {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.running.fetch_sub(1, Ordering::SeqCst);
    }
}

/// An adapter answering from a script and recording every call.
#[derive(Debug)]
pub struct ScriptedAdapter {
    provider: ProviderType,
    external_id: String,
    suppress: bool,
    meeting_url: Option<String>,
    fail: Option<ProviderErrorCode>,
    fail_delete: Option<ProviderErrorCode>,
    busy: Vec<BusyInterval>,
    calendars: Vec<IntegrationCalendar>,
    delay: Option<Duration>,
    gauge: Option<Arc<Gauge>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedAdapter {
    pub fn new(provider: ProviderType) -> Self {
        Self {
            external_id: format!("{}-event", provider.as_str()),
            provider,
            suppress: false,
            meeting_url: None,
            fail: None,
            fail_delete: None,
            busy: Vec::new(),
            calendars: Vec::new(),
            delay: None,
            gauge: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_external_id(mut self, id: &str) -> Self {
        self.external_id = id.to_string();
        self
    }

    pub fn suppressing(mut self) -> Self {
        self.suppress = true;
        self
    }

    pub fn with_meeting_url(mut self, url: &str) -> Self {
        self.meeting_url = Some(url.to_string());
        self
    }

    /// Every call fails with `code`.
    pub fn failing(mut self, code: ProviderErrorCode) -> Self {
        self.fail = Some(code);
        self
    }

    /// Only deletes fail with `code`.
    pub fn failing_delete(mut self, code: ProviderErrorCode) -> Self {
        self.fail_delete = Some(code);
        self
    }

    pub fn with_busy(mut self, busy: Vec<BusyInterval>) -> Self {
        self.busy = busy;
        self
    }

    pub fn with_calendars(mut self, calendars: Vec<IntegrationCalendar>) -> Self {
        self.calendars = calendars;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_gauge(mut self, gauge: Arc<Gauge>) -> Self {
        self.gauge = Some(gauge);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    async fn answer<T>(&self, call: Call, fail: Option<ProviderErrorCode>, value: T) -> ProviderResult<T> {
        self.calls.lock().unwrap().push(call);
        if let Some(gauge) = &self.gauge {
            gauge.enter();
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(gauge) = &self.gauge {
            gauge.leave();
        }
        match fail {
            Some(code) => Err(ProviderError::new(code, "scripted failure")),
            None => Ok(value),
        }
    }

    fn event_result(&self, external_id: &str) -> EventResult {
        let result = EventResult::new(external_id).with_meeting_url(self.meeting_url.clone());
        if self.suppress {
            result.suppressing_attendee_notification()
        } else {
            result
        }
    }
}

impl ProviderAdapter for ScriptedAdapter {
    fn provider_type(&self) -> &ProviderType {
        &self.provider
    }

    fn list_calendars(&self) -> BoxFuture<'_, ProviderResult<Vec<IntegrationCalendar>>> {
        Box::pin(self.answer(Call::ListCalendars, self.fail, self.calendars.clone()))
    }

    fn busy_intervals<'a>(
        &'a self,
        window: TimeWindow,
        selected: &'a [IntegrationCalendar],
    ) -> BoxFuture<'a, ProviderResult<Vec<BusyInterval>>> {
        let ids: Vec<String> = selected.iter().map(|c| c.external_id.clone()).collect();
        let busy: Vec<BusyInterval> = self
            .busy
            .iter()
            .filter(|b| window.overlaps(b.start, b.end))
            .copied()
            .collect();
        Box::pin(self.answer(Call::Busy(ids), self.fail, busy))
    }

    fn create_event<'a>(&'a self, event: &'a CalendarEvent) -> BoxFuture<'a, ProviderResult<EventResult>> {
        let call = Call::Create {
            title: event.title.clone(),
        };
        Box::pin(self.answer(call, self.fail, self.event_result(&self.external_id)))
    }

    fn update_event<'a>(
        &'a self,
        external_id: &'a str,
        event: &'a CalendarEvent,
    ) -> BoxFuture<'a, ProviderResult<EventResult>> {
        let call = Call::Update {
            external_id: external_id.to_string(),
            start: event.start_time,
        };
        Box::pin(self.answer(call, self.fail, self.event_result(external_id)))
    }

    fn delete_event<'a>(&'a self, external_id: &'a str) -> BoxFuture<'a, ProviderResult<()>> {
        let call = Call::Delete {
            external_id: external_id.to_string(),
        };
        Box::pin(self.answer(call, self.fail.or(self.fail_delete), ()))
    }
}

/// Registers each adapter as the only instance of its provider type.
pub fn registry_with(adapters: &[Arc<ScriptedAdapter>]) -> AdapterRegistry {
    let mut registry = AdapterRegistry::new();
    for scripted in adapters {
        let adapter: Arc<dyn ProviderAdapter> = scripted.clone();
        registry.register(
            scripted.provider.clone(),
            move |_: &Credential| -> ProviderResult<Arc<dyn ProviderAdapter>> { Ok(adapter.clone()) },
        );
    }
    registry
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    Organizer,
    Attendee,
}

/// A gateway remembering what it was asked to send.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(Recipient, BookingNotification)>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<(Recipient, BookingNotification)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn count(&self, recipient: Recipient) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(r, _)| *r == recipient)
            .count()
    }

    fn record(&self, recipient: Recipient, notification: &BookingNotification) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push((recipient, notification.clone()));
        if self.fail {
            return Err(NotifyError::new(notification.uid.clone(), "test", "mail server down"));
        }
        Ok(())
    }
}

impl NotificationGateway for RecordingNotifier {
    fn send_organizer<'a>(&'a self, notification: &'a BookingNotification) -> BoxFuture<'a, Result<(), NotifyError>> {
        Box::pin(async move { self.record(Recipient::Organizer, notification) })
    }

    fn send_attendee<'a>(&'a self, notification: &'a BookingNotification) -> BoxFuture<'a, Result<(), NotifyError>> {
        Box::pin(async move { self.record(Recipient::Attendee, notification) })
    }
}

/// An [`InMemoryStore`] whose booking writes can be made to fail.
#[derive(Debug, Default)]
pub struct FailingStore {
    pub inner: InMemoryStore,
    fail_writes: std::sync::atomic::AtomicBool,
}

impl FailingStore {
    pub fn new(inner: InMemoryStore) -> Self {
        Self {
            inner,
            fail_writes: Default::default(),
        }
    }

    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    fn check(&self) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("disk full".into()));
        }
        Ok(())
    }
}

impl Store for FailingStore {
    fn owner(&self, owner_id: i64) -> BoxFuture<'_, StoreResult<Option<Owner>>> {
        self.inner.owner(owner_id)
    }

    fn event_type(&self, event_type_id: i64) -> BoxFuture<'_, StoreResult<Option<EventType>>> {
        self.inner.event_type(event_type_id)
    }

    fn credentials(&self, owner_id: i64) -> BoxFuture<'_, StoreResult<Vec<Credential>>> {
        self.inner.credentials(owner_id)
    }

    fn selected_calendars(&self, owner_id: i64) -> BoxFuture<'_, StoreResult<Vec<IntegrationCalendar>>> {
        self.inner.selected_calendars(owner_id)
    }

    fn booking<'a>(&'a self, uid: &'a str) -> BoxFuture<'a, StoreResult<Option<Booking>>> {
        self.inner.booking(uid)
    }

    fn bookings_for_owner(&self, owner_id: i64, window: TimeWindow) -> BoxFuture<'_, StoreResult<Vec<Booking>>> {
        self.inner.bookings_for_owner(owner_id, window)
    }

    fn insert_booking(&self, booking: Booking) -> BoxFuture<'_, StoreResult<()>> {
        Box::pin(async move {
            self.check()?;
            self.inner.insert_booking(booking).await
        })
    }

    fn replace_booking<'a>(&'a self, old_uid: &'a str, booking: Booking) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move {
            self.check()?;
            self.inner.replace_booking(old_uid, booking).await
        })
    }

    fn delete_booking<'a>(&'a self, uid: &'a str) -> BoxFuture<'a, StoreResult<bool>> {
        Box::pin(async move {
            self.check()?;
            self.inner.delete_booking(uid).await
        })
    }
    fn update_credential_key(&self, credential_id: i64, key: serde_json::Value) -> BoxFuture<'_, StoreResult<()>> {
        self.inner.update_credential_key(credential_id, key)
    }
}
