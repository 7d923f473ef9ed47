//! The booking engine.
//!
//! [`BookingEngine`] answers availability queries and runs the create,
//! reschedule and cancel flows of a booking:
//!
//! ```text
//!  request ──► validate ──► Store (owner, event type, credentials)
//!                                │
//!                                ▼
//!                        AdapterRegistry ──► FanOut ──► adapters
//!                                                         │
//!                   per-provider results ◄────────────────┘
//!                                │
//!                                ▼
//!                       Store (one atomic write) ──► NotificationGateway
//! ```
//!
//! Validation failures are returned before any adapter is called. Adapter
//! failures never fail the operation; they are reported per provider in the
//! receipt. A store failure after an adapter already changed something is
//! reported as [`BookingError::Inconsistent`].
//!
//! Operations on one booking uid never overlap: the loser of a race gets
//! [`BookingError::PersistenceConflict`] before calling any adapter.
//!
//! Busy times and calendar listings come from calendar providers only; video
//! providers take part in creating, moving and deleting events.

use std::sync::Arc;

use calbook_core::{
    Booking, BookingReference, BusyInterval, CalendarEvent, ConferenceRequest, EventType,
    GOOGLE_MEET_LOCATION, IntegrationCalendar, Owner, Person, ProviderKind, ProviderType, Slot, SlotDays,
    SlotRequest, TimeWindow, booking_uid, name_uuid, slot_days,
};
use calbook_providers::{AdapterRegistry, BoundAdapter, ProviderErrorCode};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{Span, debug, error, info, warn};

use crate::claims::{Claim, Claims};
use crate::config::{AvailabilitySettings, EngineConfig};
use crate::error::{BookingError, BookingResult, StoreError};
use crate::fanout::FanOut;
use crate::notify::{BookingNotification, LinkBuilder, NotificationGateway, NotificationKind, TracingNotifier};
use crate::outcome::{
    BookingReceipt, CancelAck, ProviderCallResult, ProviderOutcome, meeting_url,
    suppresses_attendee_notification,
};
use crate::store::{Store, StoreTokens};

/// Slot length of availability queries without an event type.
const DEFAULT_SLOT_MINUTES: i64 = 30;

const DUPLICATE_PROVIDER: &str = "another credential of this provider type holds the booking's reference";
const NO_CREDENTIAL: &str = "no credential for provider";
const NO_REFERENCE: &str = "booking has no reference for this provider";

/// Source of the current time.
pub type Clock = fn() -> DateTime<Utc>;

/// A request to book a slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    pub owner_id: i64,
    pub event_type_id: i64,
    pub attendee: Person,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Free-form location, or `integrations:google:meet` for a Meet conference.
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl CreateBookingRequest {
    pub fn new(
        owner_id: i64,
        event_type_id: i64,
        attendee: Person,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        Self {
            owner_id,
            event_type_id,
            attendee,
            start,
            end,
            location: None,
            notes: None,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Orchestrates availability and booking operations.
pub struct BookingEngine {
    store: Arc<dyn Store>,
    registry: Arc<AdapterRegistry>,
    notifier: Arc<dyn NotificationGateway>,
    fan_out: FanOut,
    availability: AvailabilitySettings,
    links: Option<LinkBuilder>,
    clock: Clock,
    claims: Arc<Claims>,
}

impl std::fmt::Debug for BookingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BookingEngine")
            .field("registry", &self.registry)
            .field("fan_out", &self.fan_out)
            .field("availability", &self.availability)
            .field("links", &self.links)
            .finish_non_exhaustive()
    }
}

impl BookingEngine {
    /// Creates an engine with default settings that logs notifications.
    pub fn new(store: Arc<dyn Store>, registry: Arc<AdapterRegistry>) -> Self {
        Self {
            store,
            registry,
            notifier: Arc::new(TracingNotifier),
            fan_out: FanOut::default(),
            availability: AvailabilitySettings::default(),
            links: None,
            clock: Utc::now,
            claims: Arc::default(),
        }
    }

    /// Creates an engine with the built-in adapters registered from `config`.
    pub fn from_config(config: &EngineConfig, store: Arc<dyn Store>) -> BookingResult<Self> {
        let providers = config
            .providers_config()?
            .with_token_store(Arc::new(StoreTokens(store.clone())));
        let registry = AdapterRegistry::with_defaults(providers);
        let mut engine = Self::new(store, Arc::new(registry))
            .with_fan_out(FanOut::from_settings(&config.fan_out))
            .with_availability(config.availability.clone());
        engine.links = config.link_base()?.map(LinkBuilder::new);
        Ok(engine)
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationGateway>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_fan_out(mut self, fan_out: FanOut) -> Self {
        self.fan_out = fan_out;
        self
    }

    pub fn with_availability(mut self, availability: AvailabilitySettings) -> Self {
        self.availability = availability;
        self
    }

    pub fn with_links(mut self, links: LinkBuilder) -> Self {
        self.links = Some(links);
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Returns every bookable slot of the owner in the local dates
    /// `[date_from, date_to)`.
    pub async fn compute_availability(
        &self,
        owner_id: i64,
        date_from: NaiveDate,
        date_to: NaiveDate,
        event_type_id: Option<i64>,
    ) -> BookingResult<Vec<Slot>> {
        Ok(self
            .availability(owner_id, date_from, date_to, event_type_id)
            .await?
            .slots()
            .collect())
    }

    /// Like [`compute_availability`](Self::compute_availability), but yields
    /// the slots one day at a time.
    #[tracing::instrument(skip(self))]
    pub async fn availability(
        &self,
        owner_id: i64,
        date_from: NaiveDate,
        date_to: NaiveDate,
        event_type_id: Option<i64>,
    ) -> BookingResult<SlotDays> {
        if date_to < date_from {
            return Err(BookingError::InvalidTimeRange(format!(
                "date_to {} is before date_from {}",
                date_to, date_from
            )));
        }
        let days = (date_to - date_from).num_days();
        if days > i64::from(self.availability.max_range_days) {
            return Err(BookingError::InvalidTimeRange(format!(
                "range of {} days exceeds the limit of {}",
                days, self.availability.max_range_days
            )));
        }

        let owner = self.load_owner(owner_id).await?;
        let event_type = match event_type_id {
            Some(id) => Some(self.load_event_type(&owner, id).await?),
            None => None,
        };
        let tz = owner.tz()?;

        let (rules, length, notice, step) = match &event_type {
            Some(et) => (
                et.effective_rules(&owner).to_vec(),
                et.length(),
                et.minimum_notice(),
                et.slot_step(),
            ),
            None => (
                owner.working_hours.clone(),
                Duration::minutes(DEFAULT_SLOT_MINUTES),
                Duration::zero(),
                None,
            ),
        };
        let step = step
            .or_else(|| {
                self.availability
                    .default_step_minutes
                    .map(|m| Duration::minutes(i64::from(m)))
            })
            .unwrap_or(length);

        let request = SlotRequest::new(rules, tz, date_from, date_to, length, (self.clock)())
            .with_step(step)
            .with_minimum_notice(notice);
        request.validate()?;

        let window = TimeWindow::for_dates(date_from, date_to, &tz)?;
        let busy = if window.is_empty() {
            Vec::new()
        } else {
            self.busy_times(&owner, window).await?
        };
        debug!(busy = busy.len(), "computing slots");
        Ok(slot_days(request, busy)?)
    }

    /// Lists the calendars of every connected account of the owner.
    ///
    /// Accounts that fail to answer are logged and left out.
    #[tracing::instrument(skip(self))]
    pub async fn list_calendars(&self, owner_id: i64) -> BookingResult<Vec<IntegrationCalendar>> {
        let (adapters, _) = self.resolve_adapters(owner_id).await?;
        let adapters = calendar_providers(adapters);
        let labels = labels(&adapters);
        let results = self
            .fan_out
            .run(adapters, |bound| async move { bound.adapter.list_calendars().await })
            .await;

        let mut calendars = Vec::new();
        for ((provider, credential_id), result) in labels.into_iter().zip(results) {
            match result {
                Ok(found) => calendars.extend(found),
                Err(e) => warn!(
                    provider = %provider,
                    credential_id,
                    error = %e,
                    "failed to list calendars"
                ),
            }
        }
        Ok(calendars)
    }

    /// Books a slot and creates its external events.
    #[tracing::instrument(
        skip(self, request),
        fields(owner_id = request.owner_id, event_type_id = request.event_type_id, uid)
    )]
    pub async fn create_booking(&self, request: CreateBookingRequest) -> BookingResult<BookingReceipt> {
        ensure_ordered(request.start, request.end)?;
        let owner = self.load_owner(request.owner_id).await?;
        let event_type = self.load_event_type(&owner, request.event_type_id).await?;

        let event = build_event(
            &owner,
            &event_type,
            vec![request.attendee],
            (request.start, request.end),
            request.location.as_deref(),
            request.notes,
        );
        event.validate()?;
        let uid = booking_uid(&event).map_err(BookingError::Identifier)?;
        Span::current().record("uid", uid.as_str());

        let _claim = self.claim(&uid)?;
        if self.store.booking(&uid).await.map_err(BookingError::Persistence)?.is_some() {
            return Err(BookingError::PersistenceConflict { uid });
        }

        let (adapters, unresolved) = self.resolve_adapters(owner.id).await?;
        let (adapters, duplicates) = one_per_provider(adapters);
        let adapters_called = !adapters.is_empty();

        let event = Arc::new(event);
        let labels = labels(&adapters);
        let results = self
            .fan_out
            .run(adapters, |bound| {
                let event = event.clone();
                async move { bound.adapter.create_event(&event).await }
            })
            .await;

        let mut booking = Booking {
            uid: uid.clone(),
            owner_id: owner.id,
            event_type_id: event_type.id,
            title: event.title.clone(),
            description: event.description.clone(),
            location: request.location,
            start_time: event.start_time,
            end_time: event.end_time,
            attendees: event.attendees.clone(),
            references: Vec::new(),
        };
        let mut provider_results = Vec::with_capacity(labels.len() + unresolved.len() + duplicates.len());
        for ((provider, credential_id), result) in labels.into_iter().zip(results) {
            match &result {
                Ok(created) => {
                    booking.add_reference(BookingReference::new(provider.clone(), created.external_id.clone()));
                }
                Err(e) => warn!(provider = %provider, credential_id, error = %e, "failed to create event"),
            }
            provider_results.push(ProviderCallResult::from_event(provider, credential_id, result));
        }
        provider_results.extend(unresolved);
        provider_results.extend(duplicates);

        info!(references = booking.references.len(), "storing booking");
        if let Err(e) = self.store.insert_booking(booking).await {
            return Err(after_side_effects(uid, provider_results, e));
        }

        self.notify(NotificationKind::Confirmed, &uid, &event, &provider_results, adapters_called)
            .await;
        Ok(BookingReceipt { uid, provider_results })
    }

    /// Moves a booking to a new time, updating its external events in place.
    ///
    /// Each reference is updated through the adapter of its provider type. A
    /// reference whose provider has no credential any more is reported as a
    /// `configuration` failure and kept on the new booking; a credential the
    /// booking has no reference for is skipped.
    #[tracing::instrument(skip(self), fields(new_uid))]
    pub async fn reschedule_booking(
        &self,
        uid: &str,
        new_start: DateTime<Utc>,
        new_end: DateTime<Utc>,
    ) -> BookingResult<BookingReceipt> {
        ensure_ordered(new_start, new_end)?;
        let _claim = self.claim(uid)?;
        let booking = self
            .store
            .booking(uid)
            .await
            .map_err(BookingError::Persistence)?
            .ok_or_else(|| BookingError::BookingNotFound(uid.to_string()))?;
        let owner = self.load_owner(booking.owner_id).await?;
        let event_type = self.load_event_type(&owner, booking.event_type_id).await?;

        let event = build_event(
            &owner,
            &event_type,
            booking.attendees.clone(),
            (new_start, new_end),
            booking.location.as_deref(),
            booking.description.clone(),
        );
        event.validate()?;
        let new_uid = booking_uid(&event).map_err(BookingError::Identifier)?;
        Span::current().record("new_uid", new_uid.as_str());

        let _new_claim = if new_uid != booking.uid {
            let claim = self.claim(&new_uid)?;
            if self
                .store
                .booking(&new_uid)
                .await
                .map_err(BookingError::Persistence)?
                .is_some()
            {
                return Err(BookingError::PersistenceConflict { uid: new_uid });
            }
            Some(claim)
        } else {
            None
        };

        let (adapters, unresolved) = self.resolve_adapters(owner.id).await?;
        let (adapters, duplicates) = one_per_provider(adapters);

        let mut calls = Vec::new();
        let mut not_called = Vec::new();
        for reference in &booking.references {
            match adapters.iter().find(|b| b.provider == reference.provider) {
                Some(bound) => calls.push((bound.clone(), reference.external_id.clone())),
                None if unresolved.iter().any(|r| r.provider == reference.provider) => {}
                None => {
                    warn!(provider = %reference.provider, "referenced provider has no credential");
                    not_called.push(ProviderCallResult::new(
                        reference.provider.clone(),
                        None,
                        ProviderOutcome::Failed {
                            code: ProviderErrorCode::Configuration,
                            message: NO_CREDENTIAL.into(),
                        },
                    ));
                }
            }
        }
        for bound in &adapters {
            if booking.reference_for(&bound.provider).is_none() {
                not_called.push(ProviderCallResult::skipped(
                    bound.provider.clone(),
                    Some(bound.credential_id),
                    NO_REFERENCE,
                ));
            }
        }
        let adapters_called = !calls.is_empty();

        let event = Arc::new(event);
        let labels: Vec<(ProviderType, i64)> = calls
            .iter()
            .map(|(bound, _)| (bound.provider.clone(), bound.credential_id))
            .collect();
        let results = self
            .fan_out
            .run(calls, |(bound, external_id)| {
                let event = event.clone();
                async move { bound.adapter.update_event(&external_id, &event).await }
            })
            .await;

        let mut provider_results = Vec::with_capacity(labels.len() + not_called.len());
        for ((provider, credential_id), result) in labels.into_iter().zip(results) {
            if let Err(e) = &result {
                warn!(provider = %provider, credential_id, error = %e, "failed to update event");
            }
            provider_results.push(ProviderCallResult::from_event(provider, credential_id, result));
        }
        provider_results.extend(not_called);
        provider_results.extend(unresolved);
        provider_results.extend(duplicates);

        let rescheduled = Booking {
            uid: new_uid.clone(),
            title: event.title.clone(),
            start_time: event.start_time,
            end_time: event.end_time,
            ..booking.clone()
        };
        info!(old_uid = %booking.uid, "replacing booking");
        if let Err(e) = self.store.replace_booking(&booking.uid, rescheduled).await {
            return Err(after_side_effects(new_uid, provider_results, e));
        }

        self.notify(NotificationKind::Rescheduled, &new_uid, &event, &provider_results, adapters_called)
            .await;
        Ok(BookingReceipt {
            uid: new_uid,
            provider_results,
        })
    }

    /// Cancels a booking and deletes its external events.
    ///
    /// Cancelling an unknown uid succeeds with no provider results. The local
    /// booking is removed only when no provider delete failed, so a failed
    /// cancel can be retried.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_booking(&self, uid: &str) -> BookingResult<CancelAck> {
        let _claim = self.claim(uid)?;
        let Some(booking) = self.store.booking(uid).await.map_err(BookingError::Persistence)? else {
            debug!("booking already gone");
            return Ok(CancelAck {
                uid: uid.to_string(),
                provider_results: Vec::new(),
                booking_removed: false,
            });
        };

        let (adapters, unresolved) = self.resolve_adapters(booking.owner_id).await?;
        let (adapters, _) = one_per_provider(adapters);

        let mut calls = Vec::new();
        let mut not_called = Vec::new();
        for reference in &booking.references {
            match adapters.iter().find(|b| b.provider == reference.provider) {
                Some(bound) => calls.push((bound.clone(), reference.external_id.clone())),
                None => {
                    if let Some(failure) = unresolved.iter().find(|r| r.provider == reference.provider) {
                        not_called.push(failure.clone());
                    } else {
                        warn!(provider = %reference.provider, "referenced provider has no credential");
                        not_called.push(ProviderCallResult::skipped(reference.provider.clone(), None, NO_CREDENTIAL));
                    }
                }
            }
        }

        let labels: Vec<(ProviderType, i64, String)> = calls
            .iter()
            .map(|(bound, external_id)| (bound.provider.clone(), bound.credential_id, external_id.clone()))
            .collect();
        let results = self
            .fan_out
            .run(calls, |(bound, external_id)| async move {
                bound.adapter.delete_event(&external_id).await
            })
            .await;

        let mut provider_results = Vec::with_capacity(labels.len() + not_called.len());
        for ((provider, credential_id, external_id), result) in labels.into_iter().zip(results) {
            let outcome = match result {
                Ok(()) => deleted(external_id),
                Err(e) if e.is_not_found() => {
                    debug!(provider = %provider, external_id = %external_id, "external event already gone");
                    deleted(external_id)
                }
                Err(e) => {
                    warn!(provider = %provider, credential_id, error = %e, "failed to delete event");
                    ProviderOutcome::failed(&e)
                }
            };
            provider_results.push(ProviderCallResult::new(provider, Some(credential_id), outcome));
        }
        provider_results.extend(not_called);

        if provider_results
            .iter()
            .any(|r| matches!(r.outcome, ProviderOutcome::Failed { .. }))
        {
            warn!("keeping booking until every provider delete succeeds");
            return Ok(CancelAck {
                uid: booking.uid,
                provider_results,
                booking_removed: false,
            });
        }

        match self.store.delete_booking(&booking.uid).await {
            Ok(booking_removed) => {
                info!(booking_removed, "booking cancelled");
                Ok(CancelAck {
                    uid: booking.uid,
                    provider_results,
                    booking_removed,
                })
            }
            Err(e) => Err(after_side_effects(booking.uid, provider_results, e)),
        }
    }

    fn claim(&self, uid: &str) -> BookingResult<Claim> {
        self.claims
            .claim(uid)
            .ok_or_else(|| BookingError::PersistenceConflict { uid: uid.to_string() })
    }

    async fn load_owner(&self, owner_id: i64) -> BookingResult<Owner> {
        self.store
            .owner(owner_id)
            .await
            .map_err(BookingError::Persistence)?
            .ok_or(BookingError::OwnerNotFound(owner_id))
    }

    async fn load_event_type(&self, owner: &Owner, event_type_id: i64) -> BookingResult<EventType> {
        match self
            .store
            .event_type(event_type_id)
            .await
            .map_err(BookingError::Persistence)?
        {
            Some(event_type) if event_type.owner_id == owner.id => Ok(event_type),
            _ => Err(BookingError::EventTypeNotFound(event_type_id)),
        }
    }

    /// Resolves an adapter for every credential of the owner, in credential
    /// id order. Credentials whose adapter cannot be built are returned as
    /// failed results.
    async fn resolve_adapters(&self, owner_id: i64) -> BookingResult<(Vec<BoundAdapter>, Vec<ProviderCallResult>)> {
        let credentials = self
            .store
            .credentials(owner_id)
            .await
            .map_err(BookingError::Persistence)?;

        let mut adapters = Vec::with_capacity(credentials.len());
        let mut failures = Vec::new();
        for credential in &credentials {
            match self.registry.resolve(credential).await {
                Ok(Some(bound)) => adapters.push(bound),
                Ok(None) => {}
                Err(e) => {
                    warn!(
                        credential_id = credential.id,
                        provider = %credential.provider,
                        error = %e,
                        "failed to build adapter"
                    );
                    failures.push(ProviderCallResult::new(
                        credential.provider.clone(),
                        Some(credential.id),
                        ProviderOutcome::failed(&e),
                    ));
                }
            }
        }
        Ok((adapters, failures))
    }

    async fn busy_times(&self, owner: &Owner, window: TimeWindow) -> BookingResult<Vec<BusyInterval>> {
        let (adapters, _) = self.resolve_adapters(owner.id).await?;
        let adapters = calendar_providers(adapters);
        let selected = Arc::new(
            self.store
                .selected_calendars(owner.id)
                .await
                .map_err(BookingError::Persistence)?,
        );

        let labels = labels(&adapters);
        let results = self
            .fan_out
            .run(adapters, |bound| {
                let selected = selected.clone();
                async move { bound.adapter.busy_intervals(window, selected.as_slice()).await }
            })
            .await;

        let mut busy = Vec::new();
        for ((provider, credential_id), result) in labels.into_iter().zip(results) {
            match result {
                Ok(intervals) => {
                    debug!(provider = %provider, credential_id, count = intervals.len(), "busy intervals");
                    busy.extend(intervals);
                }
                Err(e) => warn!(
                    provider = %provider,
                    credential_id,
                    error = %e,
                    "busy times unavailable, provider ignored"
                ),
            }
        }

        let bookings = self
            .store
            .bookings_for_owner(owner.id, window)
            .await
            .map_err(BookingError::Persistence)?;
        busy.extend(bookings.iter().map(|b| BusyInterval::new(b.start_time, b.end_time)));
        Ok(busy)
    }

    /// Sends the organizer and attendee notifications.
    ///
    /// Without any adapter call only the attendee is notified. Otherwise the
    /// organizer always is, and the attendee unless a provider sends its own
    /// invitation.
    async fn notify(
        &self,
        kind: NotificationKind,
        uid: &str,
        event: &CalendarEvent,
        results: &[ProviderCallResult],
        adapters_called: bool,
    ) {
        let notification = BookingNotification::new(kind, uid, event.clone())
            .with_links(self.links.as_ref())
            .with_meeting_url(meeting_url(results).map(str::to_string));

        if adapters_called {
            if let Err(e) = self.notifier.send_organizer(&notification).await {
                warn!(error = %e, "organizer notification failed");
            }
            if suppresses_attendee_notification(results) {
                debug!("attendee notification left to the provider");
                return;
            }
        }
        if let Err(e) = self.notifier.send_attendee(&notification).await {
            warn!(error = %e, "attendee notification failed");
        }
    }
}

fn ensure_ordered(start: DateTime<Utc>, end: DateTime<Utc>) -> BookingResult<()> {
    if start >= end {
        return Err(BookingError::InvalidTimeRange(format!(
            "start {} is not before end {}",
            start, end
        )));
    }
    Ok(())
}

/// Builds the adapter-facing event of a booking.
fn build_event(
    owner: &Owner,
    event_type: &EventType,
    attendees: Vec<Person>,
    (start, end): (DateTime<Utc>, DateTime<Utc>),
    location: Option<&str>,
    description: Option<String>,
) -> CalendarEvent {
    let organizer = owner.as_person();
    let title = match attendees.first() {
        Some(attendee) => event_type.booking_title(&organizer, attendee),
        None => event_type.title.clone(),
    };
    let (location, conference_request) = match location {
        Some(GOOGLE_MEET_LOCATION) => (
            None,
            Some(ConferenceRequest {
                request_id: name_uuid(GOOGLE_MEET_LOCATION).to_string(),
            }),
        ),
        other => (other.map(str::to_string), None),
    };
    CalendarEvent {
        event_type: event_type.title.clone(),
        title,
        description,
        start_time: start,
        end_time: end,
        organizer,
        attendees,
        location,
        conference_request,
    }
}

/// Drops video providers, which own no calendars.
fn calendar_providers(adapters: Vec<BoundAdapter>) -> Vec<BoundAdapter> {
    adapters
        .into_iter()
        .filter(|b| b.provider.kind() != Some(ProviderKind::Video))
        .collect()
}

fn labels(adapters: &[BoundAdapter]) -> Vec<(ProviderType, i64)> {
    adapters
        .iter()
        .map(|b| (b.provider.clone(), b.credential_id))
        .collect()
}

/// Keeps the first adapter of every provider type so a booking never holds
/// two references of one provider.
fn one_per_provider(adapters: Vec<BoundAdapter>) -> (Vec<BoundAdapter>, Vec<ProviderCallResult>) {
    let mut chosen: Vec<BoundAdapter> = Vec::with_capacity(adapters.len());
    let mut skipped = Vec::new();
    for bound in adapters {
        if chosen.iter().any(|c| c.provider == bound.provider) {
            skipped.push(ProviderCallResult::skipped(
                bound.provider.clone(),
                Some(bound.credential_id),
                DUPLICATE_PROVIDER,
            ));
        } else {
            chosen.push(bound);
        }
    }
    (chosen, skipped)
}

fn deleted(external_id: String) -> ProviderOutcome {
    ProviderOutcome::Succeeded {
        external_id,
        suppress_attendee_notification: false,
        meeting_url: None,
    }
}

/// Maps a store failure that followed adapter calls.
///
/// A conflict means another writer changed the booking first and stays a
/// conflict. Any other failure after a provider change is inconsistent.
fn after_side_effects(uid: String, provider_results: Vec<ProviderCallResult>, err: StoreError) -> BookingError {
    let changed = provider_results.iter().any(ProviderCallResult::is_success);
    if matches!(err, StoreError::Conflict(_) | StoreError::NotFound(_)) {
        if changed {
            error!(uid = %uid, error = %err, "booking changed by another writer after providers were updated");
        }
        BookingError::from_store(&uid, err)
    } else if changed {
        error!(uid = %uid, error = %err, "providers were changed but the booking record was not");
        BookingError::Inconsistent {
            uid,
            provider_results,
            source: err,
        }
    } else {
        BookingError::from_store(&uid, err)
    }
}
