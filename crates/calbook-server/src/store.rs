//! Persistence boundary.
//!
//! The engine reads owners, event types, credentials and selected calendars,
//! and writes bookings. Booking writes are single atomic steps: a booking is
//! stored together with its references, and a reschedule replaces the old
//! booking with the new one in one step.
//!
//! Refreshed OAuth tokens flow back into credential keys through
//! [`StoreTokens`].

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use calbook_core::{Booking, Credential, EventType, IntegrationCalendar, Owner, TimeWindow};
use calbook_providers::{BoxFuture, ProviderError, ProviderResult, TokenInfo, TokenStore};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{StoreError, StoreResult};

/// Storage used by the booking engine.
pub trait Store: Send + Sync {
    fn owner(&self, owner_id: i64) -> BoxFuture<'_, StoreResult<Option<Owner>>>;

    fn event_type(&self, event_type_id: i64) -> BoxFuture<'_, StoreResult<Option<EventType>>>;

    /// Credentials of an owner, ordered by id.
    fn credentials(&self, owner_id: i64) -> BoxFuture<'_, StoreResult<Vec<Credential>>>;

    /// Calendars the owner selected for busy-time checks.
    fn selected_calendars(&self, owner_id: i64) -> BoxFuture<'_, StoreResult<Vec<IntegrationCalendar>>>;

    fn booking<'a>(&'a self, uid: &'a str) -> BoxFuture<'a, StoreResult<Option<Booking>>>;

    /// Bookings of an owner overlapping `window`.
    fn bookings_for_owner(&self, owner_id: i64, window: TimeWindow) -> BoxFuture<'_, StoreResult<Vec<Booking>>>;

    /// Stores a booking with its references. Fails with
    /// [`StoreError::Conflict`] if the uid is taken.
    fn insert_booking(&self, booking: Booking) -> BoxFuture<'_, StoreResult<()>>;

    /// Atomically removes `old_uid` and stores `booking`.
    ///
    /// Fails with [`StoreError::NotFound`] if `old_uid` is gone and with
    /// [`StoreError::Conflict`] if the new uid belongs to another booking.
    fn replace_booking<'a>(&'a self, old_uid: &'a str, booking: Booking) -> BoxFuture<'a, StoreResult<()>>;

    /// Removes a booking; returns false if it did not exist.
    fn delete_booking<'a>(&'a self, uid: &'a str) -> BoxFuture<'a, StoreResult<bool>>;

    /// Merges the fields of `key` into a credential's key. Null fields leave
    /// the stored value alone. Fails with [`StoreError::NotFound`] for an
    /// unknown credential.
    fn update_credential_key(&self, credential_id: i64, key: serde_json::Value) -> BoxFuture<'_, StoreResult<()>>;
}

/// Saves refreshed provider tokens into the credential keys of a [`Store`].
pub struct StoreTokens(pub Arc<dyn Store>);

impl TokenStore for StoreTokens {
    fn save<'a>(&'a self, credential_id: i64, token: &'a TokenInfo) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(async move {
            let key = serde_json::to_value(token)
                .map_err(|e| ProviderError::internal("failed to encode token").with_source(e))?;
            self.0
                .update_credential_key(credential_id, key)
                .await
                .map_err(|e| ProviderError::internal(format!("failed to save token: {e}")))
        })
    }
}

impl std::fmt::Debug for StoreTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreTokens").finish_non_exhaustive()
    }
}

fn merge_key(stored: &mut serde_json::Value, update: serde_json::Value) {
    match (stored, update) {
        (serde_json::Value::Object(stored), serde_json::Value::Object(update)) => {
            for (field, value) in update {
                if !value.is_null() {
                    stored.insert(field, value);
                }
            }
        }
        (stored, update) => *stored = update,
    }
}

/// Serializable contents of an [`InMemoryStore`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Snapshot {
    pub owners: Vec<Owner>,
    pub event_types: Vec<EventType>,
    pub credentials: Vec<Credential>,
    /// Selected calendars keyed by owner id.
    pub selected_calendars: HashMap<i64, Vec<IntegrationCalendar>>,
    pub bookings: Vec<Booking>,
}

#[derive(Debug, Default)]
struct Tables {
    owners: HashMap<i64, Owner>,
    event_types: HashMap<i64, EventType>,
    credentials: BTreeMap<i64, Credential>,
    selected_calendars: HashMap<i64, Vec<IntegrationCalendar>>,
    bookings: BTreeMap<String, Booking>,
}

/// A [`Store`] kept in memory behind one lock.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let tables = Tables {
            owners: snapshot.owners.into_iter().map(|o| (o.id, o)).collect(),
            event_types: snapshot.event_types.into_iter().map(|e| (e.id, e)).collect(),
            credentials: snapshot.credentials.into_iter().map(|c| (c.id, c)).collect(),
            selected_calendars: snapshot.selected_calendars,
            bookings: snapshot
                .bookings
                .into_iter()
                .map(|b| (b.uid.clone(), b))
                .collect(),
        };
        Self {
            tables: RwLock::new(tables),
        }
    }

    pub async fn snapshot(&self) -> Snapshot {
        let tables = self.tables.read().await;
        let mut owners: Vec<Owner> = tables.owners.values().cloned().collect();
        owners.sort_by_key(|o| o.id);
        let mut event_types: Vec<EventType> = tables.event_types.values().cloned().collect();
        event_types.sort_by_key(|e| e.id);
        Snapshot {
            owners,
            event_types,
            credentials: tables.credentials.values().cloned().collect(),
            selected_calendars: tables.selected_calendars.clone(),
            bookings: tables.bookings.values().cloned().collect(),
        }
    }

    pub async fn put_owner(&self, owner: Owner) {
        self.tables.write().await.owners.insert(owner.id, owner);
    }

    pub async fn put_event_type(&self, event_type: EventType) {
        self.tables.write().await.event_types.insert(event_type.id, event_type);
    }

    pub async fn put_credential(&self, credential: Credential) {
        self.tables.write().await.credentials.insert(credential.id, credential);
    }

    pub async fn remove_credential(&self, credential_id: i64) -> bool {
        self.tables.write().await.credentials.remove(&credential_id).is_some()
    }

    pub async fn select_calendar(&self, owner_id: i64, calendar: IntegrationCalendar) {
        self.tables
            .write()
            .await
            .selected_calendars
            .entry(owner_id)
            .or_default()
            .push(calendar);
    }

    pub async fn booking_count(&self) -> usize {
        self.tables.read().await.bookings.len()
    }
}

impl Store for InMemoryStore {
    fn owner(&self, owner_id: i64) -> BoxFuture<'_, StoreResult<Option<Owner>>> {
        Box::pin(async move { Ok(self.tables.read().await.owners.get(&owner_id).cloned()) })
    }

    fn event_type(&self, event_type_id: i64) -> BoxFuture<'_, StoreResult<Option<EventType>>> {
        Box::pin(async move { Ok(self.tables.read().await.event_types.get(&event_type_id).cloned()) })
    }

    fn credentials(&self, owner_id: i64) -> BoxFuture<'_, StoreResult<Vec<Credential>>> {
        Box::pin(async move {
            Ok(self
                .tables
                .read()
                .await
                .credentials
                .values()
                .filter(|c| c.owner_id == owner_id)
                .cloned()
                .collect())
        })
    }

    fn selected_calendars(&self, owner_id: i64) -> BoxFuture<'_, StoreResult<Vec<IntegrationCalendar>>> {
        Box::pin(async move {
            Ok(self
                .tables
                .read()
                .await
                .selected_calendars
                .get(&owner_id)
                .cloned()
                .unwrap_or_default())
        })
    }

    fn booking<'a>(&'a self, uid: &'a str) -> BoxFuture<'a, StoreResult<Option<Booking>>> {
        Box::pin(async move { Ok(self.tables.read().await.bookings.get(uid).cloned()) })
    }

    fn bookings_for_owner(&self, owner_id: i64, window: TimeWindow) -> BoxFuture<'_, StoreResult<Vec<Booking>>> {
        Box::pin(async move {
            Ok(self
                .tables
                .read()
                .await
                .bookings
                .values()
                .filter(|b| b.owner_id == owner_id && b.overlaps(window.start, window.end))
                .cloned()
                .collect())
        })
    }

    fn insert_booking(&self, booking: Booking) -> BoxFuture<'_, StoreResult<()>> {
        Box::pin(async move {
            booking
                .validate()
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            let mut tables = self.tables.write().await;
            if tables.bookings.contains_key(&booking.uid) {
                return Err(StoreError::Conflict(booking.uid));
            }
            debug!(uid = %booking.uid, references = booking.references.len(), "stored booking");
            tables.bookings.insert(booking.uid.clone(), booking);
            Ok(())
        })
    }

    fn replace_booking<'a>(&'a self, old_uid: &'a str, booking: Booking) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move {
            booking
                .validate()
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            let mut tables = self.tables.write().await;
            if !tables.bookings.contains_key(old_uid) {
                return Err(StoreError::NotFound(old_uid.to_string()));
            }
            if booking.uid != old_uid && tables.bookings.contains_key(&booking.uid) {
                return Err(StoreError::Conflict(booking.uid));
            }
            tables.bookings.remove(old_uid);
            debug!(old_uid = %old_uid, uid = %booking.uid, "replaced booking");
            tables.bookings.insert(booking.uid.clone(), booking);
            Ok(())
        })
    }

    fn delete_booking<'a>(&'a self, uid: &'a str) -> BoxFuture<'a, StoreResult<bool>> {
        Box::pin(async move { Ok(self.tables.write().await.bookings.remove(uid).is_some()) })
    }

    fn update_credential_key(&self, credential_id: i64, key: serde_json::Value) -> BoxFuture<'_, StoreResult<()>> {
        Box::pin(async move {
            let mut tables = self.tables.write().await;
            let credential = tables
                .credentials
                .get_mut(&credential_id)
                .ok_or_else(|| StoreError::NotFound(format!("credential {credential_id}")))?;
            merge_key(&mut credential.key, key);
            debug!(credential_id, "updated credential key");
            Ok(())
        })
    }
}
