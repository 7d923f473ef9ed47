//! ProviderAdapter trait definition.
//!
//! This module defines the [`ProviderAdapter`] trait, the uniform interface
//! over one external calendar or video service bound to one credential.
//!
//! Adapters are responsible for:
//! - Listing the calendars of the account
//! - Reporting busy time for a window
//! - Creating, updating and deleting the external event of a booking
//! - Keeping their access token fresh
//!
//! Adapters never orchestrate: fan-out, merging and persistence belong to the
//! caller.

use std::future::Future;
use std::pin::Pin;

use calbook_core::{BusyInterval, CalendarEvent, IntegrationCalendar, ProviderType, TimeWindow};
use serde::{Deserialize, Serialize};

use crate::error::ProviderResult;

/// Result of creating or updating an external event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventResult {
    /// The provider's identifier of the event or meeting.
    pub external_id: String,
    /// Set when the provider sends its own invitation to attendees.
    pub suppress_attendee_notification: bool,
    /// Join URL of a created conference, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_url: Option<String>,
}

impl EventResult {
    pub fn new(external_id: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            suppress_attendee_notification: false,
            meeting_url: None,
        }
    }

    #[must_use]
    pub fn suppressing_attendee_notification(mut self) -> Self {
        self.suppress_attendee_notification = true;
        self
    }

    #[must_use]
    pub fn with_meeting_url(mut self, url: Option<String>) -> Self {
        self.meeting_url = url;
        self
    }
}

/// Which calendars of one provider a busy-time query covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalendarSelection<'a> {
    /// Nothing is selected at all: query every calendar of the account.
    All,
    /// Only these calendar ids of this provider.
    Only(Vec<&'a str>),
    /// Calendars are selected, but none belongs to this provider.
    None,
}

impl<'a> CalendarSelection<'a> {
    /// Resolves the owner's selected calendars for `provider`.
    ///
    /// A non-empty selection without entries for this provider is an
    /// explicit opt-out, not a fallback to every calendar.
    pub fn for_provider(provider: &ProviderType, selected: &'a [IntegrationCalendar]) -> Self {
        if selected.is_empty() {
            return Self::All;
        }
        let ids: Vec<&str> = selected
            .iter()
            .filter(|c| &c.provider == provider)
            .map(|c| c.external_id.as_str())
            .collect();
        if ids.is_empty() { Self::None } else { Self::Only(ids) }
    }
}

/// A boxed future for async trait methods.
///
/// Boxed futures keep the trait object-safe so the registry can hand out
/// `Arc<dyn ProviderAdapter>`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The uniform interface over one external calendar or video provider.
///
/// # Implementation Notes
///
/// - Implementations must be `Send + Sync`; one instance serves concurrent calls
/// - Token refresh must be single-flight per instance (see [`crate::TokenCache`])
/// - `delete_event` reports a missing event as [`ProviderErrorCode::NotFound`]
///
/// [`ProviderErrorCode::NotFound`]: crate::ProviderErrorCode::NotFound
pub trait ProviderAdapter: Send + Sync {
    /// Returns the provider type this adapter serves.
    fn provider_type(&self) -> &ProviderType;

    /// Lists the calendars of the account.
    fn list_calendars(&self) -> BoxFuture<'_, ProviderResult<Vec<IntegrationCalendar>>>;

    /// Returns busy intervals within `window` for the selected calendars.
    ///
    /// See [`CalendarSelection::for_provider`] for how `selected` is applied.
    fn busy_intervals<'a>(
        &'a self,
        window: TimeWindow,
        selected: &'a [IntegrationCalendar],
    ) -> BoxFuture<'a, ProviderResult<Vec<BusyInterval>>>;

    /// Creates the external event of a booking.
    fn create_event<'a>(&'a self, event: &'a CalendarEvent) -> BoxFuture<'a, ProviderResult<EventResult>>;

    /// Updates the external event identified by `external_id`.
    fn update_event<'a>(
        &'a self,
        external_id: &'a str,
        event: &'a CalendarEvent,
    ) -> BoxFuture<'a, ProviderResult<EventResult>>;

    /// Deletes the external event identified by `external_id`.
    fn delete_event<'a>(&'a self, external_id: &'a str) -> BoxFuture<'a, ProviderResult<()>>;
}
