//! Adapter-facing event types.
//!
//! This module provides the value objects handed to provider adapters:
//! - [`CalendarEvent`]: the projection of a booking that adapters create or update
//! - [`Person`]: an organizer or attendee
//! - [`ConferenceRequest`]: a request for the calendar provider to attach a conference
//!
//! The serialized form of [`CalendarEvent`] feeds the booking identifier, so
//! field order and instant formatting are part of its compatibility contract.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Location value that asks the calendar provider for a Google Meet conference.
pub const GOOGLE_MEET_LOCATION: &str = "integrations:google:meet";

/// An organizer or attendee of an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// IANA time zone name.
    pub time_zone: String,
}

impl Person {
    pub fn new(email: impl Into<String>, time_zone: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: None,
            time_zone: time_zone.into(),
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Returns the name, falling back to the email address.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.email)
    }

    /// Parses the time zone name.
    pub fn tz(&self) -> CoreResult<Tz> {
        self.time_zone
            .parse()
            .map_err(|_| CoreError::InvalidTimeZone(self.time_zone.clone()))
    }
}

/// A request to attach a provider-generated conference to the event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConferenceRequest {
    pub request_id: String,
}

/// The adapter-facing projection of a booking.
///
/// Constructed fresh for every create or reschedule and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    /// Event type title.
    #[serde(rename = "type")]
    pub event_type: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(with = "wire_time")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "wire_time")]
    pub end_time: DateTime<Utc>,
    pub organizer: Person,
    pub attendees: Vec<Person>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conference_request: Option<ConferenceRequest>,
}

impl CalendarEvent {
    /// Checks the structural invariants adapters rely on.
    pub fn validate(&self) -> CoreResult<()> {
        if self.start_time >= self.end_time {
            return Err(CoreError::InvalidTimeRange {
                start: self.start_time,
                end: self.end_time,
            });
        }
        if self.attendees.is_empty() {
            return Err(CoreError::InvalidBooking("event has no attendees".into()));
        }
        for (i, attendee) in self.attendees.iter().enumerate() {
            if self.attendees[..i]
                .iter()
                .any(|other| other.email.eq_ignore_ascii_case(&attendee.email))
            {
                return Err(CoreError::InvalidBooking(format!(
                    "duplicate attendee {}",
                    attendee.email
                )));
            }
        }
        Ok(())
    }

    /// Returns the duration in whole minutes.
    pub fn duration_minutes(&self) -> i64 {
        (self.end_time - self.start_time).num_minutes()
    }
}

/// Instants on the wire are RFC 3339 with a `Z` suffix. Whole seconds carry
/// no fraction; sub-second instants keep theirs.
pub mod wire_time {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn format(dt: &DateTime<Utc>) -> String {
        dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(dt))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
