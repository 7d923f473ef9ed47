//! Error types for core domain validation.

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

/// Errors raised while validating or deriving core domain values.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An instant range whose start is not strictly before its end.
    #[error("invalid time range: {start} must be before {end}")]
    InvalidTimeRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    /// A date range whose end precedes its start.
    #[error("invalid date range: {from} is after {to}")]
    InvalidDateRange { from: NaiveDate, to: NaiveDate },

    /// A working-hours rule that does not describe a window within one day.
    #[error("invalid working hours: {0}")]
    InvalidWorkingHours(String),

    /// A slot length or step that is not strictly positive.
    #[error("invalid slot configuration: {0}")]
    InvalidSlotConfig(String),

    /// A time zone name that is not a known IANA zone.
    #[error("unknown time zone: {0}")]
    InvalidTimeZone(String),

    /// A local date/time that cannot be placed on the UTC timeline.
    #[error("local time {0} does not exist in the organizer time zone")]
    UnresolvableLocalTime(String),

    /// A booking that violates a structural invariant.
    #[error("invalid booking: {0}")]
    InvalidBooking(String),

    /// Failure to produce the canonical serialization of an event.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
