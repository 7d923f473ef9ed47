//! Time types for availability queries.
//!
//! This module provides [`TimeWindow`] for half-open UTC query ranges and
//! helpers to place local wall-clock times of an organizer's time zone on the
//! UTC timeline.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Upper bound, in minutes, when searching for the end of a DST gap.
const GAP_SEARCH_MINUTES: i64 = 180;

/// Resolves a local wall-clock time to a UTC instant.
///
/// Ambiguous times (repeated by a backward transition) resolve to the earliest
/// instant. Times skipped by a forward transition resolve to the first local
/// time after the gap.
pub fn resolve_local<Tz: TimeZone>(tz: &Tz, local: NaiveDateTime) -> Option<DateTime<Utc>> {
    if let Some(dt) = tz.from_local_datetime(&local).earliest() {
        return Some(dt.with_timezone(&Utc));
    }
    (1..=GAP_SEARCH_MINUTES).find_map(|minutes| {
        tz.from_local_datetime(&(local + Duration::minutes(minutes)))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
    })
}

/// Returns the UTC instant of local midnight starting `date`.
pub fn local_midnight<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> CoreResult<DateTime<Utc>> {
    let local = date.and_time(chrono::NaiveTime::MIN);
    resolve_local(tz, local).ok_or_else(|| CoreError::UnresolvableLocalTime(local.to_string()))
}

/// A time window for querying busy time.
///
/// Represents a half-open interval `[start, end)` in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Start of the window (inclusive).
    pub start: DateTime<Utc>,
    /// End of the window (exclusive).
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Creates a new time window.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidTimeRange`] if `start` is after `end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> CoreResult<Self> {
        if start > end {
            return Err(CoreError::InvalidTimeRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Creates a time window from a start time and a non-negative duration.
    pub fn from_duration(start: DateTime<Utc>, duration: Duration) -> CoreResult<Self> {
        Self::new(start, start + duration)
    }

    /// Creates the window covering the local dates `[from, to)` in `tz`.
    ///
    /// An empty date range yields an empty window at local midnight of `from`.
    pub fn for_dates<Tz: TimeZone>(from: NaiveDate, to: NaiveDate, tz: &Tz) -> CoreResult<Self> {
        if to < from {
            return Err(CoreError::InvalidDateRange { from, to });
        }
        Self::new(local_midnight(from, tz)?, local_midnight(to, tz)?)
    }

    /// Returns the duration of this time window.
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Returns `true` if the window covers no time at all.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Checks if a datetime falls within this window.
    ///
    /// Uses half-open interval semantics: `[start, end)`.
    pub fn contains(&self, dt: DateTime<Utc>) -> bool {
        self.start <= dt && dt < self.end
    }

    /// Checks if `[start, end)` overlaps this window.
    ///
    /// Ranges that merely touch a boundary do not overlap.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        start < self.end && end > self.start
    }
}
