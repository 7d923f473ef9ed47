//! Slot calculation from working hours and busy time.
//!
//! [`slot_days`] yields bookable [`Slot`]s one local day at a time, so a
//! caller can stop as soon as it has enough. The computation is a pure
//! function of its [`SlotRequest`] and busy intervals: `now` is an explicit
//! input and recomputing from the same inputs gives the same sequence.
//!
//! Working-hours windows are placed on the UTC timeline by resolving their
//! local opening time in the organizer's zone; all interval arithmetic after
//! that happens on UTC instants.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::schedule::WorkingHoursRule;
use crate::time::resolve_local;

/// A half-open range `[start, end)` already occupied on some calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BusyInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl BusyInterval {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Touching boundaries do not overlap.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start < end && self.end > start
    }
}

/// Sorts busy intervals and merges overlapping or adjacent ones.
///
/// Empty or inverted intervals are dropped.
pub fn merge_busy_intervals(intervals: impl IntoIterator<Item = BusyInterval>) -> Vec<BusyInterval> {
    let mut intervals: Vec<BusyInterval> = intervals.into_iter().filter(|b| b.start < b.end).collect();
    intervals.sort();

    let mut merged: Vec<BusyInterval> = Vec::with_capacity(intervals.len());
    for interval in intervals {
        if let Some(last) = merged.last_mut()
            && interval.start <= last.end
        {
            last.end = last.end.max(interval.end);
            continue;
        }
        merged.push(interval);
    }
    merged
}

/// A bookable time range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Slot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Inputs of a slot calculation.
#[derive(Debug, Clone)]
pub struct SlotRequest {
    pub rules: Vec<WorkingHoursRule>,
    /// Organizer time zone used to place working-hours windows.
    pub time_zone: Tz,
    /// First local date (inclusive).
    pub date_from: NaiveDate,
    /// Last local date (exclusive).
    pub date_to: NaiveDate,
    pub length: Duration,
    /// Distance between candidate starts inside a window.
    pub step: Duration,
    pub minimum_notice: Duration,
    pub now: DateTime<Utc>,
}

impl SlotRequest {
    /// Creates a request stepping by the slot length with no minimum notice.
    pub fn new(
        rules: Vec<WorkingHoursRule>,
        time_zone: Tz,
        date_from: NaiveDate,
        date_to: NaiveDate,
        length: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            rules,
            time_zone,
            date_from,
            date_to,
            length,
            step: length,
            minimum_notice: Duration::zero(),
            now,
        }
    }

    #[must_use]
    pub fn with_step(mut self, step: Duration) -> Self {
        self.step = step;
        self
    }

    #[must_use]
    pub fn with_minimum_notice(mut self, notice: Duration) -> Self {
        self.minimum_notice = notice;
        self
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.date_to < self.date_from {
            return Err(CoreError::InvalidDateRange {
                from: self.date_from,
                to: self.date_to,
            });
        }
        if self.length <= Duration::zero() {
            return Err(CoreError::InvalidSlotConfig("slot length must be positive".into()));
        }
        if self.step <= Duration::zero() {
            return Err(CoreError::InvalidSlotConfig("slot step must be positive".into()));
        }
        if self.minimum_notice < Duration::zero() {
            return Err(CoreError::InvalidSlotConfig("minimum notice must not be negative".into()));
        }
        self.rules.iter().try_for_each(WorkingHoursRule::validate)
    }
}

/// The slots of one local date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaySlots {
    pub date: NaiveDate,
    pub slots: Vec<Slot>,
}

/// Lazy day-by-day slot iterator returned by [`slot_days`].
#[derive(Debug, Clone)]
pub struct SlotDays {
    request: SlotRequest,
    busy: Vec<BusyInterval>,
    next_date: Option<NaiveDate>,
}

/// Starts a slot calculation.
///
/// Busy intervals may come unsorted from several providers; they are merged
/// before any day is computed.
pub fn slot_days(
    request: SlotRequest,
    busy: impl IntoIterator<Item = BusyInterval>,
) -> CoreResult<SlotDays> {
    request.validate()?;
    let next_date = (request.date_from < request.date_to).then_some(request.date_from);
    Ok(SlotDays {
        busy: merge_busy_intervals(busy),
        request,
        next_date,
    })
}

/// Computes every slot of the requested range.
pub fn compute_slots(
    request: SlotRequest,
    busy: impl IntoIterator<Item = BusyInterval>,
) -> CoreResult<Vec<Slot>> {
    Ok(slot_days(request, busy)?.slots().collect())
}

impl SlotDays {
    /// Flattens the days into an ascending slot sequence.
    pub fn slots(self) -> impl Iterator<Item = Slot> {
        self.flat_map(|day| day.slots)
    }

    fn slots_on(&self, date: NaiveDate) -> Vec<Slot> {
        let request = &self.request;
        let tz = &request.time_zone;
        let earliest = request.now + request.minimum_notice;
        let midnight = date.and_time(NaiveTime::MIN);
        // Windows never spill into the next local day.
        let day_end = date
            .succ_opt()
            .and_then(|next| resolve_local(tz, next.and_time(NaiveTime::MIN)));

        let mut slots = Vec::new();
        for rule in request.rules.iter().filter(|r| r.applies_to(date.weekday())) {
            let local_open = midnight + Duration::minutes(i64::from(rule.start_offset_minutes));
            let Some(open) = resolve_local(tz, local_open) else {
                tracing::warn!(%local_open, zone = %tz, "cannot place working hours window");
                continue;
            };
            let close = match day_end {
                Some(day_end) => (open + rule.length()).min(day_end),
                None => open + rule.length(),
            };

            let mut start = open;
            while start + request.length <= close {
                let end = start + request.length;
                if start >= earliest && !self.is_busy(start, end) {
                    slots.push(Slot { start, end });
                }
                start += request.step;
            }
        }
        slots.sort();
        slots.dedup();
        slots
    }

    fn is_busy(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        let idx = self.busy.partition_point(|b| b.end <= start);
        self.busy.get(idx).is_some_and(|b| b.overlaps(start, end))
    }
}

impl Iterator for SlotDays {
    type Item = DaySlots;

    fn next(&mut self) -> Option<DaySlots> {
        let date = self.next_date?;
        self.next_date = date.succ_opt().filter(|next| *next < self.request.date_to);
        Some(DaySlots {
            date,
            slots: self.slots_on(date),
        })
    }
}
