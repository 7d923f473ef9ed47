//! Scheduling configuration: owners, event types and working hours.

use chrono::{Duration, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::event::Person;

/// Minutes in a day; the largest valid working-hours offset.
pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// Placeholder in an event name template replaced by the attendee name.
const ATTENDEE_PLACEHOLDER: &str = "{ATTENDEE}";

/// A weekly working-hours window in the owner's local time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkingHoursRule {
    pub days: Vec<Weekday>,
    /// Minutes from local midnight at which the window opens.
    pub start_offset_minutes: u32,
    /// Minutes from local midnight at which the window closes.
    pub end_offset_minutes: u32,
}

impl WorkingHoursRule {
    pub fn new(days: impl IntoIterator<Item = Weekday>, start_offset_minutes: u32, end_offset_minutes: u32) -> Self {
        Self {
            days: days.into_iter().collect(),
            start_offset_minutes,
            end_offset_minutes,
        }
    }

    /// Monday to Friday between the given local hours.
    pub fn weekdays(start_hour: u32, end_hour: u32) -> Self {
        Self::new(
            [Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri],
            start_hour * 60,
            end_hour * 60,
        )
    }

    pub fn applies_to(&self, day: Weekday) -> bool {
        self.days.contains(&day)
    }

    /// Length of the window in absolute time.
    pub fn length(&self) -> Duration {
        Duration::minutes(i64::from(self.end_offset_minutes) - i64::from(self.start_offset_minutes))
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.start_offset_minutes >= self.end_offset_minutes {
            return Err(CoreError::InvalidWorkingHours(format!(
                "window opens at minute {} but closes at minute {}",
                self.start_offset_minutes, self.end_offset_minutes
            )));
        }
        if self.end_offset_minutes > MINUTES_PER_DAY {
            return Err(CoreError::InvalidWorkingHours(format!(
                "window closes at minute {}, past the end of the day",
                self.end_offset_minutes
            )));
        }
        Ok(())
    }
}

/// A user who publishes bookable time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Owner {
    pub id: i64,
    pub name: Option<String>,
    pub email: String,
    pub time_zone: String,
    #[serde(default)]
    pub working_hours: Vec<WorkingHoursRule>,
}

impl Owner {
    pub fn tz(&self) -> CoreResult<Tz> {
        self.time_zone
            .parse()
            .map_err(|_| CoreError::InvalidTimeZone(self.time_zone.clone()))
    }

    /// The owner as an event organizer.
    pub fn as_person(&self) -> Person {
        Person {
            email: self.email.clone(),
            name: self.name.clone(),
            time_zone: self.time_zone.clone(),
        }
    }
}

/// A bookable kind of meeting offered by an owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventType {
    pub id: i64,
    pub owner_id: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Optional title template; `{ATTENDEE}` is replaced by the attendee name.
    #[serde(default)]
    pub event_name: Option<String>,
    pub length_minutes: u32,
    /// Overrides the owner's working hours when non-empty.
    #[serde(default)]
    pub working_hours: Vec<WorkingHoursRule>,
    #[serde(default)]
    pub minimum_notice_minutes: u32,
    /// Distance between candidate slot starts; defaults to the length.
    #[serde(default)]
    pub slot_step_minutes: Option<u32>,
}

impl EventType {
    pub fn length(&self) -> Duration {
        Duration::minutes(i64::from(self.length_minutes))
    }

    pub fn minimum_notice(&self) -> Duration {
        Duration::minutes(i64::from(self.minimum_notice_minutes))
    }

    pub fn slot_step(&self) -> Option<Duration> {
        self.slot_step_minutes.map(|m| Duration::minutes(i64::from(m)))
    }

    /// Event-type rules when present, otherwise the owner's.
    pub fn effective_rules<'a>(&'a self, owner: &'a Owner) -> &'a [WorkingHoursRule] {
        if self.working_hours.is_empty() {
            &owner.working_hours
        } else {
            &self.working_hours
        }
    }

    /// Builds the title of a booking between `organizer` and `attendee`.
    pub fn booking_title(&self, organizer: &Person, attendee: &Person) -> String {
        match &self.event_name {
            Some(template) if !template.trim().is_empty() => {
                template.replace(ATTENDEE_PLACEHOLDER, attendee.display_name())
            }
            _ => format!(
                "{} between {} and {}",
                self.title,
                organizer.display_name(),
                attendee.display_name()
            ),
        }
    }
}
