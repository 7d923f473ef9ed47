//! Local booking records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::event::Person;
use crate::integration::ProviderType;

/// Links a booking to the external event or meeting one provider created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingReference {
    #[serde(rename = "type")]
    pub provider: ProviderType,
    pub external_id: String,
}

impl BookingReference {
    pub fn new(provider: ProviderType, external_id: impl Into<String>) -> Self {
        Self {
            provider,
            external_id: external_id.into(),
        }
    }
}

/// The local source of truth for a confirmed booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub uid: String,
    pub owner_id: i64,
    pub event_type_id: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub attendees: Vec<Person>,
    #[serde(default)]
    pub references: Vec<BookingReference>,
}

impl Booking {
    /// Checks that the time range is valid and that each provider is
    /// referenced at most once.
    pub fn validate(&self) -> CoreResult<()> {
        if self.start_time >= self.end_time {
            return Err(CoreError::InvalidTimeRange {
                start: self.start_time,
                end: self.end_time,
            });
        }
        for (i, reference) in self.references.iter().enumerate() {
            if self.references[..i]
                .iter()
                .any(|r| r.provider == reference.provider)
            {
                return Err(CoreError::InvalidBooking(format!(
                    "provider {} referenced twice",
                    reference.provider
                )));
            }
        }
        Ok(())
    }

    pub fn reference_for(&self, provider: &ProviderType) -> Option<&BookingReference> {
        self.references.iter().find(|r| &r.provider == provider)
    }

    /// Adds a reference unless the provider is already referenced.
    ///
    /// Returns `false` when the reference was not added.
    pub fn add_reference(&mut self, reference: BookingReference) -> bool {
        if self.reference_for(&reference.provider).is_some() {
            return false;
        }
        self.references.push(reference);
        true
    }

    /// Checks if the booking overlaps `[start, end)`.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start_time < end && self.end_time > start
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn booking() -> Booking {
        Booking {
            uid: "uid".into(),
            owner_id: 1,
            event_type_id: 2,
            title: "Call".into(),
            description: None,
            location: None,
            start_time: Utc.with_ymd_and_hms(2025, 2, 5, 10, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2025, 2, 5, 10, 30, 0).unwrap(),
            attendees: vec![Person::new("a@example.com", "UTC")],
            references: Vec::new(),
        }
    }

    #[test]
    fn one_reference_per_provider() {
        let mut b = booking();
        assert!(b.add_reference(BookingReference::new(ProviderType::google_calendar(), "g1")));
        assert!(!b.add_reference(BookingReference::new(ProviderType::google_calendar(), "g2")));
        assert!(b.add_reference(BookingReference::new(ProviderType::zoom_video(), "z1")));
        assert_eq!(b.references.len(), 2);
        assert_eq!(
            b.reference_for(&ProviderType::google_calendar()).map(|r| r.external_id.as_str()),
            Some("g1")
        );
        assert!(b.validate().is_ok());
    }

    #[test]
    fn validate_rejects_duplicate_providers() {
        let mut b = booking();
        b.references = vec![
            BookingReference::new(ProviderType::google_calendar(), "g1"),
            BookingReference::new(ProviderType::google_calendar(), "g2"),
        ];
        assert!(matches!(b.validate(), Err(CoreError::InvalidBooking(_))));
    }

    #[test]
    fn validate_rejects_empty_range() {
        let mut b = booking();
        b.end_time = b.start_time;
        assert!(b.validate().is_err());
    }

    #[test]
    fn overlap_is_half_open() {
        let b = booking();
        assert!(b.overlaps(b.start_time, b.end_time));
        assert!(!b.overlaps(b.end_time, b.end_time + chrono::Duration::minutes(30)));
    }
}
