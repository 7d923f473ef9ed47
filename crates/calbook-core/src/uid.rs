//! Deterministic booking identifiers.
//!
//! A booking uid is derived from the content of its [`CalendarEvent`]:
//! the event is serialized to its canonical JSON form, hashed into a
//! name-based (v5) UUID in the URL namespace, and re-encoded with the
//! Flickr base58 alphabet padded to a fixed width. Issued cancel and
//! reschedule links embed the uid, so every step of this pipeline is a
//! compatibility contract.

use uuid::Uuid;

use crate::error::CoreResult;
use crate::event::CalendarEvent;

/// Flickr base58 alphabet: digits, then lowercase, then uppercase, without `0 O I l`.
const ALPHABET: &[u8; 58] = b"123456789abcdefghijkmnopqrstuvwxyzABCDEFGHJKLMNPQRSTUVWXYZ";

/// Width of an encoded uid; 58^22 exceeds 2^128.
pub const SHORT_UID_LEN: usize = 22;

/// Serializes an event in its canonical form.
///
/// Keys appear in declaration order of [`CalendarEvent`] and instants are
/// formatted with whole seconds in UTC.
pub fn canonical_json(event: &CalendarEvent) -> CoreResult<String> {
    Ok(serde_json::to_string(event)?)
}

/// Returns the name-based UUID of `name` in the URL namespace.
pub fn name_uuid(name: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes())
}

/// Derives the uid of a booking from its event content.
pub fn booking_uid(event: &CalendarEvent) -> CoreResult<String> {
    let json = canonical_json(event)?;
    Ok(short_encode(&name_uuid(&json)))
}

/// Encodes a UUID in base58, left-padded to [`SHORT_UID_LEN`] characters.
pub fn short_encode(id: &Uuid) -> String {
    let mut n = id.as_u128();
    let mut digits = Vec::with_capacity(SHORT_UID_LEN);
    while n > 0 {
        digits.push(ALPHABET[(n % 58) as usize]);
        n /= 58;
    }
    digits.resize(digits.len().max(SHORT_UID_LEN), ALPHABET[0]);
    digits.iter().rev().map(|&b| char::from(b)).collect()
}

/// Decodes a uid produced by [`short_encode`].
///
/// Returns `None` for characters outside the alphabet or values that do not
/// fit in 128 bits.
pub fn short_decode(uid: &str) -> Option<Uuid> {
    let mut n: u128 = 0;
    for c in uid.bytes() {
        let digit = ALPHABET.iter().position(|&a| a == c)?;
        n = n.checked_mul(58)?.checked_add(digit as u128)?;
    }
    Some(Uuid::from_u128(n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Person;
    use chrono::{TimeZone, Utc};

    fn event() -> CalendarEvent {
        CalendarEvent {
            event_type: "Intro".into(),
            title: "Intro between Ada and Grace".into(),
            description: None,
            start_time: Utc.with_ymd_and_hms(2025, 2, 5, 10, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2025, 2, 5, 10, 30, 0).unwrap(),
            organizer: Person::new("ada@example.com", "Europe/Paris").with_name("Ada"),
            attendees: vec![
                Person::new("grace@example.com", "UTC").with_name("Grace"),
                Person::new("alan@example.com", "UTC").with_name("Alan"),
            ],
            location: None,
            conference_request: None,
        }
    }

    #[test]
    fn canonical_form() {
        let mut evt = event();
        evt.attendees.truncate(1);
        insta::assert_snapshot!(canonical_json(&evt).unwrap(), @r#"{"type":"Intro","title":"Intro between Ada and Grace","startTime":"2025-02-05T10:00:00Z","endTime":"2025-02-05T10:30:00Z","organizer":{"email":"ada@example.com","name":"Ada","timeZone":"Europe/Paris"},"attendees":[{"email":"grace@example.com","name":"Grace","timeZone":"UTC"}]}"#);
    }

    #[test]
    fn uid_is_stable() {
        let first = booking_uid(&event()).unwrap();
        let second = booking_uid(&event().clone()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), SHORT_UID_LEN);
        assert!(first.bytes().all(|b| ALPHABET.contains(&b)));
    }

    #[test]
    fn milliseconds_change_uid() {
        let mut shifted = event();
        shifted.start_time += chrono::Duration::milliseconds(1);
        assert_ne!(booking_uid(&shifted).unwrap(), booking_uid(&event()).unwrap());
    }

    #[test]
    fn attendee_email_changes_uid() {
        let mut changed = event();
        changed.attendees[0].email = "grace.hopper@example.com".into();
        assert_ne!(booking_uid(&event()).unwrap(), booking_uid(&changed).unwrap());
    }

    #[test]
    fn attendee_order_changes_uid() {
        let mut reordered = event();
        reordered.attendees.reverse();
        assert_ne!(booking_uid(&event()).unwrap(), booking_uid(&reordered).unwrap());
    }

    #[test]
    fn time_changes_uid() {
        let mut moved = event();
        moved.start_time += chrono::Duration::minutes(30);
        moved.end_time += chrono::Duration::minutes(30);
        assert_ne!(booking_uid(&event()).unwrap(), booking_uid(&moved).unwrap());
    }

    #[test]
    fn uid_decodes_to_name_uuid() {
        let evt = event();
        let uid = booking_uid(&evt).unwrap();
        let expected = name_uuid(&canonical_json(&evt).unwrap());
        assert_eq!(short_decode(&uid), Some(expected));
        assert_eq!(expected.get_version_num(), 5);
    }

    #[test]
    fn encoding_bounds() {
        assert_eq!(short_encode(&Uuid::nil()), "1".repeat(SHORT_UID_LEN));
        let max = short_encode(&Uuid::max());
        assert_eq!(max.len(), SHORT_UID_LEN);
        assert_eq!(short_decode(&max), Some(Uuid::max()));
        assert_eq!(short_encode(&Uuid::from_u128(57)), format!("{}Z", "1".repeat(21)));
    }

    #[test]
    fn decode_rejects_foreign_characters() {
        assert_eq!(short_decode("0OIl"), None);
        assert_eq!(short_decode(&"Z".repeat(30)), None);
    }

    #[test]
    fn name_uuid_is_deterministic() {
        assert_eq!(
            name_uuid("integrations:google:meet"),
            name_uuid("integrations:google:meet")
        );
        assert_ne!(name_uuid("a"), name_uuid("b"));
    }
}
