//! Core types: bookings, working hours, slot calculation, booking identifiers

pub mod availability;
pub mod booking;
pub mod error;
pub mod event;
pub mod integration;
pub mod schedule;
pub mod time;
pub mod tracing;
pub mod uid;

pub use availability::{
    BusyInterval, DaySlots, Slot, SlotDays, SlotRequest, compute_slots, merge_busy_intervals,
    slot_days,
};
pub use booking::{Booking, BookingReference};
pub use error::{CoreError, CoreResult};
pub use event::{CalendarEvent, ConferenceRequest, GOOGLE_MEET_LOCATION, Person};
pub use integration::{Credential, IntegrationCalendar, ProviderKind, ProviderType};
pub use schedule::{EventType, Owner, WorkingHoursRule};
pub use time::TimeWindow;
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
pub use uid::{booking_uid, name_uuid};
