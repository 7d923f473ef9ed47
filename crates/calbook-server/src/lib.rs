//! Booking engine: availability queries and booking orchestration.
//!
//! This crate ties the core types and the provider adapters together:
//! - [`BookingEngine`] computes availability and creates, reschedules and
//!   cancels bookings across every connected provider
//! - [`FanOut`] runs adapter calls with bounded concurrency and per-call
//!   deadlines
//! - [`Store`] is the persistence boundary, with [`InMemoryStore`] as the
//!   bundled implementation
//! - [`NotificationGateway`] is the boundary towards the mail service
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use calbook_server::{BookingEngine, EngineConfig, InMemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EngineConfig::load()?;
//!     let engine = BookingEngine::from_config(&config, Arc::new(InMemoryStore::new()))?;
//!     let from = chrono::NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
//!     let to = chrono::NaiveDate::from_ymd_opt(2025, 3, 8).unwrap();
//!     let slots = engine.compute_availability(1, from, to, None).await?;
//!     println!("{} free slots", slots.len());
//!     Ok(())
//! }
//! ```

pub mod cli;
mod claims;
mod config;
mod engine;
mod error;
mod fanout;
mod notify;
mod outcome;
mod secret;
mod store;
#[cfg(test)]
mod testing;

pub use config::{
    AvailabilitySettings, ConfigError, EngineConfig, FanOutSettings, LinkSettings, ProviderClient,
    ProviderSettings,
};
pub use engine::{BookingEngine, Clock, CreateBookingRequest};
pub use error::{BookingError, BookingResult, Severity, StoreError, StoreResult};
pub use fanout::FanOut;
pub use notify::{
    BookingNotification, LinkBuilder, NotificationGateway, NotificationKind, NotifyError,
    TracingNotifier,
};
pub use outcome::{BookingReceipt, CancelAck, ProviderCallResult, ProviderOutcome};
pub use store::{InMemoryStore, Snapshot, Store, StoreTokens};
