//! Google Calendar adapter.
//!
//! This module provides a [`GoogleCalendarAdapter`] that writes booking
//! events to the primary calendar of a Google account and reads busy time
//! through the free/busy endpoint.
//!
//! # Features
//!
//! - Lazy, single-flight access token refresh per credential
//! - Busy time restricted to the owner's selected calendars
//! - Google Meet conference creation on request
//! - Email reminder override and guest updates on change/cancel
//!
//! # Example
//!
//! ```ignore
//! use calbook_providers::google::{GoogleCalendarAdapter, GoogleConfig};
//!
//! let config = GoogleConfig::new(
//!     "your-client-id.apps.googleusercontent.com",
//!     "your-client-secret",
//! );
//! let adapter = GoogleCalendarAdapter::new(&config, &credential)?;
//! let calendars = adapter.list_calendars().await?;
//! ```

mod adapter;
mod client;
mod config;

pub use adapter::GoogleCalendarAdapter;
pub use client::CalendarListEntry;
pub use config::{CALENDAR_API_BASE, GOOGLE_TOKEN_URL, GoogleConfig};
