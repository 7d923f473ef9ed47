//! Provider adapters for external calendar and video services.
//!
//! - [`ProviderAdapter`] - The uniform interface every provider implements
//! - [`AdapterRegistry`] - Maps credentials to ready-to-use adapters
//! - [`TokenCache`] - Single-flight OAuth token refresh per adapter
//! - [`ProviderError`] - Errors carrying a stable [`ProviderErrorCode`]
//!
//! # Architecture
//!
//! ```text
//!  Credential ──► AdapterRegistry ──► Arc<dyn ProviderAdapter>
//!                      │
//!        ┌─────────────┼──────────────┐
//!        ▼             ▼              ▼
//!  GoogleCalendar  Office365      ZoomVideo
//!        │             │              │
//!        └──────► TokenCache ◄────────┘
//!                      │
//!                      ▼
//!               OAuthRefresher
//! ```
//!
//! Each built-in provider sits behind a cargo feature of the same name.

pub mod error;
#[cfg(feature = "google")]
pub mod google;
mod http;
pub mod oauth;
#[cfg(feature = "office365")]
pub mod office365;
pub mod provider;
pub mod registry;
pub mod tokens;
#[cfg(feature = "zoom")]
pub mod zoom;

pub use error::{ProviderError, ProviderErrorCode, ProviderResult};
pub use oauth::{ClientAuth, OAuthApp, OAuthRefresher};
pub use provider::{BoxFuture, CalendarSelection, EventResult, ProviderAdapter};
pub use registry::{AdapterFactory, AdapterRegistry, BoundAdapter, ProvidersConfig};
pub use tokens::{RefreshedToken, TokenCache, TokenInfo, TokenRefresher, TokenStore};
