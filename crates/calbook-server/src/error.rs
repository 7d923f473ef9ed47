//! Engine error types.

use calbook_core::CoreError;
use thiserror::Error;

use crate::config::ConfigError;
use crate::outcome::ProviderCallResult;

/// Result type for engine operations.
pub type BookingResult<T> = Result<T, BookingError>;

/// Result type for persistence operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// How bad an engine error is for the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// The request was refused before anything happened.
    Rejected,
    /// The operation failed without external side effects.
    Failed,
    /// External side effects happened but the local record does not match them.
    Critical,
}

/// Errors that can occur in the booking engine.
///
/// Per-provider failures are not errors of the operation; they are reported
/// in the per-provider results of a receipt.
#[derive(Debug, Error)]
pub enum BookingError {
    /// Start not before end, or a range outside the configured bounds.
    #[error("invalid time range: {0}")]
    InvalidTimeRange(String),

    /// Malformed request data.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("owner {0} not found")]
    OwnerNotFound(i64),

    #[error("event type {0} not found")]
    EventTypeNotFound(i64),

    #[error("booking {0} not found")]
    BookingNotFound(String),

    /// Duplicate uid or a concurrent change of the same booking.
    #[error("booking {uid} conflicts with a stored booking")]
    PersistenceConflict { uid: String },

    /// The store failed before any external side effect.
    #[error("persistence error: {0}")]
    Persistence(#[source] StoreError),

    /// The store failed after providers were already changed.
    #[error("booking {uid} is inconsistent: providers were updated but the local record was not ({source})")]
    Inconsistent {
        uid: String,
        provider_results: Vec<ProviderCallResult>,
        #[source]
        source: StoreError,
    },

    /// The booking identifier could not be derived.
    #[error("failed to derive booking identifier: {0}")]
    Identifier(#[source] CoreError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl BookingError {
    pub fn severity(&self) -> Severity {
        match self {
            Self::InvalidTimeRange(_)
            | Self::InvalidRequest(_)
            | Self::OwnerNotFound(_)
            | Self::EventTypeNotFound(_)
            | Self::BookingNotFound(_)
            | Self::PersistenceConflict { .. } => Severity::Rejected,
            Self::Persistence(_) | Self::Identifier(_) | Self::Config(_) => Severity::Failed,
            Self::Inconsistent { .. } => Severity::Critical,
        }
    }

    /// Maps a store failure that happened before any provider call.
    pub(crate) fn from_store(uid: &str, err: StoreError) -> Self {
        match err {
            StoreError::Conflict(_) | StoreError::NotFound(_) => Self::PersistenceConflict {
                uid: uid.to_string(),
            },
            other => Self::Persistence(other),
        }
    }
}

impl From<CoreError> for BookingError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidTimeRange { .. } | CoreError::InvalidDateRange { .. } => {
                Self::InvalidTimeRange(err.to_string())
            }
            CoreError::Serialization(_) => Self::Identifier(err),
            other => Self::InvalidRequest(other.to_string()),
        }
    }
}

/// Errors reported by a [`Store`](crate::Store).
#[derive(Debug, Error)]
pub enum StoreError {
    /// A booking with this uid already exists.
    #[error("booking {0} already exists")]
    Conflict(String),

    /// The booking to change no longer exists.
    #[error("booking {0} does not exist")]
    NotFound(String),

    /// The storage backend failed.
    #[error("store backend error: {0}")]
    Backend(String),
}
