//! Per-provider results reported back to the caller.

use calbook_core::ProviderType;
use calbook_providers::{EventResult, ProviderError, ProviderErrorCode};
use serde::{Deserialize, Serialize};

/// What happened at one provider during an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProviderOutcome {
    #[serde(rename_all = "camelCase")]
    Succeeded {
        external_id: String,
        suppress_attendee_notification: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        meeting_url: Option<String>,
    },
    Failed {
        code: ProviderErrorCode,
        message: String,
    },
    /// The provider was deliberately not called.
    Skipped { reason: String },
}

/// The result of one provider within a receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCallResult {
    #[serde(rename = "providerType")]
    pub provider: ProviderType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_id: Option<i64>,
    pub outcome: ProviderOutcome,
}

impl ProviderCallResult {
    pub fn new(provider: ProviderType, credential_id: Option<i64>, outcome: ProviderOutcome) -> Self {
        Self {
            provider,
            credential_id,
            outcome,
        }
    }

    pub fn from_event(provider: ProviderType, credential_id: i64, result: Result<EventResult, ProviderError>) -> Self {
        let outcome = match result {
            Ok(event) => ProviderOutcome::Succeeded {
                external_id: event.external_id,
                suppress_attendee_notification: event.suppress_attendee_notification,
                meeting_url: event.meeting_url,
            },
            Err(e) => ProviderOutcome::failed(&e),
        };
        Self::new(provider, Some(credential_id), outcome)
    }

    pub fn skipped(provider: ProviderType, credential_id: Option<i64>, reason: impl Into<String>) -> Self {
        Self::new(
            provider,
            credential_id,
            ProviderOutcome::Skipped {
                reason: reason.into(),
            },
        )
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ProviderOutcome::Succeeded { .. })
    }

    pub fn external_id(&self) -> Option<&str> {
        match &self.outcome {
            ProviderOutcome::Succeeded { external_id, .. } => Some(external_id),
            _ => None,
        }
    }
}

impl ProviderOutcome {
    pub fn failed(err: &ProviderError) -> Self {
        Self::Failed {
            code: err.code(),
            message: err.message().to_string(),
        }
    }
}

/// Returns true if any successful provider asked to skip the attendee email.
pub fn suppresses_attendee_notification(results: &[ProviderCallResult]) -> bool {
    results.iter().any(|r| {
        matches!(
            r.outcome,
            ProviderOutcome::Succeeded {
                suppress_attendee_notification: true,
                ..
            }
        )
    })
}

/// The first conference join URL reported by a provider.
pub fn meeting_url(results: &[ProviderCallResult]) -> Option<&str> {
    results.iter().find_map(|r| match &r.outcome {
        ProviderOutcome::Succeeded {
            meeting_url: Some(url),
            ..
        } => Some(url.as_str()),
        _ => None,
    })
}

/// Result of a create or reschedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingReceipt {
    pub uid: String,
    pub provider_results: Vec<ProviderCallResult>,
}

impl BookingReceipt {
    pub fn succeeded(&self) -> impl Iterator<Item = &ProviderCallResult> {
        self.provider_results.iter().filter(|r| r.is_success())
    }

    pub fn failed(&self) -> impl Iterator<Item = &ProviderCallResult> {
        self.provider_results
            .iter()
            .filter(|r| matches!(r.outcome, ProviderOutcome::Failed { .. }))
    }
}

/// Result of a cancellation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelAck {
    pub uid: String,
    pub provider_results: Vec<ProviderCallResult>,
    /// False when the booking did not exist or was kept for a retry.
    pub booking_removed: bool,
}
