//! Integration types: provider identities, stored credentials and calendars.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The capability class of a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Owns calendars; contributes busy time and holds events.
    Calendar,
    /// Creates conference meetings; owns no calendars.
    Video,
}

/// The name of a provider integration, e.g. `google_calendar`.
///
/// Provider names are open-ended so that new adapters can be registered
/// without touching the orchestrator. The kind is derived from the suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderType(String);

impl ProviderType {
    pub const GOOGLE_CALENDAR: &'static str = "google_calendar";
    pub const OFFICE365_CALENDAR: &'static str = "office365_calendar";
    pub const ZOOM_VIDEO: &'static str = "zoom_video";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn google_calendar() -> Self {
        Self::new(Self::GOOGLE_CALENDAR)
    }

    pub fn office365_calendar() -> Self {
        Self::new(Self::OFFICE365_CALENDAR)
    }

    pub fn zoom_video() -> Self {
        Self::new(Self::ZOOM_VIDEO)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the kind encoded in the name suffix, if any.
    pub fn kind(&self) -> Option<ProviderKind> {
        if self.0.ends_with("_calendar") {
            Some(ProviderKind::Calendar)
        } else if self.0.ends_with("_video") {
            Some(ProviderKind::Video)
        } else {
            None
        }
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProviderType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// A stored credential for one provider integration of one owner.
///
/// The key is an opaque provider-specific blob; only token refresh fields
/// change after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub id: i64,
    pub owner_id: i64,
    #[serde(rename = "type")]
    pub provider: ProviderType,
    pub key: serde_json::Value,
}

impl Credential {
    pub fn kind(&self) -> Option<ProviderKind> {
        self.provider.kind()
    }
}

/// A calendar owned by a provider account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationCalendar {
    #[serde(rename = "integration")]
    pub provider: ProviderType,
    pub external_id: String,
    pub name: String,
    #[serde(default)]
    pub primary: bool,
}

impl IntegrationCalendar {
    pub fn new(provider: ProviderType, external_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            provider,
            external_id: external_id.into(),
            name: name.into(),
            primary: false,
        }
    }

    #[must_use]
    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_from_suffix() {
        assert_eq!(ProviderType::google_calendar().kind(), Some(ProviderKind::Calendar));
        assert_eq!(ProviderType::office365_calendar().kind(), Some(ProviderKind::Calendar));
        assert_eq!(ProviderType::zoom_video().kind(), Some(ProviderKind::Video));
        assert_eq!(ProviderType::new("stripe_payment").kind(), None);
    }

    #[test]
    fn credential_serde() {
        let json = r#"{"id":7,"ownerId":1,"type":"zoom_video","key":{"access_token":"t"}}"#;
        let credential: Credential = serde_json::from_str(json).unwrap();
        assert_eq!(credential.provider, ProviderType::zoom_video());
        assert_eq!(credential.kind(), Some(ProviderKind::Video));
        assert_eq!(credential.key["access_token"], "t");
    }

    #[test]
    fn calendar_serde() {
        let calendar = IntegrationCalendar::new(ProviderType::google_calendar(), "c1", "Work").primary();
        let json = serde_json::to_string(&calendar).unwrap();
        assert_eq!(
            json,
            r#"{"integration":"google_calendar","externalId":"c1","name":"Work","primary":true}"#
        );
    }
}
