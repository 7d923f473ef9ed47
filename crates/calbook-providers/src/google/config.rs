//! Google Calendar adapter configuration.

use std::time::Duration;

use crate::oauth::OAuthApp;

/// Base URL for Google Calendar API v3.
pub const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

/// Google's OAuth 2.0 token endpoint.
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Configuration shared by every Google Calendar credential.
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    /// OAuth client registration used for token refresh.
    pub app: OAuthApp,

    /// Calendar API base URL.
    pub api_base: String,

    /// Request timeout.
    pub timeout: Duration,

    /// Minutes before the event at which Google sends an email reminder.
    pub email_reminder_minutes: u32,
}

impl GoogleConfig {
    /// Creates a configuration pointing at the public Google endpoints.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            app: OAuthApp::new(client_id, client_secret, GOOGLE_TOKEN_URL),
            api_base: CALENDAR_API_BASE.to_string(),
            timeout: Duration::from_secs(30),
            email_reminder_minutes: 60,
        }
    }

    /// Builder method to set the Calendar API base URL.
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    /// Builder method to set the token endpoint.
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.app.token_url = url.into();
        self
    }

    /// Builder method to set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
