//! Zoom video adapter.
//!
//! A video-kind adapter: it creates one scheduled meeting per booking and
//! reports the join URL back to the engine. Zoom has no calendars, so
//! [`ProviderAdapter::list_calendars`] and [`ProviderAdapter::busy_intervals`]
//! return nothing without touching the network.

use std::sync::Arc;
use std::time::Duration;

use calbook_core::event::wire_time;
use calbook_core::{
    BusyInterval, CalendarEvent, Credential, IntegrationCalendar, ProviderType, TimeWindow,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ProviderResult;
use crate::http;
use crate::oauth::{ClientAuth, OAuthApp, OAuthRefresher};
use crate::provider::{BoxFuture, EventResult, ProviderAdapter};
use crate::tokens::{TokenCache, TokenInfo, TokenRefresher, TokenStore};

/// Base URL for the Zoom REST API v2.
pub const ZOOM_API_BASE: &str = "https://api.zoom.us/v2";

/// Zoom OAuth token endpoint. Zoom expects client credentials as HTTP basic auth.
pub const ZOOM_TOKEN_URL: &str = "https://zoom.us/oauth/token";

/// Zoom meeting type for a meeting with a fixed start time.
const SCHEDULED_MEETING: u8 = 2;

#[derive(Debug, Clone)]
pub struct ZoomConfig {
    pub app: OAuthApp,
    pub api_base: String,
    pub timeout: Duration,
}

impl ZoomConfig {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            app: OAuthApp::new(client_id, client_secret, ZOOM_TOKEN_URL),
            api_base: ZOOM_API_BASE.to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.app.token_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug)]
pub struct ZoomVideoAdapter {
    provider: ProviderType,
    http_client: reqwest::Client,
    api_base: String,
    tokens: TokenCache,
}

impl ZoomVideoAdapter {
    pub fn new(config: &ZoomConfig, credential: &Credential) -> ProviderResult<Self> {
        let refresher =
            OAuthRefresher::new(config.app.clone(), config.timeout)?.with_client_auth(ClientAuth::Basic);
        Self::with_refresher(config, credential, Arc::new(refresher))
    }

    pub fn with_refresher(
        config: &ZoomConfig,
        credential: &Credential,
        refresher: Arc<dyn TokenRefresher>,
    ) -> ProviderResult<Self> {
        let provider = credential.provider.clone();
        let token = TokenInfo::from_key(&credential.key).map_err(|e| e.with_provider(provider.as_str()))?;
        Ok(Self {
            http_client: http::build_client(config.timeout)?,
            api_base: config.api_base.clone(),
            tokens: TokenCache::new(provider.clone(), token, refresher),
            provider,
        })
    }

    /// Builder: save refreshed tokens of `credential_id` to `store`.
    pub fn with_token_store(mut self, credential_id: i64, store: Arc<dyn TokenStore>) -> Self {
        self.tokens = self.tokens.with_store(credential_id, store);
        self
    }

    fn meeting_url(&self, meeting_id: &str) -> String {
        format!("{}/meetings/{}", self.api_base, urlencoding::encode(meeting_id))
    }

    async fn create_event_impl(&self, event: &CalendarEvent) -> ProviderResult<EventResult> {
        let token = self.tokens.access_token().await?;
        let result = async {
            let response = self
                .http_client
                .post(format!("{}/users/me/meetings", self.api_base))
                .bearer_auth(&token)
                .json(&MeetingPayload::from_event(event))
                .send()
                .await
                .map_err(http::send_error)?;
            http::read_json::<Meeting>(http::check(response).await?).await
        }
        .await;
        let meeting = self.tokens.observe(result).await?;
        debug!(meeting_id = meeting.id, "created Zoom meeting");
        Ok(EventResult::new(meeting.id.to_string()).with_meeting_url(meeting.join_url))
    }

    async fn update_event_impl(&self, external_id: &str, event: &CalendarEvent) -> ProviderResult<EventResult> {
        let token = self.tokens.access_token().await?;
        let result = async {
            let response = self
                .http_client
                .patch(self.meeting_url(external_id))
                .bearer_auth(&token)
                .json(&MeetingPayload::from_event(event))
                .send()
                .await
                .map_err(http::send_error)?;
            // 204 No Content: the meeting keeps its id and join URL.
            http::check(response).await.map(|_| ())
        }
        .await;
        self.tokens.observe(result).await?;
        Ok(EventResult::new(external_id))
    }

    async fn delete_event_impl(&self, external_id: &str) -> ProviderResult<()> {
        let token = self.tokens.access_token().await?;
        let result = async {
            let response = self
                .http_client
                .delete(self.meeting_url(external_id))
                .bearer_auth(&token)
                .send()
                .await
                .map_err(http::send_error)?;
            http::check(response).await.map(|_| ())
        }
        .await;
        self.tokens.observe(result).await
    }
}

impl ProviderAdapter for ZoomVideoAdapter {
    fn provider_type(&self) -> &ProviderType {
        &self.provider
    }

    fn list_calendars(&self) -> BoxFuture<'_, ProviderResult<Vec<IntegrationCalendar>>> {
        Box::pin(async { Ok(Vec::new()) })
    }

    fn busy_intervals<'a>(
        &'a self,
        _window: TimeWindow,
        _selected: &'a [IntegrationCalendar],
    ) -> BoxFuture<'a, ProviderResult<Vec<BusyInterval>>> {
        Box::pin(async { Ok(Vec::new()) })
    }

    fn create_event<'a>(&'a self, event: &'a CalendarEvent) -> BoxFuture<'a, ProviderResult<EventResult>> {
        Box::pin(self.create_event_impl(event))
    }

    fn update_event<'a>(
        &'a self,
        external_id: &'a str,
        event: &'a CalendarEvent,
    ) -> BoxFuture<'a, ProviderResult<EventResult>> {
        Box::pin(self.update_event_impl(external_id, event))
    }

    fn delete_event<'a>(&'a self, external_id: &'a str) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(self.delete_event_impl(external_id))
    }
}

#[derive(Debug, Serialize)]
struct MeetingPayload<'a> {
    topic: &'a str,
    #[serde(rename = "type")]
    kind: u8,
    #[serde(with = "wire_time")]
    start_time: DateTime<Utc>,
    /// Minutes.
    duration: i64,
    timezone: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    agenda: Option<&'a str>,
    settings: MeetingSettings,
}

impl<'a> MeetingPayload<'a> {
    fn from_event(event: &'a CalendarEvent) -> Self {
        Self {
            topic: &event.title,
            kind: SCHEDULED_MEETING,
            start_time: event.start_time,
            duration: event.duration_minutes(),
            timezone: &event.organizer.time_zone,
            agenda: event.description.as_deref(),
            settings: MeetingSettings::default(),
        }
    }
}

#[derive(Debug, Serialize)]
struct MeetingSettings {
    host_video: bool,
    participant_video: bool,
    join_before_host: bool,
    mute_upon_entry: bool,
    waiting_room: bool,
    auto_recording: &'static str,
}

impl Default for MeetingSettings {
    fn default() -> Self {
        Self {
            host_video: true,
            participant_video: true,
            join_before_host: true,
            mute_upon_entry: false,
            waiting_room: false,
            auto_recording: "none",
        }
    }
}

#[derive(Debug, Deserialize)]
struct Meeting {
    id: u64,
    #[serde(default)]
    join_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorCode;
    use calbook_core::Person;
    use chrono::TimeZone;
    use wiremock::matchers::{any, body_partial_json, header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credential(expiry: DateTime<Utc>) -> Credential {
        Credential {
            id: 9,
            owner_id: 1,
            provider: ProviderType::zoom_video(),
            key: serde_json::json!({
                "access_token": "zoom-token",
                "refresh_token": "zoom-refresh",
                "expiry_date": expiry.timestamp_millis(),
            }),
        }
    }

    fn adapter(server: &MockServer, expiry: DateTime<Utc>) -> ZoomVideoAdapter {
        let config = ZoomConfig::new("client", "secret")
            .with_api_base(server.uri())
            .with_token_url(format!("{}/oauth/token", server.uri()));
        ZoomVideoAdapter::new(&config, &credential(expiry)).unwrap()
    }

    fn fresh(server: &MockServer) -> ZoomVideoAdapter {
        adapter(server, Utc::now() + chrono::Duration::hours(1))
    }

    fn event() -> CalendarEvent {
        CalendarEvent {
            event_type: "Intro".into(),
            title: "Intro between Ada and Grace".into(),
            description: None,
            start_time: Utc.with_ymd_and_hms(2025, 2, 5, 10, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2025, 2, 5, 10, 45, 0).unwrap(),
            organizer: Person::new("ada@example.com", "Europe/Paris"),
            attendees: vec![Person::new("grace@example.com", "UTC")],
            location: None,
            conference_request: None,
        }
    }

    #[tokio::test]
    async fn create_meeting_returns_join_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/users/me/meetings"))
            .and(header("authorization", "Bearer zoom-token"))
            .and(body_partial_json(serde_json::json!({
                "topic": "Intro between Ada and Grace",
                "type": 2,
                "start_time": "2025-02-05T10:00:00Z",
                "duration": 45,
                "timezone": "Europe/Paris",
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": 85746065432u64,
                "join_url": "https://us02web.zoom.us/j/85746065432",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = fresh(&server).create_event(&event()).await.unwrap();
        assert_eq!(result.external_id, "85746065432");
        assert!(!result.suppress_attendee_notification);
        assert_eq!(
            result.meeting_url.as_deref(),
            Some("https://us02web.zoom.us/j/85746065432")
        );
    }

    #[tokio::test]
    async fn refresh_uses_basic_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "zoom-fresh",
                "expires_in": 3599,
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/meetings/123"))
            .and(header("authorization", "Bearer zoom-fresh"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = adapter(&server, Utc::now() - chrono::Duration::minutes(5));
        adapter.delete_event("123").await.unwrap();
    }

    #[tokio::test]
    async fn update_keeps_meeting_id() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/meetings/123"))
            .and(body_partial_json(serde_json::json!({"duration": 45})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let result = fresh(&server).update_event("123", &event()).await.unwrap();
        assert_eq!(result.external_id, "123");
    }

    #[tokio::test]
    async fn deleted_meeting_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "code": 3001,
                "message": "Meeting does not exist: 123.",
            })))
            .mount(&server)
            .await;

        let err = fresh(&server).delete_event("123").await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::NotFound);
        assert_eq!(err.provider(), Some("zoom_video"));
    }

    #[tokio::test]
    async fn no_calendars_and_no_busy_time() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let adapter = fresh(&server);
        assert!(adapter.list_calendars().await.unwrap().is_empty());
        let window = TimeWindow::new(
            Utc.with_ymd_and_hms(2025, 2, 5, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 2, 6, 0, 0, 0).unwrap(),
        )
        .unwrap();
        assert!(adapter.busy_intervals(window, &[]).await.unwrap().is_empty());
    }
}
