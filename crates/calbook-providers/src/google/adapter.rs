//! Google Calendar adapter.
//!
//! This module implements the [`ProviderAdapter`] trait for Google Calendar.

use std::sync::Arc;

use calbook_core::{
    BusyInterval, CalendarEvent, Credential, IntegrationCalendar, ProviderType, TimeWindow,
};
use tracing::{debug, instrument};

use crate::error::ProviderResult;
use crate::oauth::OAuthRefresher;
use crate::provider::{BoxFuture, CalendarSelection, EventResult, ProviderAdapter};
use crate::tokens::{TokenCache, TokenInfo, TokenRefresher, TokenStore};

use super::client::{EventPayload, GoogleCalendarClient};
use super::config::GoogleConfig;

/// Google Calendar adapter bound to one credential.
///
/// Events are written to the primary calendar; Google sends its own updates
/// to guests on change and cancellation, but invitation emails for new
/// bookings still come from the engine.
#[derive(Debug)]
pub struct GoogleCalendarAdapter {
    provider: ProviderType,
    client: GoogleCalendarClient,
    tokens: TokenCache,
    email_reminder_minutes: u32,
}

impl GoogleCalendarAdapter {
    /// Creates an adapter for `credential`, refreshing through Google's token endpoint.
    pub fn new(config: &GoogleConfig, credential: &Credential) -> ProviderResult<Self> {
        let refresher = OAuthRefresher::new(config.app.clone(), config.timeout)?;
        Self::with_refresher(config, credential, Arc::new(refresher))
    }

    /// Creates an adapter with a custom token refresher.
    pub fn with_refresher(
        config: &GoogleConfig,
        credential: &Credential,
        refresher: Arc<dyn TokenRefresher>,
    ) -> ProviderResult<Self> {
        let provider = credential.provider.clone();
        let token = TokenInfo::from_key(&credential.key).map_err(|e| e.with_provider(provider.as_str()))?;
        Ok(Self {
            client: GoogleCalendarClient::new(&config.api_base, config.timeout)?,
            tokens: TokenCache::new(provider.clone(), token, refresher),
            email_reminder_minutes: config.email_reminder_minutes,
            provider,
        })
    }

    /// Builder: save refreshed tokens of `credential_id` to `store`.
    pub fn with_token_store(mut self, credential_id: i64, store: Arc<dyn TokenStore>) -> Self {
        self.tokens = self.tokens.with_store(credential_id, store);
        self
    }

    async fn list_calendars_impl(&self) -> ProviderResult<Vec<IntegrationCalendar>> {
        let token = self.tokens.access_token().await?;
        let result = self.client.list_calendars(&token).await;
        let entries = self.tokens.observe(result).await?;

        Ok(entries
            .into_iter()
            .map(|entry| {
                let name = entry.summary.unwrap_or_else(|| entry.id.clone());
                let calendar = IntegrationCalendar::new(self.provider.clone(), entry.id, name);
                if entry.primary.unwrap_or(false) {
                    calendar.primary()
                } else {
                    calendar
                }
            })
            .collect())
    }

    #[instrument(skip(self, selected), fields(provider = %self.provider))]
    async fn busy_intervals_impl(
        &self,
        window: TimeWindow,
        selected: &[IntegrationCalendar],
    ) -> ProviderResult<Vec<BusyInterval>> {
        let ids: Vec<String> = match CalendarSelection::for_provider(&self.provider, selected) {
            CalendarSelection::None => {
                debug!("no selected calendar belongs to this account");
                return Ok(Vec::new());
            }
            CalendarSelection::Only(ids) => ids.into_iter().map(String::from).collect(),
            CalendarSelection::All => self
                .list_calendars_impl()
                .await?
                .into_iter()
                .map(|c| c.external_id)
                .collect(),
        };
        if ids.is_empty() || window.is_empty() {
            return Ok(Vec::new());
        }

        let token = self.tokens.access_token().await?;
        let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let result = self.client.free_busy(&token, window, &id_refs).await;
        self.tokens.observe(result).await
    }

    async fn create_event_impl(&self, event: &CalendarEvent) -> ProviderResult<EventResult> {
        let token = self.tokens.access_token().await?;
        let payload = EventPayload::from_event(event, self.email_reminder_minutes);
        let result = self.client.insert_event(&token, &payload).await;
        let created = self.tokens.observe(result).await?;
        debug!(event_id = %created.id, "created Google Calendar event");
        Ok(EventResult::new(created.id).with_meeting_url(created.hangout_link))
    }

    async fn update_event_impl(&self, external_id: &str, event: &CalendarEvent) -> ProviderResult<EventResult> {
        let token = self.tokens.access_token().await?;
        let payload = EventPayload::from_event(event, self.email_reminder_minutes);
        let result = self.client.update_event(&token, external_id, &payload).await;
        let updated = self.tokens.observe(result).await?;
        Ok(EventResult::new(updated.id).with_meeting_url(updated.hangout_link))
    }

    async fn delete_event_impl(&self, external_id: &str) -> ProviderResult<()> {
        let token = self.tokens.access_token().await?;
        let result = self.client.delete_event(&token, external_id).await;
        self.tokens.observe(result).await
    }
}

impl ProviderAdapter for GoogleCalendarAdapter {
    fn provider_type(&self) -> &ProviderType {
        &self.provider
    }

    fn list_calendars(&self) -> BoxFuture<'_, ProviderResult<Vec<IntegrationCalendar>>> {
        Box::pin(self.list_calendars_impl())
    }

    fn busy_intervals<'a>(
        &'a self,
        window: TimeWindow,
        selected: &'a [IntegrationCalendar],
    ) -> BoxFuture<'a, ProviderResult<Vec<BusyInterval>>> {
        Box::pin(self.busy_intervals_impl(window, selected))
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorCode;
    use calbook_core::Person;
    use chrono::{Duration, TimeZone, Utc};
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credential(expiry: chrono::DateTime<Utc>) -> Credential {
        Credential {
            id: 1,
            owner_id: 1,
            provider: ProviderType::google_calendar(),
            key: serde_json::json!({
                "access_token": "valid-token",
                "refresh_token": "refresh-token",
                "expiry_date": expiry.timestamp_millis(),
            }),
        }
    }

    fn adapter(server: &MockServer, expiry: chrono::DateTime<Utc>) -> GoogleCalendarAdapter {
        let config = GoogleConfig::new("client", "secret")
            .with_api_base(server.uri())
            .with_token_url(format!("{}/token", server.uri()));
        GoogleCalendarAdapter::new(&config, &credential(expiry)).unwrap()
    }

    fn fresh(server: &MockServer) -> GoogleCalendarAdapter {
        adapter(server, Utc::now() + Duration::hours(1))
    }

    fn event() -> CalendarEvent {
        CalendarEvent {
            event_type: "Intro".into(),
            title: "Intro between Ada and Grace".into(),
            description: None,
            start_time: Utc.with_ymd_and_hms(2025, 2, 5, 10, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2025, 2, 5, 10, 30, 0).unwrap(),
            organizer: Person::new("ada@example.com", "UTC"),
            attendees: vec![Person::new("grace@example.com", "UTC")],
            location: Some("Room 1".into()),
            conference_request: None,
        }
    }

    fn window() -> TimeWindow {
        TimeWindow::new(
            Utc.with_ymd_and_hms(2025, 2, 5, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 2, 6, 0, 0, 0).unwrap(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn create_event_returns_external_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/calendars/primary/events"))
            .and(query_param("conferenceDataVersion", "1"))
            .and(header("authorization", "Bearer valid-token"))
            .and(body_partial_json(serde_json::json!({
                "summary": "Intro between Ada and Grace",
                "location": "Room 1",
                "reminders": {"useDefault": false},
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "evt-1",
                "hangoutLink": "https://meet.google.com/abc-defg-hij",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = fresh(&server).create_event(&event()).await.unwrap();
        assert_eq!(result.external_id, "evt-1");
        assert!(!result.suppress_attendee_notification);
        assert_eq!(result.meeting_url.as_deref(), Some("https://meet.google.com/abc-defg-hij"));
    }

    #[tokio::test]
    async fn expired_token_is_refreshed_before_the_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "refreshed-token",
                "expires_in": 3600,
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/calendars/primary/events"))
            .and(header("authorization", "Bearer refreshed-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "evt-2"})))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = adapter(&server, Utc::now() - Duration::hours(1));
        assert_eq!(adapter.create_event(&event()).await.unwrap().external_id, "evt-2");
    }

    #[tokio::test]
    async fn failed_refresh_is_auth_expired() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
            .mount(&server)
            .await;

        let adapter = adapter(&server, Utc::now() - Duration::hours(1));
        let err = adapter.list_calendars().await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::AuthExpired);
    }

    #[tokio::test]
    async fn forbidden_quota_error_is_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/me/calendarList"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "error": {
                    "code": 403,
                    "message": "Rate Limit Exceeded",
                    "errors": [{"domain": "usageLimits", "reason": "rateLimitExceeded"}],
                }
            })))
            .mount(&server)
            .await;

        let err = fresh(&server).list_calendars().await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::RateLimited);
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn forbidden_without_quota_reason_is_auth_expired() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/me/calendarList"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "error": {"code": 403, "errors": [{"reason": "insufficientPermissions"}]}
            })))
            .mount(&server)
            .await;

        let err = fresh(&server).list_calendars().await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::AuthExpired);
    }

    #[tokio::test]
    async fn update_uses_put_with_send_updates() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/calendars/primary/events/ext-123"))
            .and(query_param("sendUpdates", "all"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "ext-123"})))
            .expect(1)
            .mount(&server)
            .await;

        let result = fresh(&server).update_event("ext-123", &event()).await.unwrap();
        assert_eq!(result.external_id, "ext-123");
    }

    #[tokio::test]
    async fn delete_of_missing_event_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/calendars/primary/events/gone"))
            .respond_with(ResponseTemplate::new(410))
            .mount(&server)
            .await;

        let err = fresh(&server).delete_event("gone").await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::NotFound);
        assert_eq!(err.provider(), Some("google_calendar"));
    }

    #[tokio::test]
    async fn server_error_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = fresh(&server).delete_event("evt").await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::ProviderUnavailable);
    }

    #[tokio::test]
    async fn list_calendars_maps_entries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/me/calendarList"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [
                    {"id": "ada@example.com", "summary": "Ada", "primary": true},
                    {"id": "team@group.calendar.google.com"},
                ]
            })))
            .mount(&server)
            .await;

        let calendars = fresh(&server).list_calendars().await.unwrap();
        assert_eq!(calendars.len(), 2);
        assert!(calendars[0].primary);
        assert_eq!(calendars[0].name, "Ada");
        assert_eq!(calendars[1].name, "team@group.calendar.google.com");
        assert_eq!(calendars[1].provider, ProviderType::google_calendar());
    }

    #[tokio::test]
    async fn busy_intervals_for_selected_calendars() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/freeBusy"))
            .and(body_partial_json(serde_json::json!({"items": [{"id": "work"}]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "calendars": {
                    "work": {"busy": [
                        {"start": "2025-02-05T09:00:00Z", "end": "2025-02-05T10:00:00Z"}
                    ]}
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let selected = [IntegrationCalendar::new(ProviderType::google_calendar(), "work", "Work")];
        let busy = fresh(&server).busy_intervals(window(), &selected).await.unwrap();
        assert_eq!(
            busy,
            vec![BusyInterval::new(
                Utc.with_ymd_and_hms(2025, 2, 5, 9, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2025, 2, 5, 10, 0, 0).unwrap(),
            )]
        );
    }

    #[tokio::test]
    async fn busy_intervals_without_selection_query_every_calendar() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/me/calendarList"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [{"id": "a"}, {"id": "b"}]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/freeBusy"))
            .and(body_partial_json(serde_json::json!({"items": [{"id": "a"}, {"id": "b"}]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"calendars": {}})))
            .expect(1)
            .mount(&server)
            .await;

        let busy = fresh(&server).busy_intervals(window(), &[]).await.unwrap();
        assert!(busy.is_empty());
    }

    #[tokio::test]
    async fn selection_of_other_provider_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(wiremock::matchers::any())
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let selected = [IntegrationCalendar::new(ProviderType::office365_calendar(), "AAMk", "Work")];
        let busy = fresh(&server).busy_intervals(window(), &selected).await.unwrap();
        assert!(busy.is_empty());
    }

    #[test]
    fn malformed_key_is_configuration_error() {
        let config = GoogleConfig::new("client", "secret");
        let mut credential = credential(Utc::now());
        credential.key = serde_json::json!("not-a-token");
        let err = GoogleCalendarAdapter::new(&config, &credential).unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::Configuration);
    }
}
