//! Office 365 calendar adapter over Microsoft Graph.
//!
//! Events are written to the default calendar of the account. Graph sends
//! its own invitation to attendees, so created events ask the engine to
//! suppress its attendee email.

use std::sync::Arc;
use std::time::Duration;

use calbook_core::{
    BusyInterval, CalendarEvent, Credential, IntegrationCalendar, ProviderType, TimeWindow,
};
use chrono::{NaiveDateTime, SecondsFormat, Utc};
use futures_util::future::try_join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{ProviderError, ProviderResult};
use crate::http;
use crate::oauth::{OAuthApp, OAuthRefresher};
use crate::provider::{BoxFuture, CalendarSelection, EventResult, ProviderAdapter};
use crate::tokens::{TokenCache, TokenInfo, TokenRefresher, TokenStore};

/// Base URL for Microsoft Graph v1.0.
pub const GRAPH_API_BASE: &str = "https://graph.microsoft.com/v1.0";

/// Microsoft identity platform token endpoint.
pub const MICROSOFT_TOKEN_URL: &str = "https://login.microsoftonline.com/common/oauth2/v2.0/token";

/// Scopes requested on refresh.
pub const GRAPH_SCOPE: &str = "User.Read Calendars.Read Calendars.ReadWrite offline_access";

/// Graph returns calendar view times in this zone when asked.
const UTC_PREFERENCE: &str = "outlook.timezone=\"Etc/GMT\"";

/// Follow at most this many `@odata.nextLink` pages per calendar.
const MAX_PAGES: usize = 20;

const GRAPH_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Clone)]
pub struct Office365Config {
    pub app: OAuthApp,
    pub api_base: String,
    pub timeout: Duration,
}

impl Office365Config {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            app: OAuthApp::new(client_id, client_secret, MICROSOFT_TOKEN_URL),
            api_base: GRAPH_API_BASE.to_string(),
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

/// Office 365 adapter bound to one credential.
#[derive(Debug)]
pub struct Office365CalendarAdapter {
    provider: ProviderType,
    http_client: reqwest::Client,
    api_base: String,
    tokens: TokenCache,
}

impl Office365CalendarAdapter {
    pub fn new(config: &Office365Config, credential: &Credential) -> ProviderResult<Self> {
        let refresher = OAuthRefresher::new(config.app.clone(), config.timeout)?.with_scope(GRAPH_SCOPE);
        Self::with_refresher(config, credential, Arc::new(refresher))
    }

    pub fn with_refresher(
        config: &Office365Config,
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

    fn event_url(&self, external_id: &str) -> String {
        format!(
            "{}/me/calendar/events/{}",
            self.api_base,
            urlencoding::encode(external_id)
        )
    }

    async fn get_calendars(&self, token: &str) -> ProviderResult<Vec<GraphCalendar>> {
        let response = self
            .http_client
            .get(format!("{}/me/calendars", self.api_base))
            .bearer_auth(token)
            .send()
            .await
            .map_err(http::send_error)?;
        let page: GraphPage<GraphCalendar> = http::read_json(http::check(response).await?).await?;
        Ok(page.value)
    }

    /// Reads the calendar view of one calendar, following pagination.
    async fn calendar_view(
        &self,
        token: &str,
        calendar_id: &str,
        window: TimeWindow,
    ) -> ProviderResult<Vec<BusyInterval>> {
        let first = format!(
            "{}/me/calendars/{}/calendarView",
            self.api_base,
            urlencoding::encode(calendar_id)
        );
        let start = window.start.to_rfc3339_opts(SecondsFormat::Secs, true);
        let end = window.end.to_rfc3339_opts(SecondsFormat::Secs, true);

        let mut busy = Vec::new();
        let mut next: Option<String> = None;
        for _ in 0..MAX_PAGES {
            let request = match &next {
                Some(link) => self.http_client.get(link),
                None => self.http_client.get(&first).query(&[
                    ("startDateTime", start.as_str()),
                    ("endDateTime", end.as_str()),
                    ("$select", "start,end,showAs"),
                ]),
            };
            let response = request
                .bearer_auth(token)
                .header("Prefer", UTC_PREFERENCE)
                .send()
                .await
                .map_err(http::send_error)?;
            let page: GraphPage<GraphViewEvent> = http::read_json(http::check(response).await?).await?;

            for event in page.value {
                if event.show_as.as_deref() == Some("free") {
                    continue;
                }
                busy.push(BusyInterval::new(
                    event.start.to_utc()?,
                    event.end.to_utc()?,
                ));
            }

            match page.next_link {
                Some(link) => next = Some(link),
                None => return Ok(busy),
            }
        }
        debug!(calendar = %calendar_id, "calendar view truncated after {} pages", MAX_PAGES);
        Ok(busy)
    }

    async fn list_calendars_impl(&self) -> ProviderResult<Vec<IntegrationCalendar>> {
        let token = self.tokens.access_token().await?;
        let result = self.get_calendars(&token).await;
        let calendars = self.tokens.observe(result).await?;
        Ok(calendars
            .into_iter()
            .map(|c| {
                let calendar = IntegrationCalendar::new(self.provider.clone(), c.id, c.name);
                if c.is_default_calendar { calendar.primary() } else { calendar }
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
            CalendarSelection::None => return Ok(Vec::new()),
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
        let views = ids.iter().map(|id| self.calendar_view(&token, id, window));
        let result = try_join_all(views).await;
        let busy: Vec<BusyInterval> = self.tokens.observe(result).await?.into_iter().flatten().collect();
        debug!("fetched {} busy events from {} calendars", busy.len(), ids.len());
        Ok(busy)
    }

    async fn create_event_impl(&self, event: &CalendarEvent) -> ProviderResult<EventResult> {
        let token = self.tokens.access_token().await?;
        let result = async {
            let response = self
                .http_client
                .post(format!("{}/me/calendar/events", self.api_base))
                .bearer_auth(&token)
                .json(&GraphEvent::from_event(event))
                .send()
                .await
                .map_err(http::send_error)?;
            http::read_json::<GraphCreated>(http::check(response).await?).await
        }
        .await;
        let created = self.tokens.observe(result).await?;
        debug!(event_id = %created.id, "created Office 365 event");
        Ok(EventResult::new(created.id)
            .suppressing_attendee_notification()
            .with_meeting_url(created.online_meeting.and_then(|m| m.join_url)))
    }

    async fn update_event_impl(&self, external_id: &str, event: &CalendarEvent) -> ProviderResult<EventResult> {
        let token = self.tokens.access_token().await?;
        let result = async {
            let response = self
                .http_client
                .patch(self.event_url(external_id))
                .bearer_auth(&token)
                .json(&GraphEvent::from_event(event))
                .send()
                .await
                .map_err(http::send_error)?;
            http::read_json::<GraphCreated>(http::check(response).await?).await
        }
        .await;
        let updated = self.tokens.observe(result).await?;
        Ok(EventResult::new(updated.id).suppressing_attendee_notification())
    }

    async fn delete_event_impl(&self, external_id: &str) -> ProviderResult<()> {
        let token = self.tokens.access_token().await?;
        let result = async {
            let response = self
                .http_client
                .delete(self.event_url(external_id))
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

impl ProviderAdapter for Office365CalendarAdapter {
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

#[derive(Debug, Deserialize)]
struct GraphPage<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
    #[serde(default, rename = "@odata.nextLink")]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphCalendar {
    id: String,
    name: String,
    #[serde(default)]
    is_default_calendar: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphViewEvent {
    start: GraphDateTime,
    end: GraphDateTime,
    #[serde(default)]
    show_as: Option<String>,
}

/// Graph date-time: a naive local time plus the zone it is expressed in.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphDateTime {
    date_time: String,
    #[serde(default)]
    time_zone: Option<String>,
}

impl GraphDateTime {
    fn utc(time: chrono::DateTime<Utc>) -> Self {
        Self {
            date_time: time.format(GRAPH_DATE_FORMAT).to_string(),
            time_zone: Some("UTC".to_string()),
        }
    }

    /// Interprets the naive time as UTC; views are requested in `Etc/GMT`.
    fn to_utc(&self) -> ProviderResult<chrono::DateTime<Utc>> {
        // Graph returns seven fractional digits ("2025-02-05T09:00:00.0000000").
        let trimmed = self.date_time.split('.').next().unwrap_or_default();
        NaiveDateTime::parse_from_str(trimmed, GRAPH_DATE_FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(|e| {
                ProviderError::invalid_response(format!("bad dateTime {:?}: {}", self.date_time, e))
                    .with_source(e)
            })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphEvent<'a> {
    subject: &'a str,
    body: GraphBody<'a>,
    start: GraphDateTime,
    end: GraphDateTime,
    attendees: Vec<GraphAttendee<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<GraphLocation<'a>>,
}

impl<'a> GraphEvent<'a> {
    fn from_event(event: &'a CalendarEvent) -> Self {
        Self {
            subject: &event.title,
            body: GraphBody {
                content_type: "HTML",
                content: event.description.as_deref().unwrap_or_default(),
            },
            start: GraphDateTime::utc(event.start_time),
            end: GraphDateTime::utc(event.end_time),
            attendees: event
                .attendees
                .iter()
                .map(|a| GraphAttendee {
                    email_address: GraphEmailAddress {
                        address: &a.email,
                        name: a.display_name(),
                    },
                    kind: "required",
                })
                .collect(),
            location: event
                .location
                .as_deref()
                .map(|display_name| GraphLocation { display_name }),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphBody<'a> {
    content_type: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphAttendee<'a> {
    email_address: GraphEmailAddress<'a>,
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct GraphEmailAddress<'a> {
    address: &'a str,
    name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphLocation<'a> {
    display_name: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphCreated {
    id: String,
    #[serde(default)]
    online_meeting: Option<GraphOnlineMeeting>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphOnlineMeeting {
    #[serde(default)]
    join_url: Option<String>,
}
