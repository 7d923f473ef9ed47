//! Google Calendar API client.
//!
//! This module provides a low-level HTTP client for the Google Calendar API,
//! handling request building and response parsing. Access tokens are passed
//! per call; refreshing them is the adapter's job.

use std::collections::HashMap;
use std::time::Duration;

use calbook_core::event::wire_time;
use calbook_core::{BusyInterval, CalendarEvent, TimeWindow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ProviderResult;
use crate::http;

/// Calendar that booking events are written to.
const PRIMARY_CALENDAR: &str = "primary";

/// Google Calendar API client.
#[derive(Debug, Clone)]
pub struct GoogleCalendarClient {
    http_client: reqwest::Client,
    api_base: String,
}

impl GoogleCalendarClient {
    pub fn new(api_base: impl Into<String>, timeout: Duration) -> ProviderResult<Self> {
        Ok(Self {
            http_client: http::build_client(timeout)?,
            api_base: api_base.into(),
        })
    }

    fn events_url(&self) -> String {
        format!(
            "{}/calendars/{}/events",
            self.api_base,
            urlencoding::encode(PRIMARY_CALENDAR)
        )
    }

    fn event_url(&self, event_id: &str) -> String {
        format!("{}/{}", self.events_url(), urlencoding::encode(event_id))
    }

    /// Lists the calendars of the account.
    pub async fn list_calendars(&self, access_token: &str) -> ProviderResult<Vec<CalendarListEntry>> {
        let url = format!("{}/users/me/calendarList", self.api_base);
        let response = self
            .http_client
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(http::send_error)?;

        let list: CalendarListResponse = http::read_json(http::check(response).await?).await?;
        Ok(list.items)
    }

    /// Queries busy time of the given calendars.
    pub async fn free_busy(
        &self,
        access_token: &str,
        window: TimeWindow,
        calendar_ids: &[&str],
    ) -> ProviderResult<Vec<BusyInterval>> {
        let url = format!("{}/freeBusy", self.api_base);
        let request = FreeBusyRequest {
            time_min: window.start,
            time_max: window.end,
            items: calendar_ids.iter().map(|id| FreeBusyItem { id }).collect(),
        };

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(access_token)
            .json(&request)
            .send()
            .await
            .map_err(http::send_error)?;

        let body: FreeBusyResponse = http::read_json(http::check(response).await?).await?;

        let mut busy = Vec::new();
        for (calendar_id, calendar) in body.calendars {
            if !calendar.errors.is_empty() {
                warn!(calendar = %calendar_id, errors = ?calendar.errors, "free/busy query reported errors");
            }
            busy.extend(
                calendar
                    .busy
                    .into_iter()
                    .map(|period| BusyInterval::new(period.start, period.end)),
            );
        }
        debug!("fetched {} busy periods from {} calendars", busy.len(), calendar_ids.len());
        Ok(busy)
    }

    /// Creates an event on the primary calendar.
    pub async fn insert_event(&self, access_token: &str, payload: &EventPayload<'_>) -> ProviderResult<ApiEvent> {
        let response = self
            .http_client
            .post(self.events_url())
            .bearer_auth(access_token)
            .query(&[("conferenceDataVersion", "1")])
            .json(payload)
            .send()
            .await
            .map_err(http::send_error)?;

        http::read_json(http::check(response).await?).await
    }

    /// Replaces an event on the primary calendar and notifies its guests.
    pub async fn update_event(
        &self,
        access_token: &str,
        event_id: &str,
        payload: &EventPayload<'_>,
    ) -> ProviderResult<ApiEvent> {
        let response = self
            .http_client
            .put(self.event_url(event_id))
            .bearer_auth(access_token)
            .query(&[("conferenceDataVersion", "1"), ("sendUpdates", "all")])
            .json(payload)
            .send()
            .await
            .map_err(http::send_error)?;

        http::read_json(http::check(response).await?).await
    }

    /// Deletes an event from the primary calendar and notifies its guests.
    pub async fn delete_event(&self, access_token: &str, event_id: &str) -> ProviderResult<()> {
        let response = self
            .http_client
            .delete(self.event_url(event_id))
            .bearer_auth(access_token)
            .query(&[("sendUpdates", "all")])
            .send()
            .await
            .map_err(http::send_error)?;

        http::check(response).await?;
        Ok(())
    }
}

/// Request body for creating or replacing an event.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload<'a> {
    summary: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    start: EventDateTime<'a>,
    end: EventDateTime<'a>,
    attendees: Vec<ApiAttendee<'a>>,
    reminders: Reminders,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    conference_data: Option<ConferenceData<'a>>,
}

impl<'a> EventPayload<'a> {
    pub fn from_event(event: &'a CalendarEvent, email_reminder_minutes: u32) -> Self {
        Self {
            summary: &event.title,
            description: event.description.as_deref(),
            start: EventDateTime {
                date_time: event.start_time,
                time_zone: &event.organizer.time_zone,
            },
            end: EventDateTime {
                date_time: event.end_time,
                time_zone: &event.organizer.time_zone,
            },
            attendees: event
                .attendees
                .iter()
                .map(|a| ApiAttendee {
                    email: &a.email,
                    display_name: a.name.as_deref(),
                })
                .collect(),
            reminders: Reminders {
                use_default: false,
                overrides: vec![ReminderOverride {
                    method: "email",
                    minutes: email_reminder_minutes,
                }],
            },
            location: event.location.as_deref(),
            conference_data: event.conference_request.as_ref().map(|c| ConferenceData {
                create_request: CreateConferenceRequest {
                    request_id: &c.request_id,
                    conference_solution_key: ConferenceSolutionKey { kind: "hangoutsMeet" },
                },
            }),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EventDateTime<'a> {
    #[serde(with = "wire_time")]
    date_time: DateTime<Utc>,
    time_zone: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiAttendee<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    display_name: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Reminders {
    use_default: bool,
    overrides: Vec<ReminderOverride>,
}

#[derive(Debug, Serialize)]
struct ReminderOverride {
    method: &'static str,
    minutes: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConferenceData<'a> {
    create_request: CreateConferenceRequest<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateConferenceRequest<'a> {
    request_id: &'a str,
    conference_solution_key: ConferenceSolutionKey,
}

#[derive(Debug, Serialize)]
struct ConferenceSolutionKey {
    #[serde(rename = "type")]
    kind: &'static str,
}

/// An event as returned by the API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEvent {
    pub id: String,
    #[serde(default)]
    pub hangout_link: Option<String>,
}

/// Response from the calendarList endpoint.
#[derive(Debug, Deserialize)]
struct CalendarListResponse {
    #[serde(default)]
    items: Vec<CalendarListEntry>,
}

/// A calendar list entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarListEntry {
    pub id: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub primary: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FreeBusyRequest<'a> {
    time_min: DateTime<Utc>,
    time_max: DateTime<Utc>,
    items: Vec<FreeBusyItem<'a>>,
}

#[derive(Debug, Serialize)]
struct FreeBusyItem<'a> {
    id: &'a str,
}

#[derive(Debug, Deserialize)]
struct FreeBusyResponse {
    #[serde(default)]
    calendars: HashMap<String, FreeBusyCalendar>,
}

#[derive(Debug, Deserialize)]
struct FreeBusyCalendar {
    #[serde(default)]
    busy: Vec<FreeBusyPeriod>,
    #[serde(default)]
    errors: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct FreeBusyPeriod {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use calbook_core::{ConferenceRequest, Person};
    use chrono::TimeZone;

    fn event() -> CalendarEvent {
        CalendarEvent {
            event_type: "Intro".into(),
            title: "Intro between Ada and Grace".into(),
            description: Some("Notes".into()),
            start_time: Utc.with_ymd_and_hms(2025, 2, 5, 10, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2025, 2, 5, 10, 30, 0).unwrap(),
            organizer: Person::new("ada@example.com", "Europe/Paris").with_name("Ada"),
            attendees: vec![Person::new("grace@example.com", "UTC").with_name("Grace")],
            location: None,
            conference_request: Some(ConferenceRequest {
                request_id: "req-1".into(),
            }),
        }
    }

    #[test]
    fn event_payload_shape() {
        let evt = event();
        let payload = serde_json::to_value(EventPayload::from_event(&evt, 60)).unwrap();
        insta::assert_json_snapshot!(payload, @r#"
        {
          "attendees": [
            {
              "displayName": "Grace",
              "email": "grace@example.com"
            }
          ],
          "conferenceData": {
            "createRequest": {
              "conferenceSolutionKey": {
                "type": "hangoutsMeet"
              },
              "requestId": "req-1"
            }
          },
          "description": "Notes",
          "end": {
            "dateTime": "2025-02-05T10:30:00Z",
            "timeZone": "Europe/Paris"
          },
          "reminders": {
            "overrides": [
              {
                "method": "email",
                "minutes": 60
              }
            ],
            "useDefault": false
          },
          "start": {
            "dateTime": "2025-02-05T10:00:00Z",
            "timeZone": "Europe/Paris"
          },
          "summary": "Intro between Ada and Grace"
        }
        "#);
    }

    #[test]
    fn parses_free_busy_response() {
        let json = r#"{
            "kind": "calendar#freeBusy",
            "calendars": {
                "work": {"busy": [{"start": "2025-02-05T09:00:00Z", "end": "2025-02-05T10:00:00Z"}]},
                "gone": {"errors": [{"domain": "global", "reason": "notFound"}], "busy": []}
            }
        }"#;
        let response: FreeBusyResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.calendars["work"].busy.len(), 1);
        assert_eq!(response.calendars["gone"].errors.len(), 1);
    }
}
