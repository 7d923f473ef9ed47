//! Notification boundary for booking confirmations.
//!
//! The engine decides whether the organizer and the attendee are told about
//! a booking and with what payload. Rendering and delivering the email is
//! the job of a [`NotificationGateway`] implementation.

use calbook_core::CalendarEvent;
use calbook_providers::BoxFuture;
use serde::Serialize;
use thiserror::Error;
use tracing::info;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Confirmed,
    Rescheduled,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Rescheduled => "rescheduled",
        }
    }
}

/// Payload handed to the gateway for one booking.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingNotification {
    pub kind: NotificationKind,
    pub uid: String,
    pub event: CalendarEvent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancel_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reschedule_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meeting_url: Option<String>,
}

impl BookingNotification {
    pub fn new(kind: NotificationKind, uid: impl Into<String>, event: CalendarEvent) -> Self {
        Self {
            kind,
            uid: uid.into(),
            event,
            cancel_link: None,
            reschedule_link: None,
            meeting_url: None,
        }
    }

    /// Builder: attach cancel and reschedule links.
    pub fn with_links(mut self, links: Option<&LinkBuilder>) -> Self {
        if let Some(links) = links {
            self.cancel_link = Some(links.cancel(&self.uid));
            self.reschedule_link = Some(links.reschedule(&self.uid));
        }
        self
    }

    /// Builder: attach a conference join URL.
    pub fn with_meeting_url(mut self, url: Option<String>) -> Self {
        self.meeting_url = url;
        self
    }
}

#[derive(Debug, Error)]
#[error("notification {uid} to {recipient} failed: {message}")]
pub struct NotifyError {
    pub uid: String,
    pub recipient: String,
    pub message: String,
}

impl NotifyError {
    pub fn new(uid: impl Into<String>, recipient: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            recipient: recipient.into(),
            message: message.into(),
        }
    }
}

/// Delivers booking notifications to the two parties of a booking.
pub trait NotificationGateway: Send + Sync {
    fn send_organizer<'a>(&'a self, notification: &'a BookingNotification) -> BoxFuture<'a, Result<(), NotifyError>>;

    fn send_attendee<'a>(&'a self, notification: &'a BookingNotification) -> BoxFuture<'a, Result<(), NotifyError>>;
}

/// Gateway that only logs what would be sent.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl TracingNotifier {
    fn log(&self, role: &'static str, recipients: &[String], notification: &BookingNotification) {
        info!(
            kind = notification.kind.as_str(),
            uid = %notification.uid,
            role,
            recipients = %recipients.join(", "),
            title = %notification.event.title,
            start = %notification.event.start_time,
            cancel_link = notification.cancel_link.as_deref().unwrap_or(""),
            "Booking notification"
        );
    }
}

impl NotificationGateway for TracingNotifier {
    fn send_organizer<'a>(&'a self, notification: &'a BookingNotification) -> BoxFuture<'a, Result<(), NotifyError>> {
        Box::pin(async move {
            self.log("organizer", &[notification.event.organizer.email.clone()], notification);
            Ok(())
        })
    }

    fn send_attendee<'a>(&'a self, notification: &'a BookingNotification) -> BoxFuture<'a, Result<(), NotifyError>> {
        Box::pin(async move {
            let recipients: Vec<String> = notification.event.attendees.iter().map(|a| a.email.clone()).collect();
            self.log("attendee", &recipients, notification);
            Ok(())
        })
    }
}

/// Derives the public cancel and reschedule links of a booking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkBuilder {
    base: Url,
}

impl LinkBuilder {
    pub fn new(mut base: Url) -> Self {
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Self { base }
    }

    pub fn cancel(&self, uid: &str) -> String {
        self.link("cancel", uid)
    }

    pub fn reschedule(&self, uid: &str) -> String {
        self.link("reschedule", uid)
    }

    fn link(&self, action: &str, uid: &str) -> String {
        format!("{}{}/{}", self.base, action, urlencoding::encode(uid))
    }
}
