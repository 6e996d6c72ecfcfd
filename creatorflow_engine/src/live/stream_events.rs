use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db_types::{Notification, NotificationKind};

/// The slice of a notification record pushed to live viewers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub id: i64,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub metadata: Option<Value>,
}

impl From<&Notification> for NotificationPayload {
    fn from(n: &Notification) -> Self {
        Self {
            id: n.id,
            kind: n.kind,
            title: n.title.clone(),
            message: n.message.clone(),
            read_at: n.read_at,
            created_at: n.created_at,
            metadata: n.metadata.as_ref().map(|m| m.0.clone()),
        }
    }
}

/// A discrete event written to a live channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum StreamEvent {
    Notification(NotificationPayload),
    /// Keep-alive written on a fixed interval, independent of notification traffic.
    Ping,
}

impl StreamEvent {
    pub fn notification(n: &Notification) -> Self {
        StreamEvent::Notification(NotificationPayload::from(n))
    }

    pub fn is_ping(&self) -> bool {
        matches!(self, StreamEvent::Ping)
    }
}
