use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db_types::{NewNotification, Notification, NotificationPreferences};

/// The result of the "insert if absent by dedupe key" primitive.
#[derive(Debug, Clone)]
pub enum InsertNotificationResult {
    /// A new record was persisted.
    Created(Notification),
    /// A notification with the same (user, dedupe key) pair already existed; the stored record is
    /// returned unchanged.
    AlreadyExists(Notification),
}

impl InsertNotificationResult {
    pub fn into_notification(self) -> Notification {
        match self {
            InsertNotificationResult::Created(n) | InsertNotificationResult::AlreadyExists(n) => n,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, InsertNotificationResult::Created(_))
    }
}

/// Notification storage and the user-preference source consulted by the gate.
#[allow(async_fn_in_trait)]
pub trait NotificationManagement: Clone {
    /// Persists a notification. When the record carries a dedupe key and a notification with the
    /// same (user, key) pair already exists, nothing is written and the existing record is
    /// returned. The check-and-insert must be a single storage-level operation, not a lookup
    /// followed by an insert.
    async fn insert_notification_if_absent(
        &self,
        notification: NewNotification,
    ) -> Result<InsertNotificationResult, NotificationError>;

    /// The user's most recent notifications, newest first, capped at `limit`.
    async fn fetch_notifications(&self, user_id: i64, limit: i64) -> Result<Vec<Notification>, NotificationError>;

    /// How many of the user's notifications have not been read yet.
    async fn unread_count(&self, user_id: i64) -> Result<i64, NotificationError>;

    /// Stamps `read_at` on a single notification, scoped by owner.
    async fn mark_notification_read(
        &self,
        notification_id: i64,
        user_id: i64,
    ) -> Result<Notification, NotificationError>;

    /// Stamps `read_at` on every unread notification the user has. Returns the number updated.
    async fn mark_all_notifications_read(&self, user_id: i64) -> Result<u64, NotificationError>;

    /// Deletes notifications created before the cutoff, across all users. Returns the number
    /// deleted.
    async fn purge_notifications_before(&self, cutoff: DateTime<Utc>) -> Result<u64, NotificationError>;

    /// The user's notification mute flags. `None` when the user record itself does not exist.
    async fn fetch_notification_preferences(
        &self,
        user_id: i64,
    ) -> Result<Option<NotificationPreferences>, NotificationError>;

    /// Replaces the user's mute flags.
    async fn update_notification_preferences(
        &self,
        user_id: i64,
        preferences: NotificationPreferences,
    ) -> Result<NotificationPreferences, NotificationError>;
}

#[derive(Debug, Clone, Error)]
pub enum NotificationError {
    #[error("We have an internal database engine error (configuration/uptime etc.): {0}")]
    DatabaseError(String),
    #[error("The requested notification {0} does not exist")]
    NotificationNotFound(i64),
    #[error("The requested user {0} does not exist")]
    UserNotFound(i64),
}

impl From<sqlx::Error> for NotificationError {
    fn from(e: sqlx::Error) -> Self {
        NotificationError::DatabaseError(e.to_string())
    }
}
