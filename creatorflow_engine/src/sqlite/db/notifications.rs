use chrono::{DateTime, Utc};
use log::debug;
use sqlx::{types::Json, SqliteConnection};

use crate::{
    db_types::{NewNotification, Notification},
    traits::InsertNotificationResult,
};

/// Inserts the notification, returning the existing record instead when the (user, dedupe key)
/// pair is already taken. The partial unique index on `notifications` makes the check-and-insert
/// a single storage operation; a lost race simply surfaces as the unique violation here.
pub async fn idempotent_insert(
    notification: NewNotification,
    conn: &mut SqliteConnection,
) -> Result<InsertNotificationResult, sqlx::Error> {
    let metadata = notification.metadata.map(Json);
    let insert = sqlx::query_as::<_, Notification>(
        r#"
            INSERT INTO notifications (user_id, kind, title, message, dedupe_key, metadata, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *;
        "#,
    )
    .bind(notification.user_id)
    .bind(notification.kind)
    .bind(&notification.title)
    .bind(&notification.message)
    .bind(&notification.dedupe_key)
    .bind(metadata)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await;
    match insert {
        Ok(row) => Ok(InsertNotificationResult::Created(row)),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            let key = notification.dedupe_key.as_deref().unwrap_or_default();
            debug!("🗃️ Notification with dedupe key [{key}] already exists for user #{}", notification.user_id);
            let existing = fetch_by_dedupe_key(notification.user_id, key, conn)
                .await?
                .ok_or(sqlx::Error::RowNotFound)?;
            Ok(InsertNotificationResult::AlreadyExists(existing))
        },
        Err(e) => Err(e),
    }
}

pub async fn fetch_by_dedupe_key(
    user_id: i64,
    dedupe_key: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Notification>, sqlx::Error> {
    let notification = sqlx::query_as("SELECT * FROM notifications WHERE user_id = $1 AND dedupe_key = $2")
        .bind(user_id)
        .bind(dedupe_key)
        .fetch_optional(conn)
        .await?;
    Ok(notification)
}

/// The user's most recent notifications, newest first.
pub async fn fetch_notifications(
    user_id: i64,
    limit: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Notification>, sqlx::Error> {
    let notifications =
        sqlx::query_as("SELECT * FROM notifications WHERE user_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2")
            .bind(user_id)
            .bind(limit)
            .fetch_all(conn)
            .await?;
    Ok(notifications)
}

pub async fn unread_count(user_id: i64, conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND read_at IS NULL")
            .bind(user_id)
            .fetch_one(conn)
            .await?;
    Ok(count)
}

/// Stamps `read_at` on a single notification. Returns `None` when the notification does not exist
/// or belongs to another user.
pub async fn mark_read(
    notification_id: i64,
    user_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Notification>, sqlx::Error> {
    let notification = sqlx::query_as(
        "UPDATE notifications SET read_at = $1 WHERE id = $2 AND user_id = $3 RETURNING *",
    )
    .bind(Utc::now())
    .bind(notification_id)
    .bind(user_id)
    .fetch_optional(conn)
    .await?;
    Ok(notification)
}

pub async fn mark_all_read(user_id: i64, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE notifications SET read_at = $1 WHERE user_id = $2 AND read_at IS NULL")
        .bind(Utc::now())
        .bind(user_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}

/// Deletes notifications created before the cutoff, across all users.
pub async fn purge_before(cutoff: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM notifications WHERE created_at < $1").bind(cutoff).execute(conn).await?;
    Ok(result.rows_affected())
}
