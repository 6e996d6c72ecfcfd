use sqlx::SqliteConnection;

use crate::db_types::{NewUser, NotificationPreferences, User};

pub async fn insert_user(user: NewUser, conn: &mut SqliteConnection) -> Result<User, sqlx::Error> {
    let user = sqlx::query_as("INSERT INTO users (name, email) VALUES ($1, $2) RETURNING *")
        .bind(user.name)
        .bind(user.email)
        .fetch_one(conn)
        .await?;
    Ok(user)
}

pub async fn fetch_user(user_id: i64, conn: &mut SqliteConnection) -> Result<Option<User>, sqlx::Error> {
    let user = sqlx::query_as("SELECT * FROM users WHERE id = $1").bind(user_id).fetch_optional(conn).await?;
    Ok(user)
}

/// The user's mute flags, or `None` when no such user exists.
pub async fn fetch_preferences(
    user_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<NotificationPreferences>, sqlx::Error> {
    let preferences = sqlx::query_as(
        "SELECT deadline_reminders, payment_alerts, weekly_digest, marketing FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(conn)
    .await?;
    Ok(preferences)
}

/// Replaces the user's mute flags. Returns `None` when no such user exists.
pub async fn update_preferences(
    user_id: i64,
    preferences: NotificationPreferences,
    conn: &mut SqliteConnection,
) -> Result<Option<NotificationPreferences>, sqlx::Error> {
    let updated = sqlx::query_as(
        r#"
            UPDATE users SET deadline_reminders = $1, payment_alerts = $2, weekly_digest = $3, marketing = $4
            WHERE id = $5
            RETURNING deadline_reminders, payment_alerts, weekly_digest, marketing;
        "#,
    )
    .bind(preferences.deadline_reminders)
    .bind(preferences.payment_alerts)
    .bind(preferences.weekly_digest)
    .bind(preferences.marketing)
    .bind(user_id)
    .fetch_optional(conn)
    .await?;
    Ok(updated)
}

/// Deletes a user. Deals, payments and notifications go with them via the foreign-key cascades.
pub async fn delete_user(user_id: i64, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1").bind(user_id).execute(conn).await?;
    Ok(result.rows_affected() > 0)
}
