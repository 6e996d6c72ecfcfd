use std::{sync::Arc, time::Duration as StdDuration};

use chrono::{Duration, Utc};
use creatorflow_engine::{
    db_types::{NewNotification, NewUser, NotificationKind},
    events::EventProducers,
    live::{MpscChannel, NotificationStream},
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    workers::{start_heartbeat_worker, start_retention_worker},
    BackOfficeDatabase,
    NotificationApi,
    SqliteDatabase,
};
use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};

async fn setup() -> (NotificationApi<SqliteDatabase>, Arc<NotificationStream>) {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
    let stream = Arc::new(NotificationStream::new());
    let api = NotificationApi::new(db, stream.clone(), EventProducers::default());
    (api, stream)
}

async fn tear_down(mut api: NotificationApi<SqliteDatabase>) {
    let url = api.db().url().to_string();
    if let Err(e) = api.db_mut().close().await {
        error!("🚀️ Failed to close database: {e}");
    }
    Sqlite::drop_database(&url).await.unwrap();
}

#[tokio::test]
async fn retention_worker_sweeps_expired_notifications() {
    let (api, _stream) = setup().await;
    let user_id = api.db().insert_user(NewUser::new("creator@example.com")).await.unwrap().id;
    let stale = api
        .notify(NewNotification::new(user_id, NotificationKind::DealCreated, "Deal created", "Stale"))
        .await
        .unwrap();
    let stale_id = stale.created().unwrap().id;
    sqlx::query("UPDATE notifications SET created_at = $1 WHERE id = $2")
        .bind(Utc::now() - Duration::days(40))
        .bind(stale_id)
        .execute(api.db().pool())
        .await
        .unwrap();

    let worker = start_retention_worker(api.clone(), Duration::days(30), StdDuration::from_millis(50));
    tokio::time::sleep(StdDuration::from_millis(200)).await;
    worker.abort();

    let page = api.notifications(user_id, 20).await.unwrap();
    assert!(page.notifications.is_empty());
    tear_down(api).await;
}

#[tokio::test]
async fn heartbeat_worker_pings_open_channels() {
    let (api, stream) = setup().await;
    let (channel, mut rx) = MpscChannel::new();
    stream.attach(1, channel);

    let worker = start_heartbeat_worker(stream.clone(), StdDuration::from_millis(20));
    tokio::time::sleep(StdDuration::from_millis(100)).await;
    worker.abort();

    let mut pings = 0;
    while let Ok(event) = rx.try_recv() {
        assert!(event.is_ping());
        pings += 1;
    }
    assert!(pings >= 2, "expected repeated heartbeats, got {pings}");

    // A dropped receiver is detached by the next heartbeat.
    let (dead, rx_dead) = MpscChannel::new();
    stream.attach(2, dead);
    drop(rx_dead);
    let worker = start_heartbeat_worker(stream.clone(), StdDuration::from_millis(20));
    tokio::time::sleep(StdDuration::from_millis(100)).await;
    worker.abort();
    assert_eq!(stream.viewer_count(2), 0);
    tear_down(api).await;
}
