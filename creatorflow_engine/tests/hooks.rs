use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicI32, Ordering},
        Arc,
    },
};

use creatorflow_engine::{
    db_types::{NewNotification, NewUser, NotificationKind, NotificationPreferences},
    events::{BillingEmailEvent, EventProducers, EventRelay},
    live::NotificationStream,
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    BackOfficeDatabase,
    NotificationApi,
    SqliteDatabase,
};
use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};

#[derive(Default, Clone)]
struct HookCalled {
    called: Arc<AtomicI32>,
}

impl HookCalled {
    pub fn called(&self) {
        let _ = self.called.fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> i32 {
        self.called.load(Ordering::Relaxed)
    }
}

#[tokio::test]
async fn billing_events_reach_the_email_hook_exactly_once() {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");

    let event = HookCalled::default();
    let event_copy = event.clone();
    let handler = Arc::new(move |e: BillingEmailEvent| {
        info!("🪝️ {e:?}");
        event_copy.called();
        Box::pin(async {}) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    let relay = EventRelay::new(8, handler);
    let producers = EventProducers { billing_email_producer: vec![relay.subscribe()] };
    let stream = Arc::new(NotificationStream::new());
    let api = NotificationApi::new(db.clone(), stream, producers);

    let user_id = api.db().insert_user(NewUser::new("creator@example.com")).await.unwrap().id;
    // Two distinct billing events fire the hook; the deduplicated repeat must not.
    api.notify(
        NewNotification::new(user_id, NotificationKind::BillingEvent, "Subscription renewed", "Pro plan renewed")
            .with_dedupe_key("renewal-2024-06"),
    )
    .await
    .unwrap();
    api.notify(
        NewNotification::new(user_id, NotificationKind::BillingEvent, "Subscription renewed", "Pro plan renewed")
            .with_dedupe_key("renewal-2024-06"),
    )
    .await
    .unwrap();
    api.notify(NewNotification::new(user_id, NotificationKind::BillingEvent, "Card expiring", "Update your card"))
        .await
        .unwrap();
    // A non-billing notification never reaches the billing hook.
    api.notify(NewNotification::new(user_id, NotificationKind::DealCreated, "Deal created", "Acme signed"))
        .await
        .unwrap();

    drop(api);
    relay.start_relay().await;
    assert_eq!(event.count(), 2);

    let mut db = db;
    if let Err(e) = db.close().await {
        error!("🚀️ Failed to close database: {e}");
    }
    Sqlite::drop_database(&url).await.unwrap();
    info!("🪝️ test complete");
}

#[tokio::test]
async fn suppressed_billing_events_do_not_fire_the_hook() {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");

    let event = HookCalled::default();
    let event_copy = event.clone();
    let handler = Arc::new(move |e: BillingEmailEvent| {
        info!("🪝️ {e:?}");
        event_copy.called();
        Box::pin(async {}) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    let relay = EventRelay::new(8, handler);
    let producers = EventProducers { billing_email_producer: vec![relay.subscribe()] };
    let stream = Arc::new(NotificationStream::new());
    let api = NotificationApi::new(db.clone(), stream, producers);

    let user_id = api.db().insert_user(NewUser::new("creator@example.com")).await.unwrap().id;
    let muted = NotificationPreferences { payment_alerts: Some(false), ..Default::default() };
    api.update_notification_preferences(user_id, muted).await.unwrap();
    let outcome = api
        .notify(NewNotification::new(user_id, NotificationKind::BillingEvent, "Card expiring", "Update your card"))
        .await
        .unwrap();
    assert!(outcome.is_suppressed());

    drop(api);
    relay.start_relay().await;
    assert_eq!(event.count(), 0);

    let mut db = db;
    if let Err(e) = db.close().await {
        error!("🚀️ Failed to close database: {e}");
    }
    Sqlite::drop_database(&url).await.unwrap();
}
