use std::sync::Arc;

use cf_common::Money;
use chrono::{Duration, Utc};
use creatorflow_engine::{
    db_types::{NewDeal, NewNotification, NewPayment, NewUser, NotificationKind, NotificationPreferences},
    events::EventProducers,
    live::{MpscChannel, NotificationStream},
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    BackOfficeDatabase,
    DealFlowApi,
    NotificationApi,
    NotifyOutcome,
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

async fn new_user(api: &NotificationApi<SqliteDatabase>) -> i64 {
    api.db().insert_user(NewUser::new("creator@example.com")).await.expect("Error creating user").id
}

#[tokio::test]
async fn dedupe_key_makes_notify_idempotent() {
    let (api, stream) = setup().await;
    let user_id = new_user(&api).await;
    let (channel, mut rx) = MpscChannel::new();
    stream.attach(user_id, channel);

    let request = NewNotification::new(user_id, NotificationKind::DealCreated, "Deal created", "Acme signed")
        .with_dedupe_key("deal-signed-acme");
    let first = api.notify(request.clone()).await.unwrap();
    let second = api.notify(request.clone()).await.unwrap();
    let third = api.notify(request).await.unwrap();

    let created = first.created().expect("first call should create").clone();
    assert!(matches!(second, NotifyOutcome::Duplicate(ref n) if n.id == created.id));
    assert!(matches!(third, NotifyOutcome::Duplicate(ref n) if n.id == created.id));

    let page = api.notifications(user_id, 20).await.unwrap();
    assert_eq!(page.notifications.len(), 1);
    assert_eq!(page.unread_count, 1);

    // Exactly one emission reached the live channel.
    assert!(rx.try_recv().is_ok());
    assert!(rx.try_recv().is_err());
    tear_down(api).await;
}

#[tokio::test]
async fn muted_categories_are_suppressed_before_any_write() {
    let (api, stream) = setup().await;
    let user_id = new_user(&api).await;
    let (channel, mut rx) = MpscChannel::new();
    stream.attach(user_id, channel);
    let muted = NotificationPreferences { payment_alerts: Some(false), ..Default::default() };
    api.update_notification_preferences(user_id, muted).await.unwrap();

    let outcome = api
        .notify(NewNotification::new(user_id, NotificationKind::PaymentReceived, "Payment received", "Acme sent $400"))
        .await
        .unwrap();
    assert!(outcome.is_suppressed());

    // billing_event shares the payment_alerts category.
    let outcome = api
        .notify(NewNotification::new(user_id, NotificationKind::BillingEvent, "Card expiring", "Update your card"))
        .await
        .unwrap();
    assert!(outcome.is_suppressed());

    let page = api.notifications(user_id, 20).await.unwrap();
    assert!(page.notifications.is_empty());
    assert!(rx.try_recv().is_err());
    tear_down(api).await;
}

#[tokio::test]
async fn deal_created_has_no_mute_category() {
    let (api, _stream) = setup().await;
    let user_id = new_user(&api).await;
    let all_muted = NotificationPreferences {
        deadline_reminders: Some(false),
        payment_alerts: Some(false),
        weekly_digest: Some(false),
        marketing: Some(false),
    };
    api.update_notification_preferences(user_id, all_muted).await.unwrap();

    let outcome = api
        .notify(NewNotification::new(user_id, NotificationKind::DealCreated, "Deal created", "Acme signed"))
        .await
        .unwrap();
    assert!(outcome.created().is_some());
    tear_down(api).await;
}

#[tokio::test]
async fn notifying_a_missing_user_is_a_no_op() {
    let (api, _stream) = setup().await;
    let outcome = api
        .notify(NewNotification::new(404, NotificationKind::DealCreated, "Deal created", "Acme signed"))
        .await
        .unwrap();
    assert!(outcome.is_suppressed());
    tear_down(api).await;
}

#[tokio::test]
async fn unset_preferences_do_not_suppress() {
    let (api, _stream) = setup().await;
    let user_id = new_user(&api).await;
    // A fresh user has never touched their settings; every flag is NULL.
    let outcome = api
        .notify(NewNotification::new(user_id, NotificationKind::PaymentReceived, "Payment received", "Acme sent $1"))
        .await
        .unwrap();
    assert!(outcome.created().is_some());
    tear_down(api).await;
}

#[tokio::test]
async fn live_fan_out_reaches_every_viewer_of_the_owner_only() {
    let (api, stream) = setup().await;
    let user_id = new_user(&api).await;
    let other_id = api.db().insert_user(NewUser::new("other@example.com")).await.unwrap().id;

    let (session_a, mut rx_a) = MpscChannel::new();
    let (session_b, mut rx_b) = MpscChannel::new();
    let (foreign, mut rx_foreign) = MpscChannel::new();
    stream.attach(user_id, session_a);
    stream.attach(user_id, session_b);
    stream.attach(other_id, foreign);

    api.notify(NewNotification::new(user_id, NotificationKind::DealCreated, "Deal created", "Acme signed"))
        .await
        .unwrap();

    assert!(rx_a.try_recv().is_ok());
    assert!(rx_b.try_recv().is_ok());
    assert!(rx_foreign.try_recv().is_err());
    tear_down(api).await;
}

#[tokio::test]
async fn read_state_management() {
    let (api, _stream) = setup().await;
    let user_id = new_user(&api).await;
    for i in 0..3 {
        api.notify(NewNotification::new(
            user_id,
            NotificationKind::DealCreated,
            "Deal created".to_string(),
            format!("Deal {i} signed"),
        ))
        .await
        .unwrap();
    }
    let page = api.notifications(user_id, 20).await.unwrap();
    assert_eq!(page.unread_count, 3);

    let first = page.notifications[0].clone();
    let read = api.mark_read(first.id, user_id).await.unwrap();
    assert!(read.read_at.is_some());
    assert_eq!(api.notifications(user_id, 20).await.unwrap().unread_count, 2);

    // Foreign users cannot touch someone else's notifications.
    let other_id = api.db().insert_user(NewUser::new("other@example.com")).await.unwrap().id;
    assert!(api.mark_read(first.id, other_id).await.is_err());

    assert_eq!(api.mark_all_read(user_id).await.unwrap(), 2);
    assert_eq!(api.notifications(user_id, 20).await.unwrap().unread_count, 0);
    tear_down(api).await;
}

#[tokio::test]
async fn retention_purges_only_expired_notifications() {
    let (api, _stream) = setup().await;
    let user_id = new_user(&api).await;
    api.notify(NewNotification::new(user_id, NotificationKind::DealCreated, "Deal created", "Fresh"))
        .await
        .unwrap();
    let stale = api
        .notify(NewNotification::new(user_id, NotificationKind::DealCreated, "Deal created", "Stale"))
        .await
        .unwrap();
    let stale_id = stale.created().unwrap().id;

    // Backdate one record past the retention window.
    let forty_days_ago = Utc::now() - Duration::days(40);
    sqlx::query("UPDATE notifications SET created_at = $1 WHERE id = $2")
        .bind(forty_days_ago)
        .bind(stale_id)
        .execute(api.db().pool())
        .await
        .unwrap();

    let purged = api.purge_expired(Duration::days(30)).await.unwrap();
    assert_eq!(purged, 1);
    let page = api.notifications(user_id, 20).await.unwrap();
    assert_eq!(page.notifications.len(), 1);
    assert_eq!(page.notifications[0].message, "Fresh");
    tear_down(api).await;
}

#[tokio::test]
async fn deleting_a_user_cascades_to_everything_they_own() {
    let (api, _stream) = setup().await;
    let user_id = new_user(&api).await;
    let deals = DealFlowApi::new(api.db().clone(), api.clone());
    let deal = deals.process_new_deal(NewDeal::new(user_id, "Acme", "Campaign", Money::from_whole(100))).await.unwrap();
    deals.process_new_payment(NewPayment::new(user_id, deal.id, Money::from_whole(100))).await.unwrap();
    assert!(!api.notifications(user_id, 20).await.unwrap().notifications.is_empty());

    api.db().delete_user(user_id).await.unwrap();
    assert!(deals.fetch_deal(deal.id, user_id).await.unwrap().is_none());
    assert!(deals.search_payments(user_id, Default::default()).await.unwrap().is_empty());
    assert!(api.notifications(user_id, 20).await.unwrap().notifications.is_empty());
    tear_down(api).await;
}
