use std::sync::Arc;

use cf_common::Money;
use chrono::{Duration, Utc};
use creatorflow_engine::{
    db_types::{NewDeal, NewDeliverable, NewPayment, NewUser, NotificationKind, NotificationPreferences},
    events::EventProducers,
    live::NotificationStream,
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    BackOfficeDatabase,
    DealFlowApi,
    NotificationApi,
    ReminderSource,
    SqliteDatabase,
};
use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};

async fn setup() -> (DealFlowApi<SqliteDatabase>, NotificationApi<SqliteDatabase>) {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
    let stream = Arc::new(NotificationStream::new());
    let notifier = NotificationApi::new(db.clone(), stream, EventProducers::default());
    let deals = DealFlowApi::new(db, notifier.clone());
    (deals, notifier)
}

async fn tear_down(mut api: NotificationApi<SqliteDatabase>) {
    let url = api.db().url().to_string();
    if let Err(e) = api.db_mut().close().await {
        error!("🚀️ Failed to close database: {e}");
    }
    Sqlite::drop_database(&url).await.unwrap();
}

async fn new_user(api: &DealFlowApi<SqliteDatabase>) -> i64 {
    api.db().insert_user(NewUser::new("creator@example.com")).await.expect("Error creating user").id
}

#[tokio::test]
async fn scan_raises_one_reminder_per_threshold_crossing() {
    let (deals, notifier) = setup().await;
    let user_id = new_user(&deals).await;
    let deal = NewDeal::new(user_id, "Acme", "Summer campaign", Money::from_whole(1000))
        .with_deliverable(NewDeliverable::new("reel", Utc::now() + Duration::days(2)))
        .with_deliverable(NewDeliverable::new("story", Utc::now() + Duration::days(5)));
    deals.process_new_deal(deal).await.unwrap();

    let created = notifier.scan_deadlines(user_id, 2).await.unwrap();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].kind, NotificationKind::DeadlineReminder);
    assert!(created[0].message.contains("reel"));

    // Re-running the scan the same day collides on the dedupe key and creates nothing.
    let rerun = notifier.scan_deadlines(user_id, 2).await.unwrap();
    assert!(rerun.is_empty());

    let reminders: Vec<_> = notifier
        .notifications(user_id, 20)
        .await
        .unwrap()
        .notifications
        .into_iter()
        .filter(|n| n.kind == NotificationKind::DeadlineReminder)
        .collect();
    assert_eq!(reminders.len(), 1);
    tear_down(notifier).await;
}

#[tokio::test]
async fn scan_matches_the_threshold_exactly_not_at_or_below() {
    let (deals, notifier) = setup().await;
    let user_id = new_user(&deals).await;
    let deal = NewDeal::new(user_id, "Acme", "Campaign", Money::from_whole(100))
        .with_deliverable(NewDeliverable::new("post", Utc::now() + Duration::days(1)))
        .with_deliverable(NewDeliverable::new("reel", Utc::now() - Duration::days(1)));
    deals.process_new_deal(deal).await.unwrap();

    // Due tomorrow and overdue yesterday both miss a threshold of 2.
    let created = notifier.scan_deadlines(user_id, 2).await.unwrap();
    assert!(created.is_empty());
    tear_down(notifier).await;
}

#[tokio::test]
async fn completed_deliverables_are_not_scanned() {
    let (deals, notifier) = setup().await;
    let user_id = new_user(&deals).await;
    let deal = NewDeal::new(user_id, "Acme", "Campaign", Money::from_whole(100))
        .with_deliverable(NewDeliverable::new("post", Utc::now() + Duration::days(2)));
    let deal = deals.process_new_deal(deal).await.unwrap();
    deals.complete_deliverable(deal.deliverables[0].id, user_id).await.unwrap();

    let created = notifier.scan_deadlines(user_id, 2).await.unwrap();
    assert!(created.is_empty());
    tear_down(notifier).await;
}

#[tokio::test]
async fn muted_deadline_reminders_gate_the_scan() {
    let (deals, notifier) = setup().await;
    let user_id = new_user(&deals).await;
    let muted = NotificationPreferences { deadline_reminders: Some(false), ..Default::default() };
    notifier.update_notification_preferences(user_id, muted).await.unwrap();
    let deal = NewDeal::new(user_id, "Acme", "Campaign", Money::from_whole(100))
        .with_deliverable(NewDeliverable::new("post", Utc::now() + Duration::days(2)));
    deals.process_new_deal(deal).await.unwrap();

    let created = notifier.scan_deadlines(user_id, 2).await.unwrap();
    assert!(created.is_empty());
    assert!(notifier
        .notifications(user_id, 20)
        .await
        .unwrap()
        .notifications
        .iter()
        .all(|n| n.kind != NotificationKind::DeadlineReminder));
    tear_down(notifier).await;
}

#[tokio::test]
async fn reminder_listing_sorts_most_overdue_first() {
    let (deals, notifier) = setup().await;
    let user_id = new_user(&deals).await;
    let mut deal = NewDeal::new(user_id, "Acme", "Campaign", Money::from_whole(1000))
        .with_deliverable(NewDeliverable::new("reel", Utc::now() - Duration::days(3)))
        .with_deliverable(NewDeliverable::new("story", Utc::now() + Duration::days(10)));
    deal.due_date = Some(Utc::now() + Duration::days(10));
    let deal = deals.process_new_deal(deal).await.unwrap();
    assert_eq!(deal.days_left(Utc::now().date_naive()), Some(10));
    deals
        .process_new_payment(
            NewPayment::new(user_id, deal.id, Money::from_whole(500)).with_due_date(Utc::now() + Duration::days(1)),
        )
        .await
        .unwrap();

    let reminders = notifier.list_deal_reminders(deal.id, user_id, 2).await.unwrap();
    assert_eq!(reminders.len(), 2);
    assert_eq!(reminders[0].days_left, -3);
    assert!(matches!(reminders[0].source, ReminderSource::Deliverable { ref kind } if kind == "reel"));
    assert_eq!(reminders[1].days_left, 1);
    assert!(matches!(reminders[1].source, ReminderSource::Payment { .. }));
    tear_down(notifier).await;
}

#[tokio::test]
async fn reminder_listing_skips_paid_and_dateless_payments() {
    let (deals, notifier) = setup().await;
    let user_id = new_user(&deals).await;
    let deal = deals.process_new_deal(NewDeal::new(user_id, "Acme", "Campaign", Money::from_whole(1000))).await.unwrap();
    // Paid installment with an imminent due date: not a reminder.
    deals
        .process_new_payment(
            NewPayment::new(user_id, deal.id, Money::from_whole(500))
                .with_received(Money::from_whole(500))
                .with_status(creatorflow_engine::db_types::PaymentStatus::Paid)
                .with_due_date(Utc::now() + Duration::days(1)),
        )
        .await
        .unwrap();
    // Open installment without a due date: nothing to remind about.
    deals.process_new_payment(NewPayment::new(user_id, deal.id, Money::from_whole(500))).await.unwrap();

    let reminders = notifier.list_deal_reminders(deal.id, user_id, 2).await.unwrap();
    assert!(reminders.is_empty());
    tear_down(notifier).await;
}

#[tokio::test]
async fn reminder_listing_rejects_foreign_deals() {
    let (deals, notifier) = setup().await;
    let user_id = new_user(&deals).await;
    let deal = deals.process_new_deal(NewDeal::new(user_id, "Acme", "Campaign", Money::from_whole(100))).await.unwrap();
    let intruder = deals.db().insert_user(NewUser::new("other@example.com")).await.unwrap().id;
    assert!(notifier.list_deal_reminders(deal.id, intruder, 2).await.is_err());
    tear_down(notifier).await;
}
