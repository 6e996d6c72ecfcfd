use std::{fmt::Debug, sync::Arc};

use chrono::{DateTime, Duration, Utc};
use log::*;

use crate::{
    api::{
        errors::NotificationApiError,
        objects::{DealReminder, NotificationsPage, NotifyOutcome, ReminderSource},
    },
    db_types::{NewNotification, Notification, NotificationKind, NotificationPreferences, PaymentStatus},
    events::{BillingEmailEvent, EventProducers},
    helpers::{days_until, deadline_dedupe_key},
    live::{NotificationStream, StreamEvent},
    traits::{BackOfficeDatabase, BackOfficeError, InsertNotificationResult, NotificationManagement},
};

/// `NotificationApi` is the primary API for creating notifications and the derived reminder
/// views. Creation runs a fixed pipeline: preference gate, then dedupe, then persist, then emit.
/// Nothing is ever written or emitted for a gated or deduplicated call.
#[derive(Clone)]
pub struct NotificationApi<B> {
    db: B,
    stream: Arc<NotificationStream>,
    producers: EventProducers,
}

impl<B> Debug for NotificationApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NotificationApi")
    }
}

impl<B> NotificationApi<B> {
    pub fn new(db: B, stream: Arc<NotificationStream>, producers: EventProducers) -> Self {
        Self { db, stream, producers }
    }

    /// The live fan-out registry this API emits into. Hosts use this to attach and detach viewer
    /// channels.
    pub fn stream(&self) -> &Arc<NotificationStream> {
        &self.stream
    }
}

impl<B> NotificationApi<B>
where B: NotificationManagement + BackOfficeDatabase
{
    /// Creates a notification for a user, unless their preferences mute it or its dedupe key has
    /// been seen before.
    ///
    /// The pipeline order is fixed:
    /// 1. The preference gate runs first. A muted category, or a user that does not exist,
    ///    short-circuits to [`NotifyOutcome::Suppressed`] before anything is written.
    /// 2. The dedupe check and the insert are a single storage operation; a key collision returns
    ///    the stored record as [`NotifyOutcome::Duplicate`] without re-emitting.
    /// 3. Only a genuinely new record is pushed to live viewers, and (for billing kinds) onto the
    ///    billing email relay. Neither emission can fail the call; the record is already durable.
    pub async fn notify(&self, notification: NewNotification) -> Result<NotifyOutcome, NotificationApiError> {
        let user_id = notification.user_id;
        let kind = notification.kind;
        let preferences = match self.db.fetch_notification_preferences(user_id).await {
            Ok(None) => {
                debug!("🔔️ User #{user_id} does not exist. Dropping {kind} notification");
                return Ok(NotifyOutcome::Suppressed);
            },
            Ok(Some(preferences)) => Some(preferences),
            // Failing closed would silently hide real events, so an unreadable preference source
            // falls back to "not muted".
            Err(e) => {
                warn!("🔔️ Could not read preferences for user #{user_id}: {e}. Proceeding unsuppressed");
                None
            },
        };
        if let (Some(category), Some(preferences)) = (kind.preference_category(), preferences) {
            if preferences.is_muted(category) {
                debug!("🔔️ User #{user_id} has muted {kind} notifications");
                return Ok(NotifyOutcome::Suppressed);
            }
        }
        let result = self.db.insert_notification_if_absent(notification).await?;
        let notification = match result {
            InsertNotificationResult::AlreadyExists(existing) => {
                trace!("🔔️ Notification for user #{user_id} deduplicated to #{}", existing.id);
                return Ok(NotifyOutcome::Duplicate(existing));
            },
            InsertNotificationResult::Created(n) => n,
        };
        let delivered = self.stream.publish(user_id, &StreamEvent::notification(&notification));
        debug!("🔔️ Notification #{} ({kind}) created for user #{user_id}, pushed to {delivered} viewers",
            notification.id);
        if kind == NotificationKind::BillingEvent {
            let event = BillingEmailEvent::new(user_id, notification.title.clone(), notification.message.clone());
            for producer in &self.producers.billing_email_producer {
                producer.publish_event(event.clone()).await;
            }
        }
        Ok(NotifyOutcome::Created(notification))
    }

    /// Sweeps the user's pending deliverables and raises a `deadline_reminder` for every one that
    /// is due in exactly `threshold_days` calendar days.
    ///
    /// Each reminder carries a dedupe key derived from the deal, deliverable kind and due date,
    /// so running the scan any number of times (including concurrently) reports each threshold
    /// crossing at most once. Returns the notifications that were actually created this run.
    ///
    /// The scan is designed to be invoked opportunistically, e.g. on every dashboard load; it
    /// needs no schedule of its own.
    pub async fn scan_deadlines(
        &self,
        user_id: i64,
        threshold_days: i64,
    ) -> Result<Vec<Notification>, NotificationApiError> {
        let deals = self.db.fetch_deals_with_pending_deliverables(user_id).await?;
        let today = Utc::now().date_naive();
        let mut created = Vec::new();
        for deal in &deals {
            for deliverable in deal.deliverables.iter().filter(|d| d.is_pending()) {
                let days_left = days_until(today, deliverable.due_date);
                if days_left != threshold_days {
                    continue;
                }
                let key = deadline_dedupe_key(deal.id, &deliverable.kind, deliverable.due_date);
                let notification = NewNotification::new(
                    user_id,
                    NotificationKind::DeadlineReminder,
                    "Deadline approaching".to_string(),
                    format!(
                        "{} for {} is due in {days_left} day{}",
                        deliverable.kind,
                        deal.brand_name,
                        if days_left == 1 { "" } else { "s" }
                    ),
                )
                .with_dedupe_key(key)
                .with_metadata(serde_json::json!({
                    "dealId": deal.id,
                    "deliverable": deliverable.kind,
                    "dueDate": deliverable.due_date,
                }));
                if let NotifyOutcome::Created(n) = self.notify(notification).await? {
                    created.push(n);
                }
            }
        }
        debug!("🔔️ Deadline scan for user #{user_id} produced {} new reminders", created.len());
        Ok(created)
    }

    /// The request-time reminder view over a single deal: every pending deliverable, and every
    /// unpaid payment with a due date, that falls inside the threshold window. Entries that are
    /// already overdue have a negative `days_left` and sort first.
    ///
    /// This is pure derivation. It is recomputed on every call and persists nothing.
    pub async fn list_deal_reminders(
        &self,
        deal_id: i64,
        user_id: i64,
        threshold_days: i64,
    ) -> Result<Vec<DealReminder>, NotificationApiError> {
        let deal = self
            .db
            .fetch_deal(deal_id, user_id)
            .await?
            .ok_or(BackOfficeError::DealNotFound(deal_id))?;
        let payments = self.db.fetch_payments_for_deal(deal_id, user_id).await?;
        let today = Utc::now().date_naive();
        let mut reminders = Vec::new();
        for deliverable in deal.deliverables.iter().filter(|d| d.is_pending()) {
            let days_left = days_until(today, deliverable.due_date);
            if days_left <= threshold_days {
                reminders.push(DealReminder {
                    deal_id,
                    source: ReminderSource::Deliverable { kind: deliverable.kind.clone() },
                    due_date: deliverable.due_date,
                    days_left,
                });
            }
        }
        for payment in payments.iter().filter(|p| p.status != PaymentStatus::Paid) {
            let Some(due_date) = payment.due_date else {
                continue;
            };
            let days_left = days_until(today, due_date);
            if days_left <= threshold_days {
                reminders.push(DealReminder {
                    deal_id,
                    source: ReminderSource::Payment { payment_id: payment.id, amount: payment.amount },
                    due_date,
                    days_left,
                });
            }
        }
        reminders.sort_by_key(|r| r.days_left);
        Ok(reminders)
    }

    /// The user's most recent notifications together with their unread tally.
    pub async fn notifications(&self, user_id: i64, limit: i64) -> Result<NotificationsPage, NotificationApiError> {
        let notifications = self.db.fetch_notifications(user_id, limit).await?;
        let unread_count = self.db.unread_count(user_id).await?;
        Ok(NotificationsPage { notifications, unread_count })
    }

    pub async fn mark_read(
        &self,
        notification_id: i64,
        user_id: i64,
    ) -> Result<Notification, NotificationApiError> {
        let notification = self.db.mark_notification_read(notification_id, user_id).await?;
        Ok(notification)
    }

    pub async fn mark_all_read(&self, user_id: i64) -> Result<u64, NotificationApiError> {
        let updated = self.db.mark_all_notifications_read(user_id).await?;
        Ok(updated)
    }

    /// Deletes notifications older than `max_age`, across all users. Returns the number removed.
    pub async fn purge_expired(&self, max_age: Duration) -> Result<u64, NotificationApiError> {
        let cutoff: DateTime<Utc> = Utc::now() - max_age;
        let purged = self.db.purge_notifications_before(cutoff).await?;
        if purged > 0 {
            info!("🔔️ Purged {purged} notifications older than {} days", max_age.num_days());
        }
        Ok(purged)
    }

    pub async fn notification_preferences(
        &self,
        user_id: i64,
    ) -> Result<Option<NotificationPreferences>, NotificationApiError> {
        let preferences = self.db.fetch_notification_preferences(user_id).await?;
        Ok(preferences)
    }

    pub async fn update_notification_preferences(
        &self,
        user_id: i64,
        preferences: NotificationPreferences,
    ) -> Result<NotificationPreferences, NotificationApiError> {
        let updated = self.db.update_notification_preferences(user_id, preferences).await?;
        Ok(updated)
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }
}
