//! `SqliteDatabase` is a concrete implementation of a CreatorFlow engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the
//! [`crate::traits`] module.
use std::fmt::Debug;

use cf_common::Money;
use chrono::{DateTime, Utc};
use log::*;
use sqlx::SqlitePool;

use super::db::{db_url, deals, new_pool, notifications, payments, users};
use crate::{
    api::objects::{DealQueryFilter, PaymentQueryFilter},
    db_types::{
        Deal,
        DealUpdate,
        Deliverable,
        NewDeal,
        NewNotification,
        NewPayment,
        NewUser,
        Notification,
        NotificationPreferences,
        Payment,
        PaymentStatus,
        PaymentUpdate,
        User,
    },
    traits::{
        BackOfficeDatabase,
        BackOfficeError,
        InsertNotificationResult,
        NotificationError,
        NotificationManagement,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the URL from the environment.
    pub async fn new(max_connections: u32) -> Result<Self, BackOfficeError> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, BackOfficeError> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn fetch_user(&self, user_id: i64) -> Result<Option<User>, BackOfficeError> {
        let mut conn = self.pool.acquire().await?;
        let user = users::fetch_user(user_id, &mut conn).await?;
        Ok(user)
    }
}

impl BackOfficeDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_deal(&self, deal: NewDeal) -> Result<Deal, BackOfficeError> {
        let mut tx = self.pool.begin().await?;
        let deal = deals::insert_deal(deal, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Deal [{}/{}] saved with id {}", deal.brand_name, deal.deal_name, deal.id);
        Ok(deal)
    }

    async fn fetch_deal(&self, deal_id: i64, user_id: i64) -> Result<Option<Deal>, BackOfficeError> {
        let mut conn = self.pool.acquire().await?;
        let deal = deals::fetch_deal(deal_id, user_id, &mut conn).await?;
        match deal {
            Some(mut deal) => {
                deals::load_deliverables(std::slice::from_mut(&mut deal), &mut conn).await?;
                Ok(Some(deal))
            },
            None => Ok(None),
        }
    }

    async fn search_deals(&self, user_id: i64, query: DealQueryFilter) -> Result<Vec<Deal>, BackOfficeError> {
        let mut conn = self.pool.acquire().await?;
        let mut deals = deals::search_deals(user_id, query, &mut conn).await?;
        deals::load_deliverables(&mut deals, &mut conn).await?;
        Ok(deals)
    }

    async fn fetch_deals_with_pending_deliverables(&self, user_id: i64) -> Result<Vec<Deal>, BackOfficeError> {
        let mut conn = self.pool.acquire().await?;
        let mut deals = deals::fetch_deals_with_pending_deliverables(user_id, &mut conn).await?;
        deals::load_deliverables(&mut deals, &mut conn).await?;
        Ok(deals)
    }

    async fn update_deal(&self, deal_id: i64, user_id: i64, update: DealUpdate) -> Result<Deal, BackOfficeError> {
        let mut conn = self.pool.acquire().await?;
        trace!("🗃️ Deal #{deal_id} updating with new values: {update:?}");
        let mut deal = deals::update_deal(deal_id, user_id, update, &mut conn)
            .await?
            .ok_or(BackOfficeError::DealNotFound(deal_id))?;
        deals::load_deliverables(std::slice::from_mut(&mut deal), &mut conn).await?;
        trace!("🗃️ Deal #{deal_id} has been updated");
        Ok(deal)
    }

    async fn delete_deal(&self, deal_id: i64, user_id: i64) -> Result<Deal, BackOfficeError> {
        let mut tx = self.pool.begin().await?;
        let n = payments::delete_payments_for_deal(deal_id, user_id, &mut tx).await?;
        let deal =
            deals::delete_deal(deal_id, user_id, &mut tx).await?.ok_or(BackOfficeError::DealNotFound(deal_id))?;
        tx.commit().await?;
        debug!("🗃️ Deal #{deal_id} deleted along with {n} payments");
        Ok(deal)
    }

    async fn complete_deliverable(&self, deliverable_id: i64, user_id: i64) -> Result<Deliverable, BackOfficeError> {
        let mut conn = self.pool.acquire().await?;
        let deliverable = deals::complete_deliverable(deliverable_id, user_id, &mut conn)
            .await?
            .ok_or(BackOfficeError::DeliverableNotFound(deliverable_id))?;
        Ok(deliverable)
    }

    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment, BackOfficeError> {
        let mut conn = self.pool.acquire().await?;
        let payment = payments::insert_payment(payment, &mut conn).await?;
        debug!("🗃️ Payment #{} of {} saved against deal #{}", payment.id, payment.amount, payment.deal_id);
        Ok(payment)
    }

    async fn fetch_payment(&self, payment_id: i64, user_id: i64) -> Result<Option<Payment>, BackOfficeError> {
        let mut conn = self.pool.acquire().await?;
        let payment = payments::fetch_payment(payment_id, user_id, &mut conn).await?;
        Ok(payment)
    }

    async fn fetch_payments_for_deal(&self, deal_id: i64, user_id: i64) -> Result<Vec<Payment>, BackOfficeError> {
        let mut conn = self.pool.acquire().await?;
        let payments = payments::fetch_payments_for_deal(deal_id, user_id, &mut conn).await?;
        Ok(payments)
    }

    async fn search_payments(
        &self,
        user_id: i64,
        query: PaymentQueryFilter,
    ) -> Result<Vec<Payment>, BackOfficeError> {
        let mut conn = self.pool.acquire().await?;
        let payments = payments::search_payments(user_id, query, &mut conn).await?;
        Ok(payments)
    }

    async fn update_payment(
        &self,
        payment_id: i64,
        user_id: i64,
        update: PaymentUpdate,
    ) -> Result<Payment, BackOfficeError> {
        let mut conn = self.pool.acquire().await?;
        trace!("🗃️ Payment #{payment_id} updating with new values: {update:?}");
        let payment = payments::update_payment(payment_id, user_id, update, &mut conn)
            .await?
            .ok_or(BackOfficeError::PaymentNotFound(payment_id))?;
        Ok(payment)
    }

    async fn delete_payment(&self, payment_id: i64, user_id: i64) -> Result<Payment, BackOfficeError> {
        let mut conn = self.pool.acquire().await?;
        let payment = payments::delete_payment(payment_id, user_id, &mut conn)
            .await?
            .ok_or(BackOfficeError::PaymentNotFound(payment_id))?;
        debug!("🗃️ Payment #{payment_id} deleted from deal #{}", payment.deal_id);
        Ok(payment)
    }

    /// Recomputes a deal's derived totals inside one transaction.
    ///
    /// Both the deal and its payment set are re-read here rather than trusted from the caller, so
    /// two racing reconciliations each write totals consistent with a snapshot they observed
    /// themselves. The last writer wins.
    async fn reconcile_deal(&self, deal_id: i64, user_id: i64) -> Result<Option<Deal>, BackOfficeError> {
        let mut tx = self.pool.begin().await?;
        let Some(mut deal) = deals::fetch_deal(deal_id, user_id, &mut tx).await? else {
            debug!("🧮 Deal #{deal_id} not found for user #{user_id}. Nothing to reconcile");
            return Ok(None);
        };
        let payments = payments::fetch_payments_for_deal(deal_id, user_id, &mut tx).await?;
        let total_received: Money = payments.iter().map(|p| p.received).sum();
        // A zero-amount deal takes the sum of its installments as the expected total. Deals with
        // a genuinely zero expected value therefore flip to paid once every installment settles.
        let total_expected = if deal.amount.is_positive() {
            deal.amount
        } else {
            payments.iter().map(|p| p.amount).sum()
        };
        let payment_status = if total_received >= total_expected && total_expected.is_positive() {
            PaymentStatus::Paid
        } else if total_received.is_positive() {
            PaymentStatus::PartiallyPaid
        } else {
            PaymentStatus::Pending
        };
        deals::update_payment_totals(deal_id, total_received, payment_status, &mut tx).await?;
        deals::load_deliverables(std::slice::from_mut(&mut deal), &mut tx).await?;
        tx.commit().await?;
        debug!(
            "🧮 Deal #{deal_id} reconciled over {} payments: {total_received} of {total_expected} received, now \
             {payment_status}",
            payments.len()
        );
        deal.amount_received = total_received;
        deal.payment_status = payment_status;
        Ok(Some(deal))
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, BackOfficeError> {
        let mut conn = self.pool.acquire().await?;
        let user = users::insert_user(user, &mut conn).await?;
        debug!("🗃️ User [{}] created with id {}", user.email, user.id);
        Ok(user)
    }

    async fn delete_user(&self, user_id: i64) -> Result<(), BackOfficeError> {
        let mut conn = self.pool.acquire().await?;
        if !users::delete_user(user_id, &mut conn).await? {
            return Err(BackOfficeError::UserNotFound(user_id));
        }
        debug!("🗃️ User #{user_id} deleted, cascading to their deals, payments and notifications");
        Ok(())
    }

    async fn close(&mut self) -> Result<(), BackOfficeError> {
        self.pool.close().await;
        Ok(())
    }
}

impl NotificationManagement for SqliteDatabase {
    async fn insert_notification_if_absent(
        &self,
        notification: NewNotification,
    ) -> Result<InsertNotificationResult, NotificationError> {
        let mut conn = self.pool.acquire().await?;
        let result = notifications::idempotent_insert(notification, &mut conn).await?;
        Ok(result)
    }

    async fn fetch_notifications(&self, user_id: i64, limit: i64) -> Result<Vec<Notification>, NotificationError> {
        let mut conn = self.pool.acquire().await?;
        let notifications = notifications::fetch_notifications(user_id, limit, &mut conn).await?;
        Ok(notifications)
    }

    async fn unread_count(&self, user_id: i64) -> Result<i64, NotificationError> {
        let mut conn = self.pool.acquire().await?;
        let count = notifications::unread_count(user_id, &mut conn).await?;
        Ok(count)
    }

    async fn mark_notification_read(
        &self,
        notification_id: i64,
        user_id: i64,
    ) -> Result<Notification, NotificationError> {
        let mut conn = self.pool.acquire().await?;
        let notification = notifications::mark_read(notification_id, user_id, &mut conn)
            .await?
            .ok_or(NotificationError::NotificationNotFound(notification_id))?;
        Ok(notification)
    }

    async fn mark_all_notifications_read(&self, user_id: i64) -> Result<u64, NotificationError> {
        let mut conn = self.pool.acquire().await?;
        let updated = notifications::mark_all_read(user_id, &mut conn).await?;
        Ok(updated)
    }

    async fn purge_notifications_before(&self, cutoff: DateTime<Utc>) -> Result<u64, NotificationError> {
        let mut conn = self.pool.acquire().await?;
        let purged = notifications::purge_before(cutoff, &mut conn).await?;
        Ok(purged)
    }

    async fn fetch_notification_preferences(
        &self,
        user_id: i64,
    ) -> Result<Option<NotificationPreferences>, NotificationError> {
        let mut conn = self.pool.acquire().await?;
        let preferences = users::fetch_preferences(user_id, &mut conn).await?;
        Ok(preferences)
    }

    async fn update_notification_preferences(
        &self,
        user_id: i64,
        preferences: NotificationPreferences,
    ) -> Result<NotificationPreferences, NotificationError> {
        let mut conn = self.pool.acquire().await?;
        let updated = users::update_preferences(user_id, preferences, &mut conn)
            .await?
            .ok_or(NotificationError::UserNotFound(user_id))?;
        Ok(updated)
    }
}
