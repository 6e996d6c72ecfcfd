use std::fmt::Debug;

use cf_common::Money;
use log::*;

use crate::{
    api::{
        errors::DealFlowApiError,
        objects::{DealQueryFilter, PaymentQueryFilter},
        NotificationApi,
    },
    db_types::{
        Deal,
        DealUpdate,
        Deliverable,
        NewDeal,
        NewNotification,
        NewPayment,
        NotificationKind,
        Payment,
        PaymentStatus,
        PaymentUpdate,
    },
    traits::{BackOfficeDatabase, BackOfficeError, NotificationManagement},
};

/// `DealFlowApi` is the primary API for deal and payment flows. Every payment mutation funnels
/// through here so that the parent deal is reconciled afterwards and the payment-received
/// notification side effects fire exactly where the flow dictates.
pub struct DealFlowApi<B> {
    db: B,
    notifier: NotificationApi<B>,
}

impl<B> Debug for DealFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DealFlowApi")
    }
}

impl<B> DealFlowApi<B> {
    pub fn new(db: B, notifier: NotificationApi<B>) -> Self {
        Self { db, notifier }
    }
}

impl<B> DealFlowApi<B>
where B: BackOfficeDatabase + NotificationManagement
{
    /// Submit a new deal.
    ///
    /// The deal and its deliverables are stored atomically, and a `deal_created` notification is
    /// raised for the owner. That notification kind has no mute category, so it is only ever
    /// dropped if the owner record itself is missing.
    pub async fn process_new_deal(&self, deal: NewDeal) -> Result<Deal, DealFlowApiError> {
        validate_new_deal(&deal)?;
        let deal = self.db.insert_deal(deal).await?;
        let notification = NewNotification::new(
            deal.user_id,
            NotificationKind::DealCreated,
            "Deal created".to_string(),
            format!("New deal with {}: {}", deal.brand_name, deal.deal_name),
        )
        .with_metadata(serde_json::json!({ "dealId": deal.id }));
        self.notifier.notify(notification).await?;
        debug!("🔄️📦️ Deal #{} processing complete for user #{}", deal.id, deal.user_id);
        Ok(deal)
    }

    pub async fn fetch_deal(&self, deal_id: i64, user_id: i64) -> Result<Option<Deal>, DealFlowApiError> {
        let deal = self.db.fetch_deal(deal_id, user_id).await?;
        Ok(deal)
    }

    pub async fn search_deals(&self, user_id: i64, query: DealQueryFilter) -> Result<Vec<Deal>, DealFlowApiError> {
        let deals = self.db.search_deals(user_id, query).await?;
        Ok(deals)
    }

    /// Applies the permitted field changes to a deal. If the expected amount changed, the deal is
    /// reconciled afterwards so its derived payment status can never go stale through this API.
    pub async fn update_deal(
        &self,
        deal_id: i64,
        user_id: i64,
        update: DealUpdate,
    ) -> Result<Deal, DealFlowApiError> {
        let amount_changed = update.amount.is_some();
        let deal = self.db.update_deal(deal_id, user_id, update).await?;
        if !amount_changed {
            return Ok(deal);
        }
        let reconciled = self.db.reconcile_deal(deal_id, user_id).await?;
        Ok(reconciled.unwrap_or(deal))
    }

    /// Deletes a deal and all of its payments.
    pub async fn delete_deal(&self, deal_id: i64, user_id: i64) -> Result<Deal, DealFlowApiError> {
        let deal = self.db.delete_deal(deal_id, user_id).await?;
        debug!("🔄️📦️ Deal #{deal_id} deleted for user #{user_id}");
        Ok(deal)
    }

    pub async fn complete_deliverable(
        &self,
        deliverable_id: i64,
        user_id: i64,
    ) -> Result<Deliverable, DealFlowApiError> {
        let deliverable = self.db.complete_deliverable(deliverable_id, user_id).await?;
        Ok(deliverable)
    }

    /// Submit a new payment against a deal.
    ///
    /// The deal must exist and belong to the payment's user. If money actually arrived with this
    /// installment (`received > 0`), a `payment_received` notification is raised. The parent deal
    /// is reconciled once the payment is stored.
    pub async fn process_new_payment(&self, payment: NewPayment) -> Result<Payment, DealFlowApiError> {
        let user_id = payment.user_id;
        let deal = self
            .db
            .fetch_deal(payment.deal_id, user_id)
            .await?
            .ok_or(BackOfficeError::DealNotFound(payment.deal_id))?;
        let payment = self.db.insert_payment(payment).await?;
        if payment.received.is_positive() {
            self.notify_payment_received(&deal, &payment, payment.received).await?;
        }
        self.db.reconcile_deal(deal.id, user_id).await?;
        debug!("🔄️💰️ Payment #{} processing complete. Deal #{} reconciled", payment.id, deal.id);
        Ok(payment)
    }

    pub async fn fetch_payment(&self, payment_id: i64, user_id: i64) -> Result<Option<Payment>, DealFlowApiError> {
        let payment = self.db.fetch_payment(payment_id, user_id).await?;
        Ok(payment)
    }

    pub async fn search_payments(
        &self,
        user_id: i64,
        query: PaymentQueryFilter,
    ) -> Result<Vec<Payment>, DealFlowApiError> {
        let payments = self.db.search_payments(user_id, query).await?;
        Ok(payments)
    }

    /// Applies the permitted field changes to a payment, raising a `payment_received`
    /// notification when the received amount grew or the status was upgraded to paid, and then
    /// reconciles the parent deal.
    pub async fn update_payment(
        &self,
        payment_id: i64,
        user_id: i64,
        update: PaymentUpdate,
    ) -> Result<Payment, DealFlowApiError> {
        let existing = self
            .db
            .fetch_payment(payment_id, user_id)
            .await?
            .ok_or(BackOfficeError::PaymentNotFound(payment_id))?;
        let previous_received = existing.received;
        let previous_status = existing.status;
        let payment = self.db.update_payment(payment_id, user_id, update).await?;

        let received_increase = payment.received - previous_received;
        let status_upgraded = previous_status != PaymentStatus::Paid && payment.status == PaymentStatus::Paid;
        if received_increase.is_positive() || status_upgraded {
            if let Some(deal) = self.db.fetch_deal(payment.deal_id, user_id).await? {
                self.notify_payment_received(&deal, &payment, payment.received).await?;
            }
        }
        self.db.reconcile_deal(payment.deal_id, user_id).await?;
        debug!("🔄️💰️ Payment #{payment_id} updated. Deal #{} reconciled", payment.deal_id);
        Ok(payment)
    }

    /// Deletes a payment and reconciles the deal it belonged to.
    pub async fn delete_payment(&self, payment_id: i64, user_id: i64) -> Result<Payment, DealFlowApiError> {
        let payment = self.db.delete_payment(payment_id, user_id).await?;
        self.db.reconcile_deal(payment.deal_id, user_id).await?;
        debug!("🔄️💰️ Payment #{payment_id} deleted. Deal #{} reconciled", payment.deal_id);
        Ok(payment)
    }

    /// Recomputes a deal's derived payment totals from its payment records. A missing or
    /// foreign-owned deal is a silent no-op.
    pub async fn reconcile(&self, deal_id: i64, user_id: i64) -> Result<Option<Deal>, DealFlowApiError> {
        let deal = self.db.reconcile_deal(deal_id, user_id).await?;
        Ok(deal)
    }

    async fn notify_payment_received(
        &self,
        deal: &Deal,
        payment: &Payment,
        received: Money,
    ) -> Result<(), DealFlowApiError> {
        let notification = NewNotification::new(
            deal.user_id,
            NotificationKind::PaymentReceived,
            "Payment received".to_string(),
            format!("{} sent {received}", deal.brand_name),
        )
        .with_metadata(serde_json::json!({ "dealId": deal.id, "paymentId": payment.id }));
        self.notifier.notify(notification).await?;
        Ok(())
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }
}

fn validate_new_deal(deal: &NewDeal) -> Result<(), BackOfficeError> {
    if deal.brand_name.trim().is_empty() {
        return Err(BackOfficeError::ValidationError("brand_name must not be empty".to_string()));
    }
    if deal.deal_name.trim().is_empty() {
        return Err(BackOfficeError::ValidationError("deal_name must not be empty".to_string()));
    }
    if deal.amount.value() < 0 {
        return Err(BackOfficeError::ValidationError("amount must not be negative".to_string()));
    }
    Ok(())
}
