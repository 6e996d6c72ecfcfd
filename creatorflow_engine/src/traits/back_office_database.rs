use thiserror::Error;

use crate::{
    api::objects::{DealQueryFilter, PaymentQueryFilter},
    db_types::{Deal, DealUpdate, Deliverable, NewDeal, NewPayment, NewUser, Payment, PaymentUpdate, User},
};

/// The highest level of behaviour a backend must support for deal and payment flows.
///
/// This includes:
/// * Creating and mutating deals, deliverables and payments, always scoped by the owning user.
/// * Reconciling a deal's derived payment totals from its payment records.
/// * Cascading deletes (a deal takes its payments with it; a user takes everything).
#[allow(async_fn_in_trait)]
pub trait BackOfficeDatabase: Clone {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Inserts a deal together with its deliverables in a single atomic transaction.
    async fn insert_deal(&self, deal: NewDeal) -> Result<Deal, BackOfficeError>;

    /// Fetches the deal with the given id, provided it belongs to `user_id`. The deal's
    /// deliverables are loaded along with it.
    async fn fetch_deal(&self, deal_id: i64, user_id: i64) -> Result<Option<Deal>, BackOfficeError>;

    /// Fetches deals matching the filter, newest first, deliverables included.
    async fn search_deals(&self, user_id: i64, query: DealQueryFilter) -> Result<Vec<Deal>, BackOfficeError>;

    /// Fetches the user's deals that still have at least one pending deliverable. Used by the
    /// deadline scan.
    async fn fetch_deals_with_pending_deliverables(&self, user_id: i64) -> Result<Vec<Deal>, BackOfficeError>;

    /// Applies the permitted field changes to a deal. Returns the updated deal, or an error when
    /// the deal does not exist or is not owned by `user_id`.
    async fn update_deal(&self, deal_id: i64, user_id: i64, update: DealUpdate) -> Result<Deal, BackOfficeError>;

    /// Deletes a deal and all of its payments in a single atomic transaction.
    async fn delete_deal(&self, deal_id: i64, user_id: i64) -> Result<Deal, BackOfficeError>;

    /// Marks a deliverable as completed, stamping the completion time.
    async fn complete_deliverable(
        &self,
        deliverable_id: i64,
        user_id: i64,
    ) -> Result<Deliverable, BackOfficeError>;

    /// Inserts a payment. The referenced deal must exist and belong to the payment's user.
    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment, BackOfficeError>;

    /// Fetches a single payment scoped by owner.
    async fn fetch_payment(&self, payment_id: i64, user_id: i64) -> Result<Option<Payment>, BackOfficeError>;

    /// Fetches all payments recorded against a deal, in insertion order.
    async fn fetch_payments_for_deal(&self, deal_id: i64, user_id: i64) -> Result<Vec<Payment>, BackOfficeError>;

    /// Fetches payments matching the filter, newest first.
    async fn search_payments(&self, user_id: i64, query: PaymentQueryFilter) -> Result<Vec<Payment>, BackOfficeError>;

    /// Applies the permitted field changes to a payment.
    async fn update_payment(
        &self,
        payment_id: i64,
        user_id: i64,
        update: PaymentUpdate,
    ) -> Result<Payment, BackOfficeError>;

    /// Deletes a payment, returning the deleted record so the caller can reconcile its deal.
    async fn delete_payment(&self, payment_id: i64, user_id: i64) -> Result<Payment, BackOfficeError>;

    /// Recomputes and persists a deal's `amount_received` and `payment_status` from its payment
    /// records, in a single transaction.
    ///
    /// A deal that does not exist, or that belongs to another user, is a silent no-op and returns
    /// `None`; the caller's context already guarantees ownership, so absence here means the deal
    /// went away underneath us.
    ///
    /// Calling this twice with unchanged payments yields identical stored state.
    async fn reconcile_deal(&self, deal_id: i64, user_id: i64) -> Result<Option<Deal>, BackOfficeError>;

    /// Creates a user record. Primarily of interest to tests and provisioning flows; auth lives
    /// elsewhere.
    async fn insert_user(&self, user: NewUser) -> Result<User, BackOfficeError>;

    /// Deletes a user and everything they own.
    async fn delete_user(&self, user_id: i64) -> Result<(), BackOfficeError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), BackOfficeError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum BackOfficeError {
    #[error("We have an internal database engine error (configuration/uptime etc.): {0}")]
    DatabaseError(String),
    #[error("The requested deal {0} does not exist")]
    DealNotFound(i64),
    #[error("The requested payment {0} does not exist")]
    PaymentNotFound(i64),
    #[error("The requested deliverable {0} does not exist")]
    DeliverableNotFound(i64),
    #[error("The requested user {0} does not exist")]
    UserNotFound(i64),
    #[error("Invalid input: {0}")]
    ValidationError(String),
}

impl From<sqlx::Error> for BackOfficeError {
    fn from(e: sqlx::Error) -> Self {
        BackOfficeError::DatabaseError(e.to_string())
    }
}
