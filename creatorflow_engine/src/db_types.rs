use std::{fmt::Display, str::FromStr};

use cf_common::Money;
use chrono::{DateTime, Utc};
use log::error;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{types::Json, FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(String);

//--------------------------------------    DealStatus      ----------------------------------------------------------
/// The lifecycle state of a deal. Independent of its payment state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DealStatus {
    Active,
    Completed,
    Cancelled,
}

impl Display for DealStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DealStatus::Active => write!(f, "active"),
            DealStatus::Completed => write!(f, "completed"),
            DealStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for DealStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid deal status: {s}"))),
        }
    }
}

//--------------------------------------   PaymentStatus    ----------------------------------------------------------
/// Aggregate payment state. Derived on deals by the reconciliation engine; client-managed on
/// individual payment records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    PartiallyPaid,
    Paid,
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "pending"),
            PaymentStatus::PartiallyPaid => write!(f, "partially_paid"),
            PaymentStatus::Paid => write!(f, "paid"),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "partially_paid" => Ok(Self::PartiallyPaid),
            "paid" => Ok(Self::Paid),
            s => Err(ConversionError(format!("Invalid payment status: {s}"))),
        }
    }
}

impl From<String> for PaymentStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid payment status: {value}. But this conversion cannot fail. Defaulting to pending");
            PaymentStatus::Pending
        })
    }
}

//-------------------------------------- DeliverableStatus  ----------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DeliverableStatus {
    Pending,
    Completed,
}

impl Display for DeliverableStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliverableStatus::Pending => write!(f, "pending"),
            DeliverableStatus::Completed => write!(f, "completed"),
        }
    }
}

impl FromStr for DeliverableStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            s => Err(ConversionError(format!("Invalid deliverable status: {s}"))),
        }
    }
}

//-------------------------------------- NotificationKind   ----------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    DealCreated,
    PaymentReceived,
    DeadlineReminder,
    BillingEvent,
}

impl Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationKind::DealCreated => write!(f, "deal_created"),
            NotificationKind::PaymentReceived => write!(f, "payment_received"),
            NotificationKind::DeadlineReminder => write!(f, "deadline_reminder"),
            NotificationKind::BillingEvent => write!(f, "billing_event"),
        }
    }
}

impl FromStr for NotificationKind {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deal_created" => Ok(Self::DealCreated),
            "payment_received" => Ok(Self::PaymentReceived),
            "deadline_reminder" => Ok(Self::DeadlineReminder),
            "billing_event" => Ok(Self::BillingEvent),
            s => Err(ConversionError(format!("Invalid notification kind: {s}"))),
        }
    }
}

/// The user-preference categories that can mute notification kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferenceCategory {
    DeadlineReminders,
    PaymentAlerts,
    WeeklyDigest,
    Marketing,
}

impl NotificationKind {
    /// Maps a notification kind to the preference category that can suppress it.
    /// `DealCreated` has no category and can never be muted.
    pub fn preference_category(&self) -> Option<PreferenceCategory> {
        match self {
            NotificationKind::DeadlineReminder => Some(PreferenceCategory::DeadlineReminders),
            NotificationKind::PaymentReceived | NotificationKind::BillingEvent => {
                Some(PreferenceCategory::PaymentAlerts)
            },
            NotificationKind::DealCreated => None,
        }
    }
}

//--------------------------------------     Deliverable    ----------------------------------------------------------
/// A dated obligation belonging to a deal, e.g. a post that must go out by a given date.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Deliverable {
    pub id: i64,
    pub deal_id: i64,
    /// What must be delivered, e.g. "reel" or "story".
    pub kind: String,
    /// Overrides the deal-level platform when set.
    pub platform: Option<String>,
    pub status: DeliverableStatus,
    pub due_date: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Deliverable {
    pub fn is_pending(&self) -> bool {
        self.status == DeliverableStatus::Pending
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDeliverable {
    pub kind: String,
    pub platform: Option<String>,
    pub due_date: DateTime<Utc>,
}

impl NewDeliverable {
    pub fn new<S: Into<String>>(kind: S, due_date: DateTime<Utc>) -> Self {
        Self { kind: kind.into(), platform: None, due_date }
    }
}

//--------------------------------------        Deal        ----------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Deal {
    pub id: i64,
    pub user_id: i64,
    pub brand_name: String,
    pub brand_handle: Option<String>,
    pub deal_name: String,
    pub platform: String,
    pub status: DealStatus,
    /// Derived by reconciliation. Never written directly by callers.
    pub payment_status: PaymentStatus,
    /// The total value the brand agreed to pay.
    pub amount: Money,
    /// Derived by reconciliation: the sum of `received` over the deal's payments.
    pub amount_received: Money,
    pub due_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[sqlx(skip)]
    pub deliverables: Vec<Deliverable>,
}

impl Deal {
    /// Calendar days until the deal's own due date, when it has one. Negative means overdue.
    /// Computed per request for listings; never stored.
    pub fn days_left(&self, today: chrono::NaiveDate) -> Option<i64> {
        self.due_date.map(|due| crate::helpers::days_until(today, due))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDeal {
    pub user_id: i64,
    pub brand_name: String,
    pub brand_handle: Option<String>,
    pub deal_name: String,
    pub platform: String,
    pub amount: Money,
    pub due_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub deliverables: Vec<NewDeliverable>,
}

impl NewDeal {
    pub fn new<S: Into<String>>(user_id: i64, brand_name: S, deal_name: S, amount: Money) -> Self {
        Self {
            user_id,
            brand_name: brand_name.into(),
            brand_handle: None,
            deal_name: deal_name.into(),
            platform: "instagram".to_string(),
            amount,
            due_date: None,
            notes: None,
            deliverables: Vec::new(),
        }
    }

    pub fn with_deliverable(mut self, deliverable: NewDeliverable) -> Self {
        self.deliverables.push(deliverable);
        self
    }
}

/// The set of deal fields a client is allowed to change. The derived `payment_status` and
/// `amount_received` fields are deliberately absent. Only `Some` fields are applied.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DealUpdate {
    pub brand_name: Option<String>,
    pub brand_handle: Option<String>,
    pub deal_name: Option<String>,
    pub platform: Option<String>,
    pub status: Option<DealStatus>,
    pub amount: Option<Money>,
    pub due_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl DealUpdate {
    pub fn is_empty(&self) -> bool {
        self.brand_name.is_none()
            && self.brand_handle.is_none()
            && self.deal_name.is_none()
            && self.platform.is_none()
            && self.status.is_none()
            && self.amount.is_none()
            && self.due_date.is_none()
            && self.notes.is_none()
    }

    pub fn with_status(mut self, status: DealStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_amount(mut self, amount: Money) -> Self {
        self.amount = Some(amount);
        self
    }
}

//--------------------------------------      Payment       ----------------------------------------------------------
/// One expected-or-received installment against a deal.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub user_id: i64,
    pub deal_id: i64,
    /// The expected value of this installment.
    pub amount: Money,
    /// The amount actually collected so far.
    pub received: Money,
    pub status: PaymentStatus,
    pub due_date: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPayment {
    pub user_id: i64,
    pub deal_id: i64,
    pub amount: Money,
    pub received: Money,
    pub status: PaymentStatus,
    pub due_date: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl NewPayment {
    pub fn new(user_id: i64, deal_id: i64, amount: Money) -> Self {
        Self {
            user_id,
            deal_id,
            amount,
            received: Money::default(),
            status: PaymentStatus::Pending,
            due_date: None,
            paid_at: None,
            notes: None,
        }
    }

    pub fn with_received(mut self, received: Money) -> Self {
        self.received = received;
        self
    }

    pub fn with_status(mut self, status: PaymentStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_due_date(mut self, due_date: DateTime<Utc>) -> Self {
        self.due_date = Some(due_date);
        self
    }
}

/// Client-updatable payment fields. Only `Some` fields are applied.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentUpdate {
    pub amount: Option<Money>,
    pub received: Option<Money>,
    pub status: Option<PaymentStatus>,
    pub due_date: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl PaymentUpdate {
    pub fn is_empty(&self) -> bool {
        self.amount.is_none()
            && self.received.is_none()
            && self.status.is_none()
            && self.due_date.is_none()
            && self.paid_at.is_none()
            && self.notes.is_none()
    }

    pub fn with_received(mut self, received: Money) -> Self {
        self.received = Some(received);
        self
    }

    pub fn with_status(mut self, status: PaymentStatus) -> Self {
        self.status = Some(status);
        self
    }
}

//--------------------------------------    Notification    ----------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    /// `None` until the user reads the notification.
    pub read_at: Option<DateTime<Utc>>,
    /// Scoped per user. At most one notification per (user, key) ever exists.
    pub dedupe_key: Option<String>,
    pub metadata: Option<Json<Value>>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn is_unread(&self) -> bool {
        self.read_at.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewNotification {
    pub user_id: i64,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub dedupe_key: Option<String>,
    pub metadata: Option<Value>,
}

impl NewNotification {
    pub fn new<S: Into<String>>(user_id: i64, kind: NotificationKind, title: S, message: S) -> Self {
        Self { user_id, kind, title: title.into(), message: message.into(), dedupe_key: None, metadata: None }
    }

    pub fn with_dedupe_key<S: Into<String>>(mut self, key: S) -> Self {
        self.dedupe_key = Some(key.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

//-------------------------------- NotificationPreferences  ----------------------------------------------------------
/// Per-user mute flags, one per category. `None` means the user never set the flag, which is
/// treated the same as `true`: only an explicit `false` suppresses.
#[derive(Debug, Clone, Copy, Default, FromRow, Serialize, Deserialize)]
pub struct NotificationPreferences {
    pub deadline_reminders: Option<bool>,
    pub payment_alerts: Option<bool>,
    pub weekly_digest: Option<bool>,
    pub marketing: Option<bool>,
}

impl NotificationPreferences {
    /// Whether notifications in the given category are muted.
    pub fn is_muted(&self, category: PreferenceCategory) -> bool {
        let flag = match category {
            PreferenceCategory::DeadlineReminders => self.deadline_reminders,
            PreferenceCategory::PaymentAlerts => self.payment_alerts,
            PreferenceCategory::WeeklyDigest => self.weekly_digest,
            PreferenceCategory::Marketing => self.marketing,
        };
        flag == Some(false)
    }
}

//--------------------------------------       User         ----------------------------------------------------------
/// The slice of the user record this engine cares about. Credentials and profile data live with
/// the auth layer.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: Option<String>,
    pub email: String,
    pub currency: String,
    pub pricing_plan: String,
    #[sqlx(flatten)]
    pub preferences: NotificationPreferences,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub name: Option<String>,
    pub email: String,
}

impl NewUser {
    pub fn new<S: Into<String>>(email: S) -> Self {
        Self { name: None, email: email.into() }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn statuses_round_trip_through_strings() {
        for status in [PaymentStatus::Pending, PaymentStatus::PartiallyPaid, PaymentStatus::Paid] {
            assert_eq!(status.to_string().parse::<PaymentStatus>().unwrap(), status);
        }
        for kind in [
            NotificationKind::DealCreated,
            NotificationKind::PaymentReceived,
            NotificationKind::DeadlineReminder,
            NotificationKind::BillingEvent,
        ] {
            assert_eq!(kind.to_string().parse::<NotificationKind>().unwrap(), kind);
        }
        assert!("overpaid".parse::<PaymentStatus>().is_err());
    }

    #[test]
    fn preference_mapping_is_exhaustive() {
        assert_eq!(
            NotificationKind::DeadlineReminder.preference_category(),
            Some(PreferenceCategory::DeadlineReminders)
        );
        assert_eq!(NotificationKind::PaymentReceived.preference_category(), Some(PreferenceCategory::PaymentAlerts));
        assert_eq!(NotificationKind::BillingEvent.preference_category(), Some(PreferenceCategory::PaymentAlerts));
        assert_eq!(NotificationKind::DealCreated.preference_category(), None);
    }

    #[test]
    fn only_explicit_false_mutes() {
        let mut prefs = NotificationPreferences::default();
        assert!(!prefs.is_muted(PreferenceCategory::PaymentAlerts));
        prefs.payment_alerts = Some(true);
        assert!(!prefs.is_muted(PreferenceCategory::PaymentAlerts));
        prefs.payment_alerts = Some(false);
        assert!(prefs.is_muted(PreferenceCategory::PaymentAlerts));
    }
}
