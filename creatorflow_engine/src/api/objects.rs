use std::fmt::Display;

use cf_common::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{DealStatus, Notification, PaymentStatus};

//--------------------------------------   NotifyOutcome    ----------------------------------------------------------
/// What became of a [`crate::NotificationApi::notify`] call. Suppression and deduplication are
/// normal outcomes, not errors.
#[derive(Debug, Clone)]
pub enum NotifyOutcome {
    /// A new notification was persisted and pushed to any live viewers.
    Created(Notification),
    /// A notification with the same dedupe key already existed. Nothing was written or emitted.
    Duplicate(Notification),
    /// The preference gate declined the notification, or the target user does not exist. Nothing
    /// was written or emitted.
    Suppressed,
}

impl NotifyOutcome {
    pub fn created(&self) -> Option<&Notification> {
        match self {
            NotifyOutcome::Created(n) => Some(n),
            _ => None,
        }
    }

    pub fn notification(&self) -> Option<&Notification> {
        match self {
            NotifyOutcome::Created(n) | NotifyOutcome::Duplicate(n) => Some(n),
            NotifyOutcome::Suppressed => None,
        }
    }

    pub fn is_suppressed(&self) -> bool {
        matches!(self, NotifyOutcome::Suppressed)
    }
}

//--------------------------------------   DealQueryFilter  ----------------------------------------------------------
/// Search criteria for deal listings. An empty filter matches all of the user's deals.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DealQueryFilter {
    /// Fuzzy match against brand name, brand handle and deal name.
    pub search: Option<String>,
    pub platform: Option<String>,
    pub status: Option<DealStatus>,
    pub payment_status: Option<PaymentStatus>,
}

impl DealQueryFilter {
    pub fn with_search<S: Into<String>>(mut self, search: S) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn with_platform<S: Into<String>>(mut self, platform: S) -> Self {
        self.platform = Some(platform.into());
        self
    }

    pub fn with_status(mut self, status: DealStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_payment_status(mut self, status: PaymentStatus) -> Self {
        self.payment_status = Some(status);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.search.is_none() && self.platform.is_none() && self.status.is_none() && self.payment_status.is_none()
    }
}

impl Display for DealQueryFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            write!(f, "No filters.")?;
            return Ok(());
        }
        if let Some(search) = &self.search {
            write!(f, "search: {search}. ")?;
        }
        if let Some(platform) = &self.platform {
            write!(f, "platform: {platform}. ")?;
        }
        if let Some(status) = &self.status {
            write!(f, "status: {status}. ")?;
        }
        if let Some(payment_status) = &self.payment_status {
            write!(f, "payment_status: {payment_status}. ")?;
        }
        Ok(())
    }
}

//-------------------------------------- PaymentQueryFilter ----------------------------------------------------------
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PaymentQueryFilter {
    pub deal_id: Option<i64>,
    pub status: Option<PaymentStatus>,
}

impl PaymentQueryFilter {
    pub fn with_deal_id(mut self, deal_id: i64) -> Self {
        self.deal_id = Some(deal_id);
        self
    }

    pub fn with_status(mut self, status: PaymentStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.deal_id.is_none() && self.status.is_none()
    }
}

//--------------------------------------    DealReminder    ----------------------------------------------------------
/// Where a reminder entry came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "source")]
pub enum ReminderSource {
    /// A pending deliverable that is due.
    Deliverable { kind: String },
    /// An unpaid payment installment with a due date.
    Payment { payment_id: i64, amount: Money },
}

/// One entry in the request-time reminder view over a deal. Recomputed on every call; never
/// persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealReminder {
    pub deal_id: i64,
    pub source: ReminderSource,
    pub due_date: DateTime<Utc>,
    /// Calendar days until the due date. Negative means overdue.
    pub days_left: i64,
}

//-------------------------------------- NotificationsPage  ----------------------------------------------------------
/// A page of notifications plus the user's unread tally, as served to notification centres.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsPage {
    pub notifications: Vec<Notification>,
    pub unread_count: i64,
}
