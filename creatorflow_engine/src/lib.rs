//! CreatorFlow Engine
//!
//! The core of the CreatorFlow back office: deal and payment tracking for creators, with the
//! reconciliation and notification machinery that keeps derived state honest. This library is
//! transport-agnostic; HTTP routing, authentication and email delivery live with the host.
//!
//! The library is divided into these main sections:
//! 1. Storage ([`mod@sqlite`] behind the contracts in [`mod@traits`]). SQLite is the supported
//!    backend. You should never need to access the database directly; use the public APIs
//!    instead. The data types are defined in [`mod@db_types`] and are public.
//! 2. The public API ([`mod@api`]): [`DealFlowApi`] drives deal and payment flows, reconciling a
//!    deal's derived payment totals after every payment mutation; [`NotificationApi`] runs the
//!    notification pipeline (preference gate, dedupe, persist, emit), the deadline scan, and the
//!    reminder views.
//! 3. Live fan-out ([`mod@live`]): a registry of per-user channels that freshly created
//!    notifications are pushed to, plus the heartbeat that keeps them alive.
//! 4. Side-channel events ([`mod@events`]): a small relay the engine publishes billing events
//!    onto; hosts hook in their own async handlers (e.g. to send an email).
//! 5. Background workers ([`mod@workers`]): the notification retention sweep and the channel
//!    heartbeat.
pub mod api;
pub mod db_types;
pub mod events;
pub mod helpers;
pub mod live;
mod sqlite;
pub mod test_utils;
pub mod traits;
pub mod workers;

pub use api::{
    objects::{DealQueryFilter, DealReminder, NotificationsPage, NotifyOutcome, PaymentQueryFilter, ReminderSource},
    DealFlowApi,
    DealFlowApiError,
    NotificationApi,
    NotificationApiError,
};
pub use sqlite::SqliteDatabase;
pub use traits::{
    BackOfficeDatabase,
    BackOfficeError,
    InsertNotificationResult,
    NotificationError,
    NotificationManagement,
};
