//! # Storage contracts
//!
//! This module defines the interfaces a database backend must expose to act as storage for the
//! CreatorFlow engine.
//!
//! * [`BackOfficeDatabase`] covers deals, deliverables, payments and the reconciliation of a
//!   deal's derived payment totals.
//! * [`NotificationManagement`] covers notification records, the per-user dedupe primitive, read
//!   state, retention, and the user preference source consulted by the notification gate.
mod back_office_database;
mod notification_management;

pub use back_office_database::{BackOfficeDatabase, BackOfficeError};
pub use notification_management::{InsertNotificationResult, NotificationError, NotificationManagement};
