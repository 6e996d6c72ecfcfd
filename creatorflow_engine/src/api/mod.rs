//! # The engine public API
//!
//! This provides the public-facing functionality of the back office engine. It is responsible for
//! deal and payment flows (with their reconciliation and notification side effects), the
//! notification pipeline itself, deadline scanning, and the request-time reminder views.
//! Specific backends need to implement the traits in [`crate::traits`] in order to act as storage
//! for these APIs.
mod deal_flow_api;
mod errors;
mod notification_api;
pub mod objects;

pub use deal_flow_api::DealFlowApi;
pub use errors::{DealFlowApiError, NotificationApiError};
pub use notification_api::NotificationApi;
