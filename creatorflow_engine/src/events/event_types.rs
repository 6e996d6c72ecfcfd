use serde::{Deserialize, Serialize};

/// Published when a billing-related notification has been persisted. A host-registered hook
/// typically forwards this to the user's email address; the engine only guarantees the durable
/// notification record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingEmailEvent {
    pub user_id: i64,
    pub title: String,
    pub message: String,
}

impl BillingEmailEvent {
    pub fn new<S: Into<String>>(user_id: i64, title: S, message: S) -> Self {
        Self { user_id, title: title.into(), message: message.into() }
    }
}
