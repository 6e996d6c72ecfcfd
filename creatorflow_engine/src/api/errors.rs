use thiserror::Error;

use crate::traits::{BackOfficeError, NotificationError};

#[derive(Debug, Clone, Error)]
pub enum NotificationApiError {
    #[error("{0}")]
    BackOffice(#[from] BackOfficeError),
    #[error("{0}")]
    Notification(#[from] NotificationError),
}

#[derive(Debug, Clone, Error)]
pub enum DealFlowApiError {
    #[error("{0}")]
    BackOffice(#[from] BackOfficeError),
    #[error("{0}")]
    Notification(#[from] NotificationError),
}

impl From<NotificationApiError> for DealFlowApiError {
    fn from(e: NotificationApiError) -> Self {
        match e {
            NotificationApiError::BackOffice(e) => DealFlowApiError::BackOffice(e),
            NotificationApiError::Notification(e) => DealFlowApiError::Notification(e),
        }
    }
}
