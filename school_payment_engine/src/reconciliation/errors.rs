use thiserror::Error;

use crate::traits::PaymentStoreError;

#[derive(Debug, Error)]
pub enum ReconciliationError {
    /// The event referenced an order that does not exist. Non-fatal; the audit entry has been
    /// written and annotated.
    #[error("Order {0} could not be found")]
    OrderNotFound(String),
    /// The event payload was missing required information. The audit entry has been written and
    /// annotated.
    #[error("Invalid status event: {0}")]
    InvalidEvent(String),
    #[error("Storage error: {0}")]
    StoreError(#[from] PaymentStoreError),
}
