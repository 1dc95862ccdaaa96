use sps_common::Money;
use thiserror::Error;

use crate::{
    db_types::{CollectId, NewOrder, NewWebhookLog, Order, OrderId, StatusRecord, StatusUpdate, WebhookLog},
    reconciliation::{TransactionQueryFilter, TransactionSummary},
};

/// The persistence boundary owned by the reconciliation engine.
///
/// Implementations must guarantee:
/// * `create_order` writes the order and its initial `pending` status record atomically.
/// * `upsert_status` is a merge: fields the update does not mention are preserved. If no record
///   exists for the order, one is created (a missing record means implicit `pending`).
/// * the gateway collect id, once set on an order, is never overwritten.
#[allow(async_fn_in_trait)]
pub trait ReconciliationDatabase: Clone {
    /// The URL of the database.
    fn url(&self) -> &str;

    /// Stores a new order together with its initial `pending` status record in a single atomic
    /// transaction. The status record starts with both amounts set to `amount` and the message
    /// "Payment initiated".
    async fn create_order(&self, order: NewOrder, amount: Money) -> Result<(Order, StatusRecord), PaymentStoreError>;

    /// Records the gateway's acceptance of the collect request on the order.
    ///
    /// Idempotent for the same collect id. Fails with [`PaymentStoreError::CollectIdAlreadySet`]
    /// if a different collect id was attached earlier.
    async fn attach_gateway_correlation(
        &self,
        order_id: &OrderId,
        collect_id: &CollectId,
        gateway_sign: Option<String>,
        payment_url: Option<String>,
    ) -> Result<Order, PaymentStoreError>;

    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, PaymentStoreError>;

    async fn fetch_order_by_collect_id(&self, collect_id: &CollectId) -> Result<Option<Order>, PaymentStoreError>;

    /// Resolves an inbound event's order token. The internal order id is tried first, then the
    /// gateway collect id; the first match wins.
    async fn resolve_order(&self, token: &str) -> Result<Option<Order>, PaymentStoreError> {
        if let Some(order) = self.fetch_order_by_order_id(&OrderId::from(token)).await? {
            return Ok(Some(order));
        }
        self.fetch_order_by_collect_id(&CollectId::from(token)).await
    }

    /// Merges the given update into the status record for the order, creating the record if none
    /// exists. Updates strictly older than the stored `last_event_time` are ignored and the
    /// stored record is returned unchanged.
    async fn upsert_status(&self, order_pk: i64, update: StatusUpdate) -> Result<StatusRecord, PaymentStoreError>;

    async fn fetch_status_for_order(&self, order_pk: i64) -> Result<Option<StatusRecord>, PaymentStoreError>;

    /// Appends an audit entry for an inbound notification. Returns the entry id.
    async fn insert_webhook_log(&self, log: NewWebhookLog) -> Result<i64, PaymentStoreError>;

    async fn mark_webhook_processed(&self, log_id: i64) -> Result<(), PaymentStoreError>;

    /// Attaches a processing outcome to an audit entry. The entry itself is never mutated
    /// otherwise.
    async fn record_webhook_error(&self, log_id: i64, error: &str) -> Result<(), PaymentStoreError>;

    async fn fetch_webhook_log(&self, log_id: i64) -> Result<Option<WebhookLog>, PaymentStoreError>;

    /// The derived, read-only transaction listing (orders joined with their status records).
    /// Returns the page of matches plus the total match count.
    async fn search_transactions(
        &self,
        filter: TransactionQueryFilter,
    ) -> Result<(Vec<TransactionSummary>, i64), PaymentStoreError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), PaymentStoreError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum PaymentStoreError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("Could not run database migrations: {0}")]
    MigrationError(String),
    #[error("Cannot insert order {0}, since it already exists")]
    OrderAlreadyExists(OrderId),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Order {0} already has a different gateway collect id attached")]
    CollectIdAlreadySet(OrderId),
    #[error("The gateway collect id {0} is already attached to another order")]
    CollectIdConflict(CollectId),
    #[error("The webhook audit entry {0} does not exist")]
    WebhookLogNotFound(i64),
}

impl From<sqlx::Error> for PaymentStoreError {
    fn from(e: sqlx::Error) -> Self {
        PaymentStoreError::DatabaseError(e.to_string())
    }
}
