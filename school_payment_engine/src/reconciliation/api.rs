use std::fmt::Debug;

use chrono::Utc;
use log::*;
use sps_common::Money;

use crate::{
    db_types::{CollectId, NewOrder, NewWebhookLog, Order, OrderId, PaymentStatus, StatusEvent, StatusRecord, StatusUpdate},
    reconciliation::{
        errors::ReconciliationError,
        objects::{PollResult, StatusSnapshot, TransactionPage, TransactionQueryFilter, WebhookOutcome},
    },
    traits::ReconciliationDatabase,
};

/// The reconciliation facade.
///
/// All three ingestion paths (creation result, poll result, webhook/callback event) converge
/// here, so that status normalization, audit logging and the merge-style status upsert behave
/// identically regardless of where an event came from.
pub struct ReconciliationApi<B> {
    db: B,
}

impl<B> Debug for ReconciliationApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReconciliationApi")
    }
}

impl<B> ReconciliationApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> ReconciliationApi<B>
where B: ReconciliationDatabase
{
    /// Registers a new payment attempt: the order and its initial `pending` status record are
    /// written in one atomic transaction.
    pub async fn register_order(
        &self,
        order: NewOrder,
        amount: Money,
    ) -> Result<(Order, StatusRecord), ReconciliationError> {
        let (order, record) = self.db.create_order(order, amount).await?;
        debug!("🔄️ Order {} registered with pending status and amount {amount}", order.order_id);
        Ok((order, record))
    }

    /// Records the gateway's acceptance of a collect request: attaches the correlation fields to
    /// the order (set-once) and notes the progress on the status record.
    pub async fn record_gateway_acceptance(
        &self,
        order_id: &OrderId,
        collect_id: CollectId,
        gateway_sign: Option<String>,
        payment_url: Option<String>,
    ) -> Result<Order, ReconciliationError> {
        let order = self.db.attach_gateway_correlation(order_id, &collect_id, gateway_sign, payment_url).await?;
        let update = StatusUpdate::at(Utc::now()).with_payment_message("Payment link generated successfully");
        self.db.upsert_status(order.id, update).await?;
        debug!("🔄️ Order {order_id} accepted by the gateway as collect request {collect_id}");
        Ok(order)
    }

    /// Records a failed create attempt: the order's status becomes `failed` with the gateway's
    /// error attached. Used when the gateway returned a malformed success response; transport
    /// failures leave the order pending.
    pub async fn record_gateway_failure(
        &self,
        order_id: &OrderId,
        error: &str,
    ) -> Result<StatusRecord, ReconciliationError> {
        let order = self
            .db
            .fetch_order_by_order_id(order_id)
            .await?
            .ok_or_else(|| ReconciliationError::OrderNotFound(order_id.to_string()))?;
        let update = StatusUpdate::at(Utc::now())
            .with_status(PaymentStatus::Failed)
            .with_error_message(error)
            .with_payment_message("Failed to create payment link with gateway");
        let record = self.db.upsert_status(order.id, update).await?;
        warn!("🔄️ Order {order_id} marked as failed. {error}");
        Ok(record)
    }

    /// Applies the result of a backend-initiated status poll to the order's status record.
    pub async fn apply_poll_result(
        &self,
        order_id: &OrderId,
        poll: PollResult,
    ) -> Result<(Order, StatusRecord), ReconciliationError> {
        let order = self
            .db
            .fetch_order_by_order_id(order_id)
            .await?
            .ok_or_else(|| ReconciliationError::OrderNotFound(order_id.to_string()))?;
        let now = Utc::now();
        let mapped = PaymentStatus::from_gateway(poll.status.as_deref());
        let raw_status = poll.status.unwrap_or_else(|| "NA".to_string());
        let mut update = StatusUpdate::at(now)
            .with_status(mapped)
            .with_gateway_status(raw_status.clone())
            .with_gateway_response(poll.raw.to_string())
            .with_payment_message(format!("Status from gateway: {raw_status}"))
            .with_last_status_check(now);
        if let Some(amount) = poll.amount {
            update = update.with_transaction_amount(amount);
        }
        if mapped == PaymentStatus::Success {
            update = update.with_payment_time(now);
        }
        let record = self.db.upsert_status(order.id, update).await?;
        debug!("🔄️ Poll for {order_id} reported '{raw_status}', mapped to {mapped}");
        Ok((order, record))
    }

    /// Ingests an inbound notification, whatever its transport.
    ///
    /// The audit entry is written first, unconditionally. Then the order is resolved (internal id
    /// first, gateway collect id second), the raw status is normalized, and the update is merged
    /// into the status record. Failures after the audit write annotate the entry and bubble up;
    /// no status mutation happens in those cases.
    pub async fn ingest_event(&self, event: StatusEvent) -> Result<WebhookOutcome, ReconciliationError> {
        let log = NewWebhookLog {
            payload: event.raw_payload.to_string(),
            reported_status: event.reported_status.clone(),
            order_token: event.order_token.clone(),
        };
        let log_id = self.db.insert_webhook_log(log).await?;
        trace!("🔄️ {} recorded as audit entry #{log_id}", event.source);

        let token = match event.order_token.as_deref() {
            Some(token) if !token.is_empty() => token,
            _ => {
                let reason = "missing order reference in payload";
                self.db.record_webhook_error(log_id, reason).await?;
                warn!("🔄️ {} rejected: {reason}", event.source);
                return Err(ReconciliationError::InvalidEvent(reason.to_string()));
            },
        };
        let order = match self.db.resolve_order(token).await? {
            Some(order) => order,
            None => {
                self.db.record_webhook_error(log_id, "Order not found").await?;
                warn!("🔄️ {} for unknown order token {token}", event.source);
                return Err(ReconciliationError::OrderNotFound(token.to_string()));
            },
        };

        let mapped = PaymentStatus::from_gateway(event.reported_status.as_deref());
        let mut update = event.update.with_status(mapped);
        if let Some(raw) = event.reported_status.as_deref() {
            update = update.with_gateway_status(raw);
        }
        // Sparse payloads (GET callbacks) carry no payment time of their own.
        if mapped == PaymentStatus::Success && update.payment_time.is_none() {
            update = update.with_payment_time(Utc::now());
        }
        let record = self.db.upsert_status(order.id, update).await?;
        self.db.mark_webhook_processed(log_id).await?;
        debug!(
            "🔄️ {} for order {} applied. Status is now {}",
            event.source, order.order_id, record.status
        );
        Ok(WebhookOutcome { log_id, order, record })
    }

    /// The order and its status record. A missing record reads as implicit `pending`.
    pub async fn status_snapshot(&self, order_id: &OrderId) -> Result<StatusSnapshot, ReconciliationError> {
        let order = self
            .db
            .fetch_order_by_order_id(order_id)
            .await?
            .ok_or_else(|| ReconciliationError::OrderNotFound(order_id.to_string()))?;
        let record = self.db.fetch_status_for_order(order.id).await?;
        if record.is_none() {
            debug!("🔄️ Order {order_id} has no status record. Reporting implicit pending.");
        }
        Ok(StatusSnapshot { order, record })
    }

    /// The derived, paginated order/status listing.
    pub async fn list_transactions(
        &self,
        filter: TransactionQueryFilter,
    ) -> Result<TransactionPage, ReconciliationError> {
        let page = filter.page();
        let limit = filter.limit();
        let (transactions, total) = self.db.search_transactions(filter).await?;
        trace!("🔄️ Transaction listing returned {} of {total} rows", transactions.len());
        Ok(TransactionPage { transactions, total, page, limit })
    }
}
