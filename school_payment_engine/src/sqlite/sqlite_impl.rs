//! `SqliteDatabase` is the bundled storage backend for the reconciliation engine.
//!
//! It wraps a connection pool and implements [`ReconciliationDatabase`]. Multi-table flows (order
//! creation, the status upsert with its ordering guard) run inside a single transaction.
use std::fmt::Debug;

use log::*;
use sps_common::Money;
use sqlx::SqlitePool;

use super::db::{db_url, new_pool, orders, statuses, transactions, webhook_logs};
use crate::{
    db_types::{CollectId, NewOrder, NewWebhookLog, Order, OrderId, StatusRecord, StatusUpdate, WebhookLog},
    reconciliation::{TransactionQueryFilter, TransactionSummary},
    traits::{PaymentStoreError, ReconciliationDatabase},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

impl SqliteDatabase {
    /// Connects to the database at `SPS_DATABASE_URL` (or the default path) and runs any pending
    /// migrations.
    pub async fn new(max_connections: u32) -> Result<Self, PaymentStoreError> {
        let url = db_url();
        Self::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, PaymentStoreError> {
        let pool = new_pool(url, max_connections).await?;
        sqlx::migrate!("./src/sqlite/migrations")
            .run(&pool)
            .await
            .map_err(|e| PaymentStoreError::MigrationError(e.to_string()))?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl ReconciliationDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn create_order(&self, order: NewOrder, amount: Money) -> Result<(Order, StatusRecord), PaymentStoreError> {
        let order_id = order.order_id.clone();
        let mut tx = self.pool.begin().await?;
        let pk = orders::insert_order(&order, &mut tx).await.map_err(|e| {
            if is_unique_violation(&e) {
                PaymentStoreError::OrderAlreadyExists(order_id.clone())
            } else {
                e.into()
            }
        })?;
        statuses::insert_initial_status(pk, amount, &mut tx).await?;
        let order = orders::fetch_order_by_pk(pk, &mut tx)
            .await?
            .ok_or_else(|| PaymentStoreError::DatabaseError(format!("Order {order_id} vanished mid-transaction")))?;
        let record = statuses::fetch_status_for_order(pk, &mut tx)
            .await?
            .ok_or_else(|| PaymentStoreError::DatabaseError(format!("Status for {order_id} vanished mid-transaction")))?;
        tx.commit().await?;
        debug!("🗃️ Order {order_id} saved with id {pk} and initial pending status");
        Ok((order, record))
    }

    async fn attach_gateway_correlation(
        &self,
        order_id: &OrderId,
        collect_id: &CollectId,
        gateway_sign: Option<String>,
        payment_url: Option<String>,
    ) -> Result<Order, PaymentStoreError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::fetch_order_by_order_id(order_id, &mut tx)
            .await?
            .ok_or_else(|| PaymentStoreError::OrderNotFound(order_id.clone()))?;
        match order.collect_id.as_ref() {
            Some(existing) if existing == collect_id => {
                trace!("🗃️ Collect id {collect_id} is already attached to order {order_id}. Nothing to do.");
                tx.commit().await?;
                return Ok(order);
            },
            Some(existing) => {
                warn!("🗃️ Refusing to replace collect id {existing} on order {order_id} with {collect_id}");
                return Err(PaymentStoreError::CollectIdAlreadySet(order_id.clone()));
            },
            None => {},
        }
        orders::set_gateway_correlation(order.id, collect_id, gateway_sign.as_deref(), payment_url.as_deref(), &mut tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    PaymentStoreError::CollectIdConflict(collect_id.clone())
                } else {
                    e.into()
                }
            })?;
        let order = orders::fetch_order_by_pk(order.id, &mut tx)
            .await?
            .ok_or_else(|| PaymentStoreError::OrderNotFound(order_id.clone()))?;
        tx.commit().await?;
        Ok(order)
    }

    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_order_by_order_id(order_id, &mut conn).await?)
    }

    async fn fetch_order_by_collect_id(&self, collect_id: &CollectId) -> Result<Option<Order>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_order_by_collect_id(collect_id, &mut conn).await?)
    }

    async fn upsert_status(&self, order_pk: i64, update: StatusUpdate) -> Result<StatusRecord, PaymentStoreError> {
        let mut tx = self.pool.begin().await?;
        let existing = statuses::fetch_status_for_order(order_pk, &mut tx).await?;
        match existing {
            Some(record) if update.event_time < record.last_event_time => {
                // Stale event. The stored record already reflects a newer one.
                debug!(
                    "🗃️ Ignoring stale status event for order pk {order_pk} ({} < {})",
                    update.event_time, record.last_event_time
                );
                tx.commit().await?;
                return Ok(record);
            },
            Some(_) => statuses::apply_status_update(order_pk, &update, &mut tx).await?,
            None => statuses::insert_status_from_update(order_pk, &update, &mut tx).await?,
        }
        let record = statuses::fetch_status_for_order(order_pk, &mut tx).await?.ok_or_else(|| {
            PaymentStoreError::DatabaseError(format!("Status for order pk {order_pk} vanished mid-transaction"))
        })?;
        tx.commit().await?;
        trace!("🗃️ Status for order pk {order_pk} is now {}", record.status);
        Ok(record)
    }

    async fn fetch_status_for_order(&self, order_pk: i64) -> Result<Option<StatusRecord>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(statuses::fetch_status_for_order(order_pk, &mut conn).await?)
    }

    async fn insert_webhook_log(&self, log: NewWebhookLog) -> Result<i64, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let id = webhook_logs::insert_log(&log, &mut conn).await?;
        trace!("🗃️ Webhook audit entry #{id} written");
        Ok(id)
    }

    async fn mark_webhook_processed(&self, log_id: i64) -> Result<(), PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let affected = webhook_logs::mark_processed(log_id, &mut conn).await?;
        if affected == 0 {
            return Err(PaymentStoreError::WebhookLogNotFound(log_id));
        }
        Ok(())
    }

    async fn record_webhook_error(&self, log_id: i64, error: &str) -> Result<(), PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let affected = webhook_logs::record_error(log_id, error, &mut conn).await?;
        if affected == 0 {
            return Err(PaymentStoreError::WebhookLogNotFound(log_id));
        }
        Ok(())
    }

    async fn fetch_webhook_log(&self, log_id: i64) -> Result<Option<WebhookLog>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(webhook_logs::fetch_log(log_id, &mut conn).await?)
    }

    async fn search_transactions(
        &self,
        filter: TransactionQueryFilter,
    ) -> Result<(Vec<TransactionSummary>, i64), PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let rows = transactions::search_transactions(&filter, &mut conn).await?;
        let total = transactions::count_transactions(&filter, &mut conn).await?;
        Ok((rows, total))
    }

    async fn close(&mut self) -> Result<(), PaymentStoreError> {
        self.pool.close().await;
        Ok(())
    }
}
