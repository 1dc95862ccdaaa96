use chrono::{DateTime, Utc};
use serde::Serialize;
use sps_common::Money;

use crate::db_types::{CollectId, Order, OrderId, PaymentStatus, StatusRecord};

const DEFAULT_PAGE_SIZE: i64 = 10;
const MAX_PAGE_SIZE: i64 = 100;

//--------------------------------------   TransactionQueryFilter   --------------------------------------------------
#[derive(Debug, Clone, Default)]
pub struct TransactionQueryFilter {
    pub school_id: Option<String>,
    pub status: Option<PaymentStatus>,
    page: Option<i64>,
    limit: Option<i64>,
}

impl TransactionQueryFilter {
    pub fn with_school_id<S: Into<String>>(mut self, school_id: S) -> Self {
        self.school_id = Some(school_id.into());
        self
    }

    pub fn with_status(mut self, status: PaymentStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_page(mut self, page: i64) -> Self {
        self.page = Some(page);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1) * self.limit()
    }
}

//--------------------------------------    TransactionSummary     ---------------------------------------------------
/// One row of the derived order/status listing. Read-only; not part of the state machine.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionSummary {
    /// The order's internal primary key.
    pub collect_id: i64,
    pub custom_order_id: OrderId,
    pub school_id: String,
    pub gateway: String,
    pub gateway_collect_id: Option<CollectId>,
    pub student_name: String,
    pub order_amount: Money,
    pub transaction_amount: Money,
    pub status: PaymentStatus,
    pub payment_time: Option<DateTime<Utc>>,
    pub payment_mode: String,
    pub bank_reference: String,
}

#[cfg(feature = "sqlite")]
impl sqlx::FromRow<'_, sqlx::sqlite::SqliteRow> for TransactionSummary {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(Self {
            collect_id: row.try_get("id")?,
            custom_order_id: row.try_get("order_id")?,
            school_id: row.try_get("school_id")?,
            gateway: row.try_get("gateway_name")?,
            gateway_collect_id: row.try_get("collect_id")?,
            student_name: row.try_get("student_name")?,
            order_amount: row.try_get("order_amount")?,
            transaction_amount: row.try_get("transaction_amount")?,
            status: row.try_get("status")?,
            payment_time: row.try_get("payment_time")?,
            payment_mode: row.try_get("payment_mode")?,
            bank_reference: row.try_get("bank_reference")?,
        })
    }
}

//--------------------------------------      TransactionPage      ---------------------------------------------------
#[derive(Debug, Clone, Serialize)]
pub struct TransactionPage {
    pub transactions: Vec<TransactionSummary>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

impl TransactionPage {
    pub fn total_pages(&self) -> i64 {
        if self.total == 0 {
            0
        } else {
            (self.total + self.limit - 1) / self.limit
        }
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }
}

//--------------------------------------      StatusSnapshot       ---------------------------------------------------
/// An order together with its status record, if one exists.
///
/// A missing record is not an error: a crash between the order write and the initial status write
/// leaves exactly this state, which is read as implicit `pending`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub order: Order,
    pub record: Option<StatusRecord>,
}

impl StatusSnapshot {
    pub fn status(&self) -> PaymentStatus {
        self.record.as_ref().map(|r| r.status).unwrap_or_default()
    }
}

//--------------------------------------        PollResult         ---------------------------------------------------
/// The gateway's raw answer to a status poll, unmapped.
#[derive(Debug, Clone)]
pub struct PollResult {
    pub status: Option<String>,
    pub amount: Option<Money>,
    pub raw: serde_json::Value,
}

//--------------------------------------      WebhookOutcome       ---------------------------------------------------
/// The result of successfully ingesting an inbound notification.
#[derive(Debug, Clone)]
pub struct WebhookOutcome {
    /// The id of the audit entry written for this event.
    pub log_id: i64,
    pub order: Order,
    pub record: StatusRecord,
}
