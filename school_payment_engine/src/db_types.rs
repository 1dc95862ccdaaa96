use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sps_common::Money;
use sqlx::Type;
use thiserror::Error;

//--------------------------------------     PaymentStatus    --------------------------------------------------------
/// The canonical, source-agnostic payment lifecycle status.
///
/// Every external status string, whether it arrives via a poll result, a webhook POST or a GET
/// callback, is mapped onto this taxonomy through [`PaymentStatus::from_gateway`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// The payment has been initiated but the gateway has not confirmed an outcome yet.
    #[default]
    Pending,
    /// The gateway confirmed the payment.
    Success,
    /// The payment failed, or the gateway reported it as cancelled.
    Failed,
    /// The payment was cancelled. Never produced by normalization; only mirrored from storage.
    Cancelled,
}

impl PaymentStatus {
    /// Maps a raw gateway status string onto the canonical taxonomy.
    ///
    /// The mapping is total and case-insensitive. Unrecognized or absent values map to `Pending`
    /// as the fail-safe default. This is the single source of truth for status normalization;
    /// no ingestion path may interpret gateway statuses on its own.
    pub fn from_gateway(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_uppercase()).as_deref() {
            Some("SUCCESS") => Self::Success,
            Some("FAILED") | Some("CANCELLED") => Self::Failed,
            Some("PENDING") | Some("PROCESSING") => Self::Pending,
            _ => Self::Pending,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid payment status: {0}")]
pub struct StatusConversionError(String);

impl FromStr for PaymentStatus {
    type Err = StatusConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            s => Err(StatusConversionError(s.to_string())),
        }
    }
}

//--------------------------------------        OrderId       --------------------------------------------------------
/// The internally generated, client-facing order correlation id (e.g. `ORD_1717171717000_x3f9a`).
#[derive(Debug, Clone, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct OrderId(pub String);

impl<S: Into<String>> From<S> for OrderId {
    fn from(value: S) -> Self {
        Self(value.into())
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------       CollectId      --------------------------------------------------------
/// The gateway-issued collect-request id correlating an [`Order`] with the upstream payment.
#[derive(Debug, Clone, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct CollectId(pub String);

impl<S: Into<String>> From<S> for CollectId {
    fn from(value: S) -> Self {
        Self(value.into())
    }
}

impl Display for CollectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl CollectId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------      StudentInfo     --------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentInfo {
    pub name: String,
    pub id: String,
    pub email: String,
}

//--------------------------------------        NewOrder      --------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewOrder {
    /// The internally generated correlation id. Unique, assigned at creation.
    pub order_id: OrderId,
    pub school_id: String,
    pub trustee_id: String,
    pub student: StudentInfo,
    pub gateway_name: String,
}

impl NewOrder {
    pub fn new(order_id: OrderId, school_id: String, trustee_id: String, student: StudentInfo) -> Self {
        Self { order_id, school_id, trustee_id, student, gateway_name: "Edviron".to_string() }
    }

    pub fn with_gateway_name(mut self, gateway_name: String) -> Self {
        self.gateway_name = gateway_name;
        self
    }
}

//--------------------------------------         Order        --------------------------------------------------------
/// A payment attempt's immutable identity. The gateway correlation fields are absent until the
/// gateway accepts the collect request, and are set exactly once thereafter.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    pub school_id: String,
    pub trustee_id: String,
    pub student: StudentInfo,
    pub gateway_name: String,
    pub collect_id: Option<CollectId>,
    pub gateway_sign: Option<String>,
    pub payment_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------      StatusRecord    --------------------------------------------------------
/// The mutable lifecycle state of an order's payment, one-to-one with an [`Order`].
#[derive(Debug, Clone, Serialize)]
pub struct StatusRecord {
    pub id: i64,
    /// The internal primary key of the owning order.
    pub order_pk: i64,
    pub order_amount: Money,
    pub transaction_amount: Money,
    pub payment_mode: String,
    pub payment_details: String,
    pub bank_reference: String,
    pub payment_message: String,
    pub status: PaymentStatus,
    pub error_message: String,
    pub payment_time: Option<DateTime<Utc>>,
    /// The last raw status string the gateway reported, unmapped.
    pub gateway_status: Option<String>,
    /// The last raw gateway response blob, kept for diagnostics.
    pub gateway_response: Option<String>,
    pub last_status_check: Option<DateTime<Utc>>,
    /// Ordering guard: updates received before this are ignored by the upsert.
    pub last_event_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------      StatusUpdate    --------------------------------------------------------
/// A partial status update. Only the fields that are set are written; everything else on the
/// stored record is preserved, which is what lets a sparse GET callback coexist with a rich POST
/// payload.
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub status: Option<PaymentStatus>,
    pub order_amount: Option<Money>,
    pub transaction_amount: Option<Money>,
    pub payment_mode: Option<String>,
    pub payment_details: Option<String>,
    pub bank_reference: Option<String>,
    pub payment_message: Option<String>,
    pub error_message: Option<String>,
    pub payment_time: Option<DateTime<Utc>>,
    pub gateway_status: Option<String>,
    pub gateway_response: Option<String>,
    pub last_status_check: Option<DateTime<Utc>>,
    /// When this update was received, on the local clock. Every ingestion path stamps it the same
    /// way; updates strictly older than the stored record's `last_event_time` are ignored.
    pub event_time: DateTime<Utc>,
}

impl StatusUpdate {
    pub fn at(event_time: DateTime<Utc>) -> Self {
        Self {
            status: None,
            order_amount: None,
            transaction_amount: None,
            payment_mode: None,
            payment_details: None,
            bank_reference: None,
            payment_message: None,
            error_message: None,
            payment_time: None,
            gateway_status: None,
            gateway_response: None,
            last_status_check: None,
            event_time,
        }
    }

    pub fn with_status(mut self, status: PaymentStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_order_amount(mut self, amount: Money) -> Self {
        self.order_amount = Some(amount);
        self
    }

    pub fn with_transaction_amount(mut self, amount: Money) -> Self {
        self.transaction_amount = Some(amount);
        self
    }

    pub fn with_payment_mode<S: Into<String>>(mut self, mode: S) -> Self {
        self.payment_mode = Some(mode.into());
        self
    }

    pub fn with_payment_details<S: Into<String>>(mut self, details: S) -> Self {
        self.payment_details = Some(details.into());
        self
    }

    pub fn with_bank_reference<S: Into<String>>(mut self, bank_reference: S) -> Self {
        self.bank_reference = Some(bank_reference.into());
        self
    }

    pub fn with_payment_message<S: Into<String>>(mut self, message: S) -> Self {
        self.payment_message = Some(message.into());
        self
    }

    pub fn with_error_message<S: Into<String>>(mut self, message: S) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn with_payment_time(mut self, time: DateTime<Utc>) -> Self {
        self.payment_time = Some(time);
        self
    }

    pub fn with_gateway_status<S: Into<String>>(mut self, status: S) -> Self {
        self.gateway_status = Some(status.into());
        self
    }

    pub fn with_gateway_response<S: Into<String>>(mut self, response: S) -> Self {
        self.gateway_response = Some(response.into());
        self
    }

    pub fn with_last_status_check(mut self, time: DateTime<Utc>) -> Self {
        self.last_status_check = Some(time);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.order_amount.is_none()
            && self.transaction_amount.is_none()
            && self.payment_mode.is_none()
            && self.payment_details.is_none()
            && self.bank_reference.is_none()
            && self.payment_message.is_none()
            && self.error_message.is_none()
            && self.payment_time.is_none()
            && self.gateway_status.is_none()
            && self.gateway_response.is_none()
            && self.last_status_check.is_none()
    }
}

//--------------------------------------      StatusEvent     --------------------------------------------------------
/// Where an inbound status-bearing event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSource {
    WebhookPost,
    CallbackGet,
}

impl Display for EventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventSource::WebhookPost => write!(f, "webhook POST"),
            EventSource::CallbackGet => write!(f, "callback GET"),
        }
    }
}

/// A source-agnostic inbound notification, ready for ingestion.
///
/// Transports (POST body, GET query string) are normalized into this shape at the HTTP boundary;
/// the engine takes it from here. The canonical status is *not* part of the update: the engine
/// derives it from `reported_status` so that normalization has a single home.
#[derive(Debug, Clone)]
pub struct StatusEvent {
    pub source: EventSource,
    /// The order-identifying token extracted from the payload, if any. May match either the
    /// internal order id or the gateway collect id.
    pub order_token: Option<String>,
    /// The raw status string the gateway reported, unmapped.
    pub reported_status: Option<String>,
    /// The payload exactly as received, for the audit log.
    pub raw_payload: serde_json::Value,
    pub update: StatusUpdate,
}

//--------------------------------------     WebhookLog       --------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewWebhookLog {
    pub payload: String,
    pub reported_status: Option<String>,
    pub order_token: Option<String>,
}

/// One append-only audit entry per inbound notification, whether or not it could be applied.
#[derive(Debug, Clone)]
pub struct WebhookLog {
    pub id: i64,
    pub payload: String,
    pub reported_status: Option<String>,
    pub order_token: Option<String>,
    pub processed: bool,
    pub processing_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(feature = "sqlite")]
mod sqlite_rows {
    use sqlx::{sqlite::SqliteRow, FromRow, Row};

    use super::{Order, StatusRecord, StudentInfo, WebhookLog};

    impl FromRow<'_, SqliteRow> for Order {
        fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
            Ok(Self {
                id: row.try_get("id")?,
                order_id: row.try_get("order_id")?,
                school_id: row.try_get("school_id")?,
                trustee_id: row.try_get("trustee_id")?,
                student: StudentInfo {
                    name: row.try_get("student_name")?,
                    id: row.try_get("student_id")?,
                    email: row.try_get("student_email")?,
                },
                gateway_name: row.try_get("gateway_name")?,
                collect_id: row.try_get("collect_id")?,
                gateway_sign: row.try_get("gateway_sign")?,
                payment_url: row.try_get("payment_url")?,
                created_at: row.try_get("created_at")?,
                updated_at: row.try_get("updated_at")?,
            })
        }
    }

    impl FromRow<'_, SqliteRow> for StatusRecord {
        fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
            Ok(Self {
                id: row.try_get("id")?,
                order_pk: row.try_get("order_pk")?,
                order_amount: row.try_get("order_amount")?,
                transaction_amount: row.try_get("transaction_amount")?,
                payment_mode: row.try_get("payment_mode")?,
                payment_details: row.try_get("payment_details")?,
                bank_reference: row.try_get("bank_reference")?,
                payment_message: row.try_get("payment_message")?,
                status: row.try_get("status")?,
                error_message: row.try_get("error_message")?,
                payment_time: row.try_get("payment_time")?,
                gateway_status: row.try_get("gateway_status")?,
                gateway_response: row.try_get("gateway_response")?,
                last_status_check: row.try_get("last_status_check")?,
                last_event_time: row.try_get("last_event_time")?,
                created_at: row.try_get("created_at")?,
                updated_at: row.try_get("updated_at")?,
            })
        }
    }

    impl FromRow<'_, SqliteRow> for WebhookLog {
        fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
            Ok(Self {
                id: row.try_get("id")?,
                payload: row.try_get("payload")?,
                reported_status: row.try_get("reported_status")?,
                order_token: row.try_get("order_token")?,
                processed: row.try_get("processed")?,
                processing_error: row.try_get("processing_error")?,
                created_at: row.try_get("created_at")?,
            })
        }
    }
}
