//! Wire formats for the HTTP boundary.
//!
//! Inbound gateway payloads are deliberately lenient: every field is optional and known spelling
//! variants are accepted via aliases. Whatever can be extracted is merged into the status record;
//! the raw payload is preserved verbatim in the audit log either way.
use chrono::{DateTime, Utc};
use school_payment_engine::db_types::{EventSource, StatusEvent, StatusUpdate, StudentInfo};
use serde::{de::DeserializeOwned, Deserialize, Deserializer};
use serde_json::Value;
use sps_common::Money;

/// Field-level leniency for gateway payloads: an ill-typed value reads as absent instead of
/// failing the whole payload, so a bad `payment_time` cannot swallow a perfectly good `order_id`.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

//--------------------------------------  CreatePaymentRequest  ------------------------------------------------------
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePaymentRequest {
    pub amount: Money,
    pub student_info: StudentInfo,
    /// Overrides the school id from the server configuration when present.
    pub school_id: Option<String>,
    pub trustee_id: Option<String>,
}

//--------------------------------------    WebhookPayload      ------------------------------------------------------
/// The POST body the gateway sends when a payment attempt concludes.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    #[serde(default, deserialize_with = "lenient")]
    pub status: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    pub order_info: Option<OrderInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderInfo {
    #[serde(default, deserialize_with = "lenient")]
    pub order_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub order_amount: Option<Money>,
    #[serde(default, deserialize_with = "lenient")]
    pub transaction_amount: Option<Money>,
    #[serde(default, deserialize_with = "lenient")]
    pub gateway: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub bank_reference: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub payment_mode: Option<String>,
    #[serde(default, deserialize_with = "lenient", alias = "payemnt_details")]
    pub payment_details: Option<String>,
    #[serde(default, deserialize_with = "lenient", alias = "Payment_message")]
    pub payment_message: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub payment_time: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient")]
    pub error_message: Option<String>,
}

impl WebhookPayload {
    /// Converts the payload into a source-agnostic status event. `raw` is the payload exactly as
    /// it arrived, destined for the audit log.
    pub fn into_event(self, raw: Value) -> StatusEvent {
        let info = self.order_info;
        // The guard orders receipt times, so a delayed rich webhook is not discarded just
        // because its payment_time predates an earlier sparse callback.
        let mut update = StatusUpdate::at(Utc::now());
        let mut order_token = None;
        let mut reported_status = None;
        if let Some(info) = info {
            order_token = info.order_id.filter(|t| !t.is_empty());
            reported_status = info.status;
            if let Some(amount) = info.order_amount {
                update = update.with_order_amount(amount);
            }
            if let Some(amount) = info.transaction_amount {
                update = update.with_transaction_amount(amount);
            }
            if let Some(mode) = info.payment_mode {
                update = update.with_payment_mode(mode);
            }
            if let Some(details) = info.payment_details {
                update = update.with_payment_details(details);
            }
            if let Some(bank_reference) = info.bank_reference {
                update = update.with_bank_reference(bank_reference);
            }
            if let Some(message) = info.payment_message {
                update = update.with_payment_message(message);
            }
            if let Some(error) = info.error_message {
                update = update.with_error_message(error);
            }
            if let Some(time) = info.payment_time {
                update = update.with_payment_time(time);
            }
        }
        StatusEvent { source: EventSource::WebhookPost, order_token, reported_status, raw_payload: raw, update }
    }
}

//--------------------------------------    CallbackParams      ------------------------------------------------------
/// The query string of the GET redirect the gateway issues after the payer leaves the payment
/// page. Far sparser than the POST webhook: just the collect request id and a status.
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackParams {
    #[serde(rename = "EdvironCollectRequestId", alias = "collect_request_id")]
    pub collect_request_id: Option<String>,
    pub status: Option<String>,
    /// The gateway's explanation when the payment did not go through.
    pub reason: Option<String>,
}

impl CallbackParams {
    pub fn into_event(self) -> StatusEvent {
        let raw_payload = serde_json::json!({
            "EdvironCollectRequestId": self.collect_request_id,
            "status": self.status,
            "reason": self.reason,
        });
        let status_label = self.status.as_deref().unwrap_or("NA");
        let mut update = StatusUpdate::at(Utc::now())
            .with_payment_message(format!("Updated via GET callback with status: {status_label}"));
        if let Some(reason) = self.reason {
            update = update.with_error_message(reason);
        }
        StatusEvent {
            source: EventSource::CallbackGet,
            order_token: self.collect_request_id.filter(|t| !t.is_empty()),
            reported_status: self.status,
            raw_payload,
            update,
        }
    }
}

//--------------------------------------   TransactionParams    ------------------------------------------------------
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<String>,
    pub school_id: Option<String>,
}
