//! The Edviron collect-request client.
//!
//! Two calls matter: creating a collect request (which returns the hosted payment page url) and
//! polling a collect request's status. Both carry a JWT signed with the merchant's pg key, in
//! addition to the bearer API key on the connection.
use jsonwebtoken::{encode, EncodingKey, Header};
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION},
    Client,
    StatusCode,
};
use school_payment_engine::{db_types::CollectId, PollResult};
use serde::Serialize;
use serde_json::Value;
use sps_common::{Money, Secret};
use thiserror::Error;

use crate::config::GatewayConfig;

#[derive(Debug, Error)]
pub enum EdvironApiError {
    #[error("Could not initialize the gateway client. {0}")]
    Initialization(String),
    #[error("Could not sign the gateway request. {0}")]
    Signing(String),
    #[error("The gateway could not be reached. {0}")]
    Unreachable(String),
    #[error("The gateway rejected the request. {status}: {message}")]
    RequestFailed { status: StatusCode, message: String },
    #[error("Unexpected response from the gateway. {0}")]
    InvalidResponse(String),
}

/// The gateway's answer to a successful collect-request creation.
#[derive(Debug, Clone)]
pub struct CollectRequest {
    pub collect_id: CollectId,
    pub payment_url: String,
    pub sign: Option<String>,
}

#[derive(Serialize)]
struct CreateRequestClaims<'a> {
    school_id: &'a str,
    amount: String,
    callback_url: &'a str,
}

#[derive(Serialize)]
struct StatusCheckClaims<'a> {
    school_id: &'a str,
    collect_request_id: &'a str,
}

#[derive(Clone)]
pub struct EdvironApi {
    base_url: String,
    school_id: String,
    pg_key: Secret<String>,
    callback_url: String,
    client: Client,
}

impl EdvironApi {
    pub fn new(config: &GatewayConfig) -> Result<Self, EdvironApiError> {
        let mut headers = HeaderMap::new();
        let bearer = format!("Bearer {}", config.api_key.reveal());
        let mut auth_value =
            HeaderValue::from_str(&bearer).map_err(|e| EdvironApiError::Initialization(e.to_string()))?;
        auth_value.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth_value);
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| EdvironApiError::Initialization(e.to_string()))?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            school_id: config.school_id.clone(),
            pg_key: config.pg_key.clone(),
            callback_url: config.callback_url.clone(),
            client,
        })
    }

    fn sign<T: Serialize>(&self, claims: &T) -> Result<String, EdvironApiError> {
        let key = EncodingKey::from_secret(self.pg_key.reveal().as_bytes());
        encode(&Header::default(), claims, &key).map_err(|e| EdvironApiError::Signing(e.to_string()))
    }

    /// Asks the gateway to create a collect request for the given amount.
    ///
    /// A 2xx response missing either the collect request id or the payment page url is treated as
    /// [`EdvironApiError::InvalidResponse`]; transport failures and non-2xx statuses are reported
    /// separately so the caller can leave the order pending.
    pub async fn create_collect_request(&self, amount: Money) -> Result<CollectRequest, EdvironApiError> {
        let sign = self.sign(&CreateRequestClaims {
            school_id: &self.school_id,
            amount: amount.to_rupee_string(),
            callback_url: &self.callback_url,
        })?;
        let url = format!("{}/create-collect-request", self.base_url);
        let body = serde_json::json!({
            "school_id": self.school_id,
            "amount": amount.to_rupee_string(),
            "callback_url": self.callback_url,
            "sign": sign,
        });
        trace!("💻️ POST {url} for {amount}");
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| EdvironApiError::Unreachable(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!("💻️ Gateway refused the collect request. {status}: {message}");
            return Err(EdvironApiError::RequestFailed { status, message });
        }
        let payload: Value =
            response.json().await.map_err(|e| EdvironApiError::InvalidResponse(e.to_string()))?;
        let collect_id = payload
            .get("collect_request_id")
            .and_then(Value::as_str)
            .map(CollectId::from)
            .ok_or_else(|| EdvironApiError::InvalidResponse("collect_request_id is missing".to_string()))?;
        // The field name casing has been observed to vary between gateway versions.
        let payment_url = payload
            .get("collect_request_url")
            .or_else(|| payload.get("Collect_request_url"))
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| EdvironApiError::InvalidResponse("collect_request_url is missing".to_string()))?;
        let sign = payload.get("sign").and_then(Value::as_str).map(String::from);
        debug!("💻️ Gateway accepted the collect request as {collect_id}");
        Ok(CollectRequest { collect_id, payment_url, sign })
    }

    /// Polls the gateway for the current status of a collect request.
    ///
    /// The raw status string and amount are returned unmapped; normalization happens in the
    /// reconciliation engine.
    pub async fn check_collect_status(&self, collect_id: &CollectId) -> Result<PollResult, EdvironApiError> {
        let sign =
            self.sign(&StatusCheckClaims { school_id: &self.school_id, collect_request_id: collect_id.as_str() })?;
        let url = format!("{}/collect-request/{}", self.base_url, collect_id);
        trace!("💻️ GET {url}");
        let response = self
            .client
            .get(&url)
            .query(&[("school_id", self.school_id.as_str()), ("sign", sign.as_str())])
            .send()
            .await
            .map_err(|e| EdvironApiError::Unreachable(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!("💻️ Gateway refused the status check for {collect_id}. {status}: {message}");
            return Err(EdvironApiError::RequestFailed { status, message });
        }
        let payload: Value =
            response.json().await.map_err(|e| EdvironApiError::InvalidResponse(e.to_string()))?;
        let reported = payload.get("status").and_then(Value::as_str).map(String::from);
        let amount =
            payload.get("amount").and_then(Value::as_f64).and_then(|rupees| Money::from_rupees(rupees).ok());
        debug!("💻️ Gateway reports collect request {collect_id} as {:?}", reported.as_deref().unwrap_or("NA"));
        Ok(PollResult { status: reported, amount, raw: payload })
    }
}

#[cfg(test)]
mod test {
    use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
    use serde::Deserialize;

    use super::*;

    fn test_api() -> EdvironApi {
        let config = GatewayConfig {
            base_url: "https://gateway.test/erp/".to_string(),
            school_id: "school-1".to_string(),
            trustee_id: "trustee-1".to_string(),
            pg_key: Secret::new("test-pg-key".to_string()),
            api_key: Secret::new("test-api-key".to_string()),
            callback_url: "https://backend.test/api/payment-callback".to_string(),
            timeout: std::time::Duration::from_secs(5),
        };
        EdvironApi::new(&config).unwrap()
    }

    #[test]
    fn base_url_is_normalized() {
        let api = test_api();
        assert_eq!(api.base_url, "https://gateway.test/erp");
    }

    #[test]
    fn request_signatures_verify_with_the_pg_key() {
        #[derive(Deserialize)]
        struct Claims {
            school_id: String,
            amount: String,
            callback_url: String,
        }
        let api = test_api();
        let token = api
            .sign(&CreateRequestClaims {
                school_id: "school-1",
                amount: "500".to_string(),
                callback_url: "https://backend.test/api/payment-callback",
            })
            .unwrap();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims.clear();
        validation.validate_exp = false;
        let decoded =
            decode::<Claims>(&token, &DecodingKey::from_secret(b"test-pg-key"), &validation).unwrap();
        assert_eq!(decoded.claims.school_id, "school-1");
        assert_eq!(decoded.claims.amount, "500");
        assert_eq!(decoded.claims.callback_url, "https://backend.test/api/payment-callback");
    }
}
