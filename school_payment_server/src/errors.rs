use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use school_payment_engine::{traits::PaymentStoreError, ReconciliationError};
use thiserror::Error;

use crate::integrations::EdvironApiError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("The order cannot be processed in its current state. {0}")]
    OrderStateError(String),
    #[error("The payment gateway could not be reached. {0}")]
    GatewayUnavailable(String),
    #[error("The payment gateway returned an unusable response. {0}")]
    GatewayResponseInvalid(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::OrderStateError(_) => StatusCode::CONFLICT,
            Self::GatewayUnavailable(_) => StatusCode::BAD_GATEWAY,
            Self::GatewayResponseInvalid(_) => StatusCode::BAD_GATEWAY,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "success": false, "message": self.to_string() }).to_string())
    }
}

impl From<ReconciliationError> for ServerError {
    fn from(e: ReconciliationError) -> Self {
        match e {
            ReconciliationError::OrderNotFound(token) => Self::NoRecordFound(format!("Order {token}")),
            ReconciliationError::InvalidEvent(reason) => Self::InvalidRequestBody(reason),
            ReconciliationError::StoreError(e) => e.into(),
        }
    }
}

impl From<PaymentStoreError> for ServerError {
    fn from(e: PaymentStoreError) -> Self {
        match e {
            PaymentStoreError::OrderNotFound(id) => Self::NoRecordFound(format!("Order {id}")),
            PaymentStoreError::OrderAlreadyExists(_) |
            PaymentStoreError::CollectIdAlreadySet(_) |
            PaymentStoreError::CollectIdConflict(_) => Self::OrderStateError(e.to_string()),
            PaymentStoreError::DatabaseError(_) |
            PaymentStoreError::MigrationError(_) |
            PaymentStoreError::WebhookLogNotFound(_) => Self::BackendError(e.to_string()),
        }
    }
}

impl From<EdvironApiError> for ServerError {
    fn from(e: EdvironApiError) -> Self {
        match e {
            EdvironApiError::Initialization(_) => Self::ConfigurationError(e.to_string()),
            EdvironApiError::Signing(_) => Self::ConfigurationError(e.to_string()),
            EdvironApiError::Unreachable(_) => Self::GatewayUnavailable(e.to_string()),
            EdvironApiError::RequestFailed { .. } => Self::GatewayUnavailable(e.to_string()),
            EdvironApiError::InvalidResponse(_) => Self::GatewayResponseInvalid(e.to_string()),
        }
    }
}
