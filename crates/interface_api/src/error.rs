//! API error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use domain_billing::BillingError;

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// A retryable failure that outlasted the retry policy
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.clone()),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, "unavailable", msg.clone()),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg.clone()),
            ApiError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error", msg.clone()),
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
            details: None,
        };

        (status, Json(body)).into_response()
    }
}

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::InvalidAmount(_)
            | BillingError::InvalidVatPercentage(_)
            | BillingError::CaseMismatch { .. } => ApiError::Validation(err.to_string()),
            BillingError::InvalidInvoiceType(_) | BillingError::Money(_) => {
                ApiError::BadRequest(err.to_string())
            }
            BillingError::NotFound(_) | BillingError::InvoiceNotFound(_) => {
                ApiError::NotFound(err.to_string())
            }
            BillingError::ConcurrencyConflict(_) => ApiError::Conflict(err.to_string()),
            BillingError::SequencingUnavailable(_) | BillingError::StatusRecomputeFailed { .. } => {
                ApiError::Unavailable(err.to_string())
            }
            BillingError::Store(ref port) if port.is_transient() => {
                ApiError::Unavailable(err.to_string())
            }
            BillingError::Store(_) => {
                error!(error = %err, "store failure");
                ApiError::Internal(err.to_string())
            }
        }
    }
}
