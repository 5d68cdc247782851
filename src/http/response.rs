//! Response envelope and the HTTP-facing error type.
//!
//! # Responsibilities
//! - `{"message": ...}` body for every status and error response
//! - Map error categories to status codes
//! - Keep internal error detail in the server log only

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::query::FilterError;
use crate::security::credentials::CredentialError;
use crate::store::StoreError;

/// Generic text for anything the caller should not see the detail of.
pub const INTERNAL_MESSAGE: &str = "internal server error. check logs for more details";

/// JSON envelope for status and error text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub message: String,
}

/// Build a `{"message": ...}` response with `status`.
pub fn message(status: StatusCode, text: impl Into<String>) -> Response {
    (status, Json(Message { message: text.into() })).into_response()
}

/// Errors surfaced to API callers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Bad body or filter. Detail is safe to disclose.
    #[error("{0}")]
    MalformedInput(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// Missing or invalid credentials.
    #[error("unauthorized")]
    Unauthenticated,

    /// Valid identity without the required permission.
    #[error("unauthorized")]
    Unauthorized,

    #[error("too many requests")]
    RateLimited,

    /// Store, codec or unexpected failures. Logged, never disclosed.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MalformedInput(_) | ApiError::NotFound(_) | ApiError::Conflict(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Unauthenticated | ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "request failed with internal error");
                message(status, INTERNAL_MESSAGE)
            }
            _ => message(status, self.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(error = %rejection, "failed to decode request body");
        ApiError::MalformedInput("invalid json".to_string())
    }
}

impl From<FilterError> for ApiError {
    fn from(err: FilterError) -> Self {
        ApiError::MalformedInput(format!("invalid filter: {}", err))
    }
}

impl From<CredentialError> for ApiError {
    fn from(err: CredentialError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => ApiError::NotFound(format!("{} not found", what)),
            StoreError::Filter(e) => e.into(),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;
