//! Protocol error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use std::fmt;

use devreg_core::Error;

/// Base URI of NGSI-LD problem types.
pub const ERROR_TYPE_BASE: &str = "https://uri.etsi.org/ngsi-ld/errors/";

/// NGSI-LD error response with its HTTP status code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// NGSI-LD error code, e.g. `BadRequestData`.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    #[serde(skip)]
    pub status: StatusCode,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>, status: StatusCode) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            status,
        }
    }

    /// Bad request (400).
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BadRequestData", message, StatusCode::BAD_REQUEST)
    }

    /// Not found (404).
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("ResourceNotFound", message, StatusCode::NOT_FOUND)
    }

    /// Internal server error (500).
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("InternalError", message, StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn error_type(&self) -> String {
        format!("{}{}", ERROR_TYPE_BASE, self.code)
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let status = self.status;
        let body = serde_json::json!({
            "type": self.error_type(),
            "title": self.code,
            "detail": self.message,
        });
        (status, axum::Json(body)).into_response()
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ErrorResponse {}

impl From<Error> for ErrorResponse {
    fn from(e: Error) -> Self {
        match e {
            Error::Validation(_)
            | Error::Parse(_)
            | Error::UnsupportedProperty { .. }
            | Error::UnsupportedType(_) => Self::bad_request(e.to_string()),
            Error::NotFound { .. } => Self::not_found(e.to_string()),
            Error::Integrity(_) | Error::Persistence(_) => {
                tracing::error!(error = %e, "Request failed with server error");
                Self::internal(e.to_string())
            }
        }
    }
}

impl From<tokio::task::JoinError> for ErrorResponse {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::internal(format!("Blocking task failed: {}", e))
    }
}

/// Result type alias for API handlers.
pub type ApiResult<T> = Result<T, ErrorResponse>;
