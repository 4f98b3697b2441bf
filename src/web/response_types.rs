//! # Web API Response Types
//!
//! Error responses for the HTTP surface. Pipeline errors convert into
//! [`ApiError`], which renders as a status code plus a JSON body of the form
//! `{"error": {"code": "...", "message": "..."}}`.

use crate::benchmark::BenchmarkError;
use crate::error::TriageError;
use crate::storage::StorageError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Web API specific errors with HTTP status code mappings
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Resource not found: {message}")]
    NotFound { message: String },

    #[error("Invalid request: {message}")]
    BadRequest { message: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Upstream service failed: {message}")]
    BadGateway { message: String },

    #[error("Internal server error: {message}")]
    Internal { message: String },
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::BadGateway { .. } => StatusCode::BAD_GATEWAY,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (error_code, message) = match &self {
            ApiError::NotFound { message } => ("NOT_FOUND", message.as_str()),
            ApiError::BadRequest { message } => ("BAD_REQUEST", message.as_str()),
            ApiError::Conflict { message } => ("CONFLICT", message.as_str()),
            ApiError::BadGateway { message } => ("BAD_GATEWAY", message.as_str()),
            ApiError::Internal { message } => ("INTERNAL_ERROR", message.as_str()),
        };

        let error_response = json!({
            "error": {
                "code": error_code,
                "message": message
            }
        });

        (self.status_code(), Json(error_response)).into_response()
    }
}

/// Convert pipeline errors to API errors
impl From<TriageError> for ApiError {
    fn from(err: TriageError) -> Self {
        let message = err.to_string();
        match err {
            TriageError::NotFound(_) | TriageError::Storage(StorageError::NotFound { .. }) => {
                ApiError::NotFound { message }
            }
            TriageError::Validation(_) => ApiError::BadRequest { message },
            TriageError::Benchmark(BenchmarkError::AlreadyRunning) => ApiError::Conflict { message },
            TriageError::Benchmark(BenchmarkError::InvalidBounds(_)) => {
                ApiError::BadRequest { message }
            }
            TriageError::Benchmark(BenchmarkError::Target(_)) | TriageError::TaskQueue(_) => {
                ApiError::BadGateway { message }
            }
            TriageError::Storage(_)
            | TriageError::Configuration(_)
            | TriageError::Serialization(_)
            | TriageError::Internal(_) => ApiError::Internal { message },
        }
    }
}

/// Result type alias for web API operations
pub type ApiResult<T> = Result<T, ApiError>;
