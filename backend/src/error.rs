//! Error handling for the weather gateway
//!
//! Every failure a caller can see maps to one `error_code` and HTTP status.
//! Error bodies always carry the request id.

use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use shared::ValidationErrors;

use crate::external::UpstreamError;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("Rate limited, retry after {retry_after_s}s")]
    RateLimited { retry_after_s: i64 },

    // Upstream errors. `debug` is only filled in diagnostic mode.
    #[error("Upstream denied access")]
    UpstreamAuth { debug: Option<Value> },

    #[error("Upstream rate limit exceeded")]
    UpstreamRateLimit { debug: Option<Value> },

    #[error("Upstream unavailable")]
    Upstream { debug: Option<Value> },

    #[error("Internal server error: {message}")]
    Internal {
        message: String,
        debug: Option<Value>,
    },
}

impl AppError {
    /// Classify an upstream failure that no cache entry could absorb
    pub fn from_upstream(error: &UpstreamError, diagnostics: bool) -> Self {
        let debug = diagnostics.then(|| {
            json!({
                "status": error.status(),
                "body": error.body_snippet(),
                "upstream_ms": error.upstream_ms(),
            })
        });

        match error {
            UpstreamError::ClientError { status: 401 | 403, .. } => AppError::UpstreamAuth { debug },
            UpstreamError::ClientError { status: 429, .. } => AppError::UpstreamRateLimit { debug },
            _ => AppError::Upstream { debug },
        }
    }

    /// Internal failure; `message` reaches the caller only in diagnostic mode
    pub fn internal(message: impl Into<String>, diagnostics: bool) -> Self {
        let message = message.into();
        let debug = diagnostics.then(|| json!({ "message": message }));
        AppError::Internal { message, debug }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::UpstreamAuth { .. }
            | AppError::UpstreamRateLimit { .. }
            | AppError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::RateLimited { .. } => "RATE_LIMITED",
            AppError::UpstreamAuth { .. } => "UPSTREAM_AUTH_ERROR",
            AppError::UpstreamRateLimit { .. } => "UPSTREAM_RATE_LIMIT",
            AppError::Upstream { .. } => "UPSTREAM_ERROR",
            AppError::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    /// Caller-facing message
    pub fn message(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "Validation failed",
            AppError::RateLimited { .. } => "Too many requests",
            AppError::UpstreamAuth { .. } => {
                "OpenWeather One Call API access denied (check subscription / product activation)"
            }
            AppError::UpstreamRateLimit { .. } => "OpenWeather One Call API rate limit exceeded",
            AppError::Upstream { .. } => "Upstream service unavailable",
            AppError::Internal { .. } => "Internal server error",
        }
    }

    fn debug(&self) -> Option<&Value> {
        match self {
            AppError::UpstreamAuth { debug }
            | AppError::UpstreamRateLimit { debug }
            | AppError::Upstream { debug }
            | AppError::Internal { debug, .. } => debug.as_ref(),
            AppError::Validation(_) | AppError::RateLimited { .. } => None,
        }
    }
}

/// Error response structure
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error_code: &'static str,
    pub message: &'static str,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ValidationErrors>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_s: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<Value>,
}

/// An [`AppError`] bound to the request it failed
#[derive(Debug)]
pub struct ApiError {
    pub request_id: String,
    pub error: AppError,
}

impl ApiError {
    pub fn new(request_id: impl Into<String>, error: AppError) -> Self {
        Self {
            request_id: request_id.into(),
            error,
        }
    }

    pub fn body(&self) -> ErrorResponse {
        let details = match &self.error {
            AppError::Validation(errors) => Some(errors.clone()),
            _ => None,
        };
        let retry_after_s = match &self.error {
            AppError::RateLimited { retry_after_s } => Some(*retry_after_s),
            _ => None,
        };

        ErrorResponse {
            error_code: self.error.error_code(),
            message: self.error.message(),
            request_id: self.request_id.clone(),
            details,
            retry_after_s,
            debug: self.error.debug().cloned(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.error.status_code();

        if status.is_server_error() {
            tracing::error!(request_id = %self.request_id, error = %self.error, "Request failed");
        } else {
            tracing::debug!(request_id = %self.request_id, error = %self.error, "Request rejected");
        }

        let mut response = (status, Json(self.body())).into_response();
        if let AppError::RateLimited { retry_after_s } = self.error {
            if let Ok(value) = HeaderValue::from_str(&retry_after_s.to_string()) {
                response.headers_mut().insert(RETRY_AFTER, value);
            }
        }
        response
    }
}

/// Result type alias for handlers
pub type ApiResult<T> = Result<T, ApiError>;
