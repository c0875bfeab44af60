//! External API integrations

pub mod openweather;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use shared::GeoQuery;

pub use openweather::OpenWeatherClient;

/// Marker substituted for the provider credential in every outgoing string
pub const REDACTED: &str = "***";

/// A successful upstream call
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamSuccess {
    /// Decoded provider payload, always a JSON object
    pub payload: Value,
    /// Latency of the attempt that produced the payload
    pub upstream_ms: u64,
}

/// Upstream failures. All text fields are already redacted.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UpstreamError {
    #[error("Upstream transport error: {message}")]
    Transport { message: String },

    #[error("Upstream returned HTTP {status}: {message}")]
    ServerError {
        status: u16,
        message: String,
        body_snippet: String,
        upstream_ms: u64,
    },

    #[error("Upstream rejected request with HTTP {status}: {message}")]
    ClientError {
        status: u16,
        message: String,
        body_snippet: String,
        upstream_ms: u64,
    },

    #[error("Upstream response invalid: {message}")]
    InvalidPayload {
        message: String,
        body_snippet: String,
        upstream_ms: u64,
    },
}

impl UpstreamError {
    /// HTTP status of the final attempt, if a response was received
    pub fn status(&self) -> Option<u16> {
        match self {
            UpstreamError::ServerError { status, .. } | UpstreamError::ClientError { status, .. } => {
                Some(*status)
            }
            UpstreamError::InvalidPayload { .. } => Some(200),
            UpstreamError::Transport { .. } => None,
        }
    }

    pub fn body_snippet(&self) -> &str {
        match self {
            UpstreamError::ServerError { body_snippet, .. }
            | UpstreamError::ClientError { body_snippet, .. }
            | UpstreamError::InvalidPayload { body_snippet, .. } => body_snippet,
            UpstreamError::Transport { .. } => "",
        }
    }

    pub fn upstream_ms(&self) -> Option<u64> {
        match self {
            UpstreamError::ServerError { upstream_ms, .. }
            | UpstreamError::ClientError { upstream_ms, .. }
            | UpstreamError::InvalidPayload { upstream_ms, .. } => Some(*upstream_ms),
            UpstreamError::Transport { .. } => None,
        }
    }
}

/// Source of One Call weather payloads
#[async_trait]
pub trait OneCallProvider: Send + Sync {
    /// False when no credential is configured; fetching would be pointless
    fn is_configured(&self) -> bool;

    /// Request URL with the credential replaced by [`REDACTED`]
    fn sanitized_url(&self, query: &GeoQuery) -> String;

    async fn fetch_one_call(&self, query: &GeoQuery) -> Result<UpstreamSuccess, UpstreamError>;
}
