//! Caller identity used for per-caller rate limits

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::request::Parts,
};
use std::convert::Infallible;
use std::net::SocketAddr;

/// Header a trusted client sets to identify itself
pub const X_CALLER_ID: &str = "x-caller-id";

/// `X-Caller-Id`, else the peer IP, else `"unknown"`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallerId(pub String);

#[axum::async_trait]
impl<S> FromRequestParts<S> for CallerId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(X_CALLER_ID)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty());

        if let Some(id) = header {
            return Ok(CallerId(id.to_string()));
        }

        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());

        Ok(CallerId(peer.unwrap_or_else(|| "unknown".to_string())))
    }
}
