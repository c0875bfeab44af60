//! Route definitions for the weather gateway

use axum::{routing::get, Router};

use crate::{handlers, AppState};

/// Public API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::readyz))
        .route("/v1/onecall", get(handlers::get_onecall))
}

/// Routes only mounted in diagnostic mode
pub fn debug_routes() -> Router<AppState> {
    Router::new().route("/debug/upstream/onecall", get(handlers::debug_upstream_onecall))
}
