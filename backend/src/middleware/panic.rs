//! Converts handler panics into `INTERNAL_ERROR` responses

use axum::response::{IntoResponse, Response};
use std::any::Any;

use super::request_id::{current_request_id, RequestId};
use crate::error::{ApiError, AppError};

/// Response for a panic caught while handling a request.
///
/// Runs inside the request id scope, so the body carries the same id as the
/// `X-Request-Id` header. The panic message only reaches the caller in
/// diagnostic mode.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>, diagnostics: bool) -> Response {
    let request_id = current_request_id().unwrap_or_else(RequestId::generate);
    let detail = panic_message(panic.as_ref());

    tracing::error!(request_id = %request_id.as_str(), panic = %detail, "Handler panicked");

    ApiError::new(
        request_id.0,
        AppError::internal(format!("Unhandled panic: {}", detail), diagnostics),
    )
    .into_response()
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
