//! HTTP handlers for weather endpoints

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use serde::Serialize;

use shared::{OneCallParams, ValidationErrors};

use crate::error::{ApiError, ApiResult, AppError};
use crate::middleware::{CallerId, RequestId};
use crate::services::OneCallResponse;
use crate::AppState;

/// One Call weather for a location
pub async fn get_onecall(
    State(state): State<AppState>,
    request_id: RequestId,
    CallerId(caller_id): CallerId,
    params: Result<Query<OneCallParams>, QueryRejection>,
) -> ApiResult<Json<OneCallResponse>> {
    let params = query_params(&request_id, params)?;
    let response = state
        .weather
        .onecall(&params, &caller_id, request_id.as_str())
        .await
        .map_err(|e| ApiError::new(request_id.as_str(), e))?;
    Ok(Json(response))
}

/// Diagnostic view of the upstream request a query would produce
#[derive(Debug, Serialize)]
pub struct UpstreamDebugResponse {
    pub request_id: String,
    pub upstream_url: String,
    pub cache_key: String,
}

/// Show the sanitized upstream URL and cache key without calling upstream
pub async fn debug_upstream_onecall(
    State(state): State<AppState>,
    request_id: RequestId,
    params: Result<Query<OneCallParams>, QueryRejection>,
) -> ApiResult<Json<UpstreamDebugResponse>> {
    let params = query_params(&request_id, params)?;
    let preview = state
        .weather
        .preview(&params)
        .map_err(|e| ApiError::new(request_id.as_str(), e))?;

    Ok(Json(UpstreamDebugResponse {
        request_id: request_id.0,
        upstream_url: preview.upstream_url,
        cache_key: preview.cache_key,
    }))
}

/// Unparseable query strings are reported like any other invalid input
fn query_params(
    request_id: &RequestId,
    params: Result<Query<OneCallParams>, QueryRejection>,
) -> ApiResult<OneCallParams> {
    params.map(|Query(params)| params).map_err(|rejection| {
        let mut errors = ValidationErrors::new();
        errors.add("query", rejection.body_text());
        ApiError::new(request_id.as_str(), AppError::Validation(errors))
    })
}
