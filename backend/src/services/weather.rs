//! Weather request orchestration
//!
//! A request moves through validate, rate limit, cache lookup and then
//! either serves the fresh entry or goes upstream. Upstream failures fall
//! back to a stale entry when one is still within the stale window, and
//! only surface as errors when nothing usable is cached.
//!
//! The branching itself lives in [`plan`] and [`settle`], which are pure
//! and can be exercised without a store or a network.

use serde::Serialize;
use std::sync::Arc;

use shared::{validate_onecall_params, GeoQuery, Location, NormalizedWeather, OneCallParams};

use super::cache::{CacheEntry, CachePolicy, ResultCache};
use super::normalizer::{apply_raw_preference, normalize};
use super::rate_limiter::RateLimiter;
use crate::error::AppError;
use crate::external::{OneCallProvider, UpstreamError, UpstreamSuccess};

/// Response metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub cache_hit: bool,
    pub cache_age_s: Option<i64>,
    pub upstream_ms: Option<u64>,
    pub stale: bool,
}

/// Successful onecall response body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OneCallResponse {
    pub meta: ResponseMeta,
    pub location: Location,
    #[serde(flatten)]
    pub weather: NormalizedWeather,
}

/// Where a request would be sent, without sending it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpstreamPreview {
    pub upstream_url: String,
    pub cache_key: String,
}

/// What to do after the cache lookup
#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
    ServeFresh(CacheEntry),
    /// Go upstream, keeping whatever was cached as a fallback
    Refetch { fallback: Option<CacheEntry> },
}

/// How an upstream attempt resolved
#[derive(Debug, Clone, PartialEq)]
pub enum Settlement {
    Fetched(UpstreamSuccess),
    Stale(CacheEntry),
    Failed(UpstreamError),
}

pub fn plan(cached: Option<CacheEntry>, policy: &CachePolicy, now: i64) -> Plan {
    match cached {
        Some(entry) if policy.is_fresh(entry.cached_at, now) => Plan::ServeFresh(entry),
        fallback => Plan::Refetch { fallback },
    }
}

pub fn settle(
    result: Result<UpstreamSuccess, UpstreamError>,
    fallback: Option<CacheEntry>,
    policy: &CachePolicy,
    now: i64,
) -> Settlement {
    match (result, fallback) {
        (Ok(success), _) => Settlement::Fetched(success),
        (Err(_), Some(entry)) if policy.is_within_max_stale(entry.cached_at, now) => {
            Settlement::Stale(entry)
        }
        (Err(error), _) => Settlement::Failed(error),
    }
}

/// Read-through weather gateway
pub struct WeatherService {
    cache: ResultCache,
    upstream: Arc<dyn OneCallProvider>,
    rate_limiter: RateLimiter,
    diagnostics: bool,
}

impl WeatherService {
    pub fn new(
        cache: ResultCache,
        upstream: Arc<dyn OneCallProvider>,
        rate_limiter: RateLimiter,
        diagnostics: bool,
    ) -> Self {
        Self {
            cache,
            upstream,
            rate_limiter,
            diagnostics,
        }
    }

    pub fn diagnostics_enabled(&self) -> bool {
        self.diagnostics
    }

    /// Serve a onecall request
    pub async fn onecall(
        &self,
        params: &OneCallParams,
        caller_id: &str,
        request_id: &str,
    ) -> Result<OneCallResponse, AppError> {
        let query = validate_onecall_params(params).map_err(AppError::Validation)?;

        let decision = self.rate_limiter.check(caller_id).await;
        if !decision.allowed {
            return Err(AppError::RateLimited {
                retry_after_s: decision.retry_after_seconds,
            });
        }

        let cache_key = self.cache.key_for(&query);
        let cached = self.cache.get(&cache_key).await;
        let policy = self.cache.policy();

        let fallback = match plan(cached, &policy, self.cache.now()) {
            Plan::ServeFresh(entry) => {
                tracing::debug!(request_id, cache_key = %cache_key, "Serving fresh cache entry");
                return Ok(self.from_cache(request_id, &query, entry, false));
            }
            Plan::Refetch { fallback } => fallback,
        };

        if !self.upstream.is_configured() {
            tracing::error!(request_id, "Upstream API key is not configured");
            return Err(AppError::internal(
                "Upstream API key is not configured",
                self.diagnostics,
            ));
        }

        tracing::debug!(
            request_id,
            cache_key = %cache_key,
            has_fallback = fallback.is_some(),
            "Cache miss, calling upstream"
        );
        let result = self.upstream.fetch_one_call(&query).await;

        match settle(result, fallback, &policy, self.cache.now()) {
            Settlement::Fetched(success) => {
                let normalized = normalize(&success.payload, true);
                if let Err(e) = self.cache.set(&cache_key, &normalized).await {
                    tracing::warn!(request_id, cache_key = %cache_key, error = %e, "Cache write failed");
                }

                Ok(OneCallResponse {
                    meta: ResponseMeta {
                        request_id: request_id.to_string(),
                        cache_hit: false,
                        cache_age_s: None,
                        upstream_ms: Some(success.upstream_ms),
                        stale: false,
                    },
                    location: Location::from(&query),
                    weather: apply_raw_preference(normalized, query.include_raw),
                })
            }
            Settlement::Stale(entry) => {
                tracing::info!(
                    request_id,
                    cache_key = %cache_key,
                    age_s = self.cache.age_seconds(entry.cached_at),
                    "Upstream failed, serving stale cache entry"
                );
                Ok(self.from_cache(request_id, &query, entry, true))
            }
            Settlement::Failed(error) => {
                tracing::warn!(
                    request_id,
                    status = ?error.status(),
                    error = %error,
                    "Upstream failed with no usable cache entry"
                );
                Err(AppError::from_upstream(&error, self.diagnostics))
            }
        }
    }

    /// Validate `params` and report the sanitized upstream URL and cache key
    pub fn preview(&self, params: &OneCallParams) -> Result<UpstreamPreview, AppError> {
        let query = validate_onecall_params(params).map_err(AppError::Validation)?;

        Ok(UpstreamPreview {
            upstream_url: self.upstream.sanitized_url(&query),
            cache_key: self.cache.key_for(&query),
        })
    }

    fn from_cache(&self, request_id: &str, query: &GeoQuery, entry: CacheEntry, stale: bool) -> OneCallResponse {
        OneCallResponse {
            meta: ResponseMeta {
                request_id: request_id.to_string(),
                cache_hit: true,
                cache_age_s: Some(self.cache.age_seconds(entry.cached_at)),
                upstream_ms: None,
                stale,
            },
            location: Location::from(query),
            weather: apply_raw_preference(entry.payload, query.include_raw),
        }
    }
}
