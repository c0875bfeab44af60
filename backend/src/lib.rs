//! Weather Gateway - read-through cache in front of the OpenWeather One Call API
//!
//! Requests are validated, rate limited, and answered from a shared cache
//! when fresh. Otherwise they go upstream, with stale cache entries as the
//! fallback when the provider fails.

use axum::{extract::Request, middleware::from_fn, Router};
use std::{any::Any, sync::Arc};
use tower_http::{
    catch_panic::CatchPanicLayer,
    compression::CompressionLayer,
    cors::{Any as CorsAny, CorsLayer},
    trace::TraceLayer,
};

pub mod clock;
pub mod config;
pub mod error;
pub mod external;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod store;

pub use config::Config;

use crate::clock::Clock;
use crate::external::OneCallProvider;
use crate::middleware::{panic_response, request_id_middleware, RequestId};
use crate::services::{CachePolicy, RateLimiter, ResultCache, WeatherService};
use crate::store::{CacheStore, CounterStore};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub weather: Arc<WeatherService>,
    pub store: Arc<dyn CacheStore>,
}

impl AppState {
    /// Wire the services from configuration and their collaborators
    pub fn new(
        config: Config,
        cache_store: Arc<dyn CacheStore>,
        counter_store: Arc<dyn CounterStore>,
        clock: Arc<dyn Clock>,
        upstream: Arc<dyn OneCallProvider>,
    ) -> Self {
        let cache = ResultCache::new(
            cache_store.clone(),
            clock.clone(),
            CachePolicy::from(&config.cache),
            config.cache.bucket_degrees,
        );
        let rate_limiter = RateLimiter::from_config(counter_store, clock, &config.rate_limit);
        let weather = WeatherService::new(cache, upstream, rate_limiter, config.diagnostics_enabled());

        Self {
            config: Arc::new(config),
            weather: Arc::new(weather),
            store: cache_store,
        }
    }
}

/// Create the application router with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(CorsAny)
        .allow_methods(CorsAny)
        .allow_headers(CorsAny);

    let trace = TraceLayer::new_for_http().make_span_with(|request: &Request| {
        let request_id = request
            .extensions()
            .get::<RequestId>()
            .map(|id| id.0.clone())
            .unwrap_or_default();
        tracing::info_span!(
            "http_request",
            method = %request.method(),
            uri = %request.uri().path(),
            request_id = %request_id,
        )
    });

    let diagnostics = state.config.diagnostics_enabled();
    let catch_panic = CatchPanicLayer::custom(move |panic: Box<dyn Any + Send>| {
        panic_response(panic, diagnostics)
    });

    let mut router = Router::new().merge(routes::api_routes());
    if diagnostics {
        router = router.merge(routes::debug_routes());
    }

    router
        .layer(CompressionLayer::new())
        .layer(trace)
        .layer(cors)
        .layer(catch_panic)
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}
