//! Onecall orchestration tests
//!
//! Drives WeatherService end to end over the in-memory store, a manual
//! clock and a mock provider:
//! - Cold cache, then a fresh hit without a second upstream call
//! - The error when no usable stale entry exists
//! - Stale fallback on transport, 4xx and 5xx failures
//! - Upstream error classification
//! - Validation and rate limiting short-circuit everything else

use serde_json::{json, Value};
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shared::{build_cache_key, NormalizedWeather, OneCallParams};
use weather_gateway::clock::{ManualClock, RecordingSleeper};
use weather_gateway::config::{CacheConfig, Config, RateLimitConfig, UpstreamConfig};
use weather_gateway::error::AppError;
use weather_gateway::external::OpenWeatherClient;
use weather_gateway::services::{CacheEntry, CachePolicy, RateLimiter, ResultCache, WeatherService};
use weather_gateway::store::{CacheStore, InMemoryStore};

const ONE_CALL: &str = "/data/3.0/onecall";
const NOW: i64 = 1_700_000_000;

struct Harness {
    clock: Arc<ManualClock>,
    store: Arc<InMemoryStore>,
    sleeper: Arc<RecordingSleeper>,
    service: WeatherService,
}

fn config(base_url: &str) -> Config {
    Config {
        upstream: UpstreamConfig {
            base_url: base_url.to_string(),
            api_key: "test-key".to_string(),
            retries: 2,
            ..Default::default()
        },
        cache: CacheConfig {
            fresh_seconds: 600,
            max_stale_seconds: 1800,
            bucket_degrees: 0.05,
        },
        rate_limit: RateLimitConfig {
            global_per_minute: 0,
            caller_per_minute: 0,
        },
        ..Default::default()
    }
}

fn harness(config: &Config) -> Harness {
    let clock = Arc::new(ManualClock::new(NOW));
    let store = Arc::new(InMemoryStore::new(clock.clone()));
    let sleeper = Arc::new(RecordingSleeper::new());

    let cache = ResultCache::new(
        store.clone(),
        clock.clone(),
        CachePolicy::from(&config.cache),
        config.cache.bucket_degrees,
    );
    let limiter = RateLimiter::from_config(store.clone(), clock.clone(), &config.rate_limit);
    let upstream = Arc::new(OpenWeatherClient::new(&config.upstream, sleeper.clone()).unwrap());
    let service = WeatherService::new(cache, upstream, limiter, config.diagnostics_enabled());

    Harness {
        clock,
        store,
        sleeper,
        service,
    }
}

fn params(lat: &str, lon: &str) -> OneCallParams {
    OneCallParams {
        lat: Some(lat.to_string()),
        lon: Some(lon.to_string()),
        ..Default::default()
    }
}

fn provider_payload() -> Value {
    json!({
        "lat": 48.8566,
        "lon": 2.3522,
        "timezone": "Europe/Paris",
        "current": {"dt": NOW, "temp": 14.2, "humidity": 71, "weather": [{"id": 803, "main": "Clouds"}]},
        "hourly": [{"dt": NOW, "temp": 14.0, "pop": 0.1}],
        "alerts": []
    })
}

async fn mount_ok(server: &MockServer, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path(ONE_CALL))
        .respond_with(ResponseTemplate::new(200).set_body_json(provider_payload()))
        .expect(expected_calls)
        .mount(server)
        .await;
}

async fn mount_status(server: &MockServer, status: u16, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path(ONE_CALL))
        .respond_with(ResponseTemplate::new(status).set_body_json(json!({"cod": status, "message": "nope"})))
        .expect(expected_calls)
        .mount(server)
        .await;
}

// ============================================================================
// Scenario B: cold cache, then fresh hit
// ============================================================================

#[tokio::test]
async fn test_cold_cache_then_fresh_hit() {
    let server = MockServer::start().await;
    mount_ok(&server, 1).await;
    let h = harness(&config(&server.uri()));

    let first = h.service.onecall(&params("48.8566", "2.3522"), "c1", "req-1").await.unwrap();
    assert!(!first.meta.cache_hit);
    assert!(!first.meta.stale);
    assert_eq!(first.meta.cache_age_s, None);
    assert!(first.meta.upstream_ms.is_some());
    assert_eq!(first.meta.request_id, "req-1");
    assert_eq!(first.weather.current.temp, Some(json!(14.2)));
    assert_eq!(first.weather.raw, None);

    h.clock.advance(120);
    let second = h.service.onecall(&params("48.8566", "2.3522"), "c1", "req-2").await.unwrap();
    assert!(second.meta.cache_hit);
    assert!(!second.meta.stale);
    assert_eq!(second.meta.cache_age_s, Some(120));
    assert_eq!(second.meta.upstream_ms, None);
    assert_eq!(second.weather.current, first.weather.current);
}

#[tokio::test]
async fn test_nearby_coordinates_share_an_entry() {
    let server = MockServer::start().await;
    mount_ok(&server, 1).await;
    let h = harness(&config(&server.uri()));

    h.service.onecall(&params("48.8566", "2.3522"), "c1", "r1").await.unwrap();
    let nearby = h.service.onecall(&params("48.8601", "2.3489"), "c1", "r2").await.unwrap();

    assert!(nearby.meta.cache_hit);
    assert_eq!(nearby.location.lat, 48.8601);
}

#[tokio::test]
async fn test_expired_entry_refetched() {
    let server = MockServer::start().await;
    mount_ok(&server, 2).await;
    let h = harness(&config(&server.uri()));

    h.service.onecall(&params("10", "10"), "c1", "r1").await.unwrap();
    h.clock.advance(601);
    let again = h.service.onecall(&params("10", "10"), "c1", "r2").await.unwrap();

    assert!(!again.meta.cache_hit);
    assert!(!again.meta.stale);
}

#[tokio::test]
async fn test_raw_preference_applied_to_cached_entry() {
    let server = MockServer::start().await;
    mount_ok(&server, 1).await;
    let h = harness(&config(&server.uri()));

    let mut with_raw = params("48.8566", "2.3522");
    with_raw.raw = Some("1".to_string());
    let first = h.service.onecall(&with_raw, "c1", "r1").await.unwrap();
    assert_eq!(first.weather.raw, Some(provider_payload()));

    let without = h.service.onecall(&params("48.8566", "2.3522"), "c1", "r2").await.unwrap();
    assert!(without.meta.cache_hit);
    assert_eq!(without.weather.raw, None);

    let cached_raw = h.service.onecall(&with_raw, "c1", "r3").await.unwrap();
    assert_eq!(cached_raw.weather.raw, Some(provider_payload()));
}

// ============================================================================
// Scenario C: stale fallback
// ============================================================================

#[tokio::test]
async fn test_server_errors_fall_back_to_stale_entry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ONE_CALL))
        .respond_with(ResponseTemplate::new(200).set_body_json(provider_payload()))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(ONE_CALL))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let h = harness(&config(&server.uri()));

    h.service.onecall(&params("48.8566", "2.3522"), "c1", "r1").await.unwrap();
    h.clock.advance(900);

    let stale = h.service.onecall(&params("48.8566", "2.3522"), "c1", "r2").await.unwrap();
    assert!(stale.meta.cache_hit);
    assert!(stale.meta.stale);
    assert_eq!(stale.meta.cache_age_s, Some(900));
    assert_eq!(stale.weather.current.humidity, Some(json!(71)));
    assert_eq!(h.sleeper.delays().len(), 2);
}

#[tokio::test]
async fn test_server_errors_without_cache_are_upstream_error() {
    let server = MockServer::start().await;
    mount_status(&server, 500, 3).await;
    let h = harness(&config(&server.uri()));

    let error = h.service.onecall(&params("48.8566", "2.3522"), "c1", "r1").await.unwrap_err();
    assert!(matches!(error, AppError::Upstream { debug: None }));
    assert_eq!(error.error_code(), "UPSTREAM_ERROR");
}

#[tokio::test]
async fn test_entry_past_max_stale_is_not_served() {
    let server = MockServer::start().await;
    mount_status(&server, 503, 3).await;
    let h = harness(&config(&server.uri()));

    let key = build_cache_key(48.8566, 2.3522, "metric", "en", &[] as &[&str], 0.05);
    let entry = CacheEntry {
        cached_at: NOW - 1_801,
        payload: NormalizedWeather::default(),
    };
    h.store.insert_raw(&key, &serde_json::to_string(&entry).unwrap());

    let error = h.service.onecall(&params("48.8566", "2.3522"), "c1", "r1").await.unwrap_err();
    assert_eq!(error.error_code(), "UPSTREAM_ERROR");
}

fn seed_entry(h: &Harness, lat: f64, lon: f64, age: i64) {
    let key = build_cache_key(lat, lon, "metric", "en", &[] as &[&str], 0.05);
    let entry = CacheEntry {
        cached_at: NOW - age,
        payload: NormalizedWeather::default(),
    };
    h.store.insert_raw(&key, &serde_json::to_string(&entry).unwrap());
}

#[tokio::test]
async fn test_transport_failure_falls_back_to_stale_entry() {
    // Nothing listens on port 1
    let h = harness(&config("http://127.0.0.1:1"));
    seed_entry(&h, 48.8566, 2.3522, 900);

    let stale = h.service.onecall(&params("48.8566", "2.3522"), "c1", "r1").await.unwrap();
    assert!(stale.meta.cache_hit);
    assert!(stale.meta.stale);
    assert_eq!(stale.meta.cache_age_s, Some(900));
    assert_eq!(stale.meta.upstream_ms, None);
    assert_eq!(h.sleeper.delays().len(), 2);
}

#[tokio::test]
async fn test_client_error_falls_back_to_stale_entry() {
    let server = MockServer::start().await;
    mount_status(&server, 404, 1).await;
    let h = harness(&config(&server.uri()));
    seed_entry(&h, 48.8566, 2.3522, 700);

    let stale = h.service.onecall(&params("48.8566", "2.3522"), "c1", "r1").await.unwrap();
    assert!(stale.meta.stale);
    assert_eq!(stale.meta.cache_age_s, Some(700));
    assert!(h.sleeper.delays().is_empty());
}

// ============================================================================
// Scenario D: upstream error classes
// ============================================================================

#[tokio::test]
async fn test_unauthorized_is_auth_error_without_retries() {
    let server = MockServer::start().await;
    mount_status(&server, 401, 1).await;
    let h = harness(&config(&server.uri()));

    let error = h.service.onecall(&params("1", "1"), "c1", "r1").await.unwrap_err();
    assert_eq!(error.error_code(), "UPSTREAM_AUTH_ERROR");
    assert!(h.sleeper.delays().is_empty());
}

#[tokio::test]
async fn test_upstream_429_is_upstream_rate_limit() {
    let server = MockServer::start().await;
    mount_status(&server, 429, 1).await;
    let h = harness(&config(&server.uri()));

    let error = h.service.onecall(&params("1", "1"), "c1", "r1").await.unwrap_err();
    assert_eq!(error.error_code(), "UPSTREAM_RATE_LIMIT");
}

#[tokio::test]
async fn test_invalid_payload_is_upstream_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ONE_CALL))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .expect(1)
        .mount(&server)
        .await;
    let h = harness(&config(&server.uri()));

    let error = h.service.onecall(&params("1", "1"), "c1", "r1").await.unwrap_err();
    assert!(matches!(error, AppError::Upstream { debug: None }));
    assert_eq!(error.error_code(), "UPSTREAM_ERROR");
    assert!(h.sleeper.delays().is_empty());

    let key = build_cache_key(1.0, 1.0, "metric", "en", &[] as &[&str], 0.05);
    assert_eq!(h.store.get(&key).await.unwrap(), None);
}

#[tokio::test]
async fn test_diagnostic_mode_attaches_debug_payload() {
    let server = MockServer::start().await;
    mount_status(&server, 403, 1).await;
    let mut config = config(&server.uri());
    config.debug = true;
    let h = harness(&config);

    let error = h.service.onecall(&params("1", "1"), "c1", "r1").await.unwrap_err();
    match error {
        AppError::UpstreamAuth { debug: Some(debug) } => {
            assert_eq!(debug["status"], 403);
            assert!(!debug.to_string().contains("test-key"));
        }
        other => panic!("expected UpstreamAuth with debug, got {:?}", other),
    }
}

// ============================================================================
// Scenario E: validation short-circuits
// ============================================================================

#[tokio::test]
async fn test_invalid_latitude_touches_nothing() {
    let server = MockServer::start().await;
    mount_ok(&server, 0).await;
    let h = harness(&config(&server.uri()));

    let error = h.service.onecall(&params("91.0", "2.35"), "c1", "r1").await.unwrap_err();
    match error {
        AppError::Validation(errors) => {
            assert_eq!(errors.get("lat"), Some("lat must be between -90 and 90"));
            assert_eq!(errors.get("lon"), None);
        }
        other => panic!("expected Validation, got {:?}", other),
    }
    assert_eq!(h.store.operations(), 0);
}

#[tokio::test]
async fn test_every_invalid_field_reported() {
    let server = MockServer::start().await;
    let h = harness(&config(&server.uri()));

    let bad = OneCallParams {
        lat: None,
        lon: Some("east".to_string()),
        units: Some("kelvin".to_string()),
        lang: Some(String::new()),
        exclude: Some("hourly,weekly".to_string()),
        raw: Some("yes".to_string()),
    };
    let error = h.service.onecall(&bad, "c1", "r1").await.unwrap_err();
    let AppError::Validation(errors) = error else {
        panic!("expected Validation");
    };

    let fields: Vec<&str> = errors.fields().collect();
    assert_eq!(fields, vec!["exclude", "lang", "lat", "lon", "raw", "units"]);
}

// ============================================================================
// Rate limiting
// ============================================================================

#[tokio::test]
async fn test_caller_quota_rejects_before_cache() {
    let server = MockServer::start().await;
    mount_ok(&server, 1).await;
    let mut config = config(&server.uri());
    config.rate_limit.caller_per_minute = 2;
    let h = harness(&config);

    h.service.onecall(&params("5", "5"), "alice", "r1").await.unwrap();
    h.service.onecall(&params("5", "5"), "alice", "r2").await.unwrap();
    let error = h.service.onecall(&params("5", "5"), "alice", "r3").await.unwrap_err();

    match error {
        AppError::RateLimited { retry_after_s } => assert!(retry_after_s >= 1),
        other => panic!("expected RateLimited, got {:?}", other),
    }
    assert_ok!(h.service.onecall(&params("5", "5"), "bob", "r4").await);
}

#[tokio::test]
async fn test_store_outage_still_serves_from_upstream() {
    let server = MockServer::start().await;
    mount_ok(&server, 2).await;
    let mut config = config(&server.uri());
    config.rate_limit.caller_per_minute = 1;
    let h = harness(&config);
    h.store.set_unavailable(true);

    for request_id in ["r1", "r2"] {
        let response = h.service.onecall(&params("5", "5"), "alice", request_id).await.unwrap();
        assert!(!response.meta.cache_hit);
    }
}

// ============================================================================
// Missing credential
// ============================================================================

#[tokio::test]
async fn test_missing_api_key_is_internal_error() {
    let server = MockServer::start().await;
    mount_ok(&server, 0).await;
    let mut config = config(&server.uri());
    config.upstream.api_key = String::new();
    let h = harness(&config);

    let error = assert_err!(h.service.onecall(&params("5", "5"), "c1", "r1").await);
    assert_eq!(error.error_code(), "INTERNAL_ERROR");
}

#[tokio::test]
async fn test_missing_api_key_still_serves_fresh_entry() {
    let server = MockServer::start().await;
    let mut config = config(&server.uri());
    config.upstream.api_key = String::new();
    let h = harness(&config);

    let key = build_cache_key(5.0, 5.0, "metric", "en", &[] as &[&str], 0.05);
    let entry = CacheEntry {
        cached_at: NOW - 10,
        payload: NormalizedWeather::default(),
    };
    h.store.insert_raw(&key, &serde_json::to_string(&entry).unwrap());

    let response = h.service.onecall(&params("5", "5"), "c1", "r1").await.unwrap();
    assert!(response.meta.cache_hit);
    assert_eq!(response.meta.cache_age_s, Some(10));
}

#[tokio::test]
async fn test_query_parameters_reach_provider() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ONE_CALL))
        .and(query_param("units", "imperial"))
        .and(query_param("lang", "fr"))
        .and(query_param("exclude", "daily,minutely"))
        .and(query_param("appid", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(provider_payload()))
        .expect(1)
        .mount(&server)
        .await;
    let h = harness(&config(&server.uri()));

    let request = OneCallParams {
        units: Some("imperial".to_string()),
        lang: Some("fr".to_string()),
        exclude: Some("Minutely, DAILY".to_string()),
        ..params("40", "-74")
    };
    assert_ok!(h.service.onecall(&request, "c1", "r1").await);
}
