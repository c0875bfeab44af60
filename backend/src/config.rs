//! Configuration management for the weather gateway
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (config/development.toml, config/production.toml)
//! 3. Environment variable overrides with WGW_ prefix (e.g. `WGW__UPSTREAM__API_KEY`)

use config::{ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, dev, production)
    pub environment: String,

    /// Force diagnostic mode regardless of environment
    pub debug: bool,

    /// Log output format: "pretty" or "json"
    pub log_format: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Shared state store (cache entries, rate counters)
    pub store: StoreConfig,

    /// Upstream weather provider
    pub upstream: UpstreamConfig,

    /// Result cache windows and bucketing
    pub cache: CacheConfig,

    /// Request quotas
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Redis,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// Which store implementation to run against
    pub backend: StoreBackend,

    /// Redis connection URL
    pub redis_url: String,

    /// Upper bound for a single store round-trip
    pub command_timeout_ms: u64,
}

#[derive(Deserialize, Clone)]
pub struct UpstreamConfig {
    /// Provider base URL, without the API path
    pub base_url: String,

    /// Provider API key
    pub api_key: String,

    /// Per-attempt connect timeout
    pub connect_timeout_ms: u64,

    /// Per-attempt total timeout
    pub timeout_ms: u64,

    /// Additional attempts after a transport failure or 5xx
    pub retries: u32,

    /// First backoff delay, doubled on every further attempt
    pub backoff_base_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    /// Entries younger than this are served without contacting upstream
    pub fresh_seconds: i64,

    /// Entries younger than this may be served when upstream fails
    pub max_stale_seconds: i64,

    /// Grid size used to fold nearby coordinates onto one cache key
    pub bucket_degrees: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    /// Requests per minute across all callers; zero or less disables
    pub global_per_minute: i64,

    /// Requests per minute per caller; zero or less disables
    pub caller_per_minute: i64,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("WGW_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("debug", false)?
            .set_default("log_format", "pretty")?
            .set_default("server.port", 8080)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("store.backend", "redis")?
            .set_default("store.redis_url", "redis://127.0.0.1:6379")?
            .set_default("store.command_timeout_ms", 500)?
            .set_default("upstream.base_url", "https://api.openweathermap.org")?
            .set_default("upstream.api_key", "")?
            .set_default("upstream.connect_timeout_ms", 1000)?
            .set_default("upstream.timeout_ms", 3000)?
            .set_default("upstream.retries", 2)?
            .set_default("upstream.backoff_base_ms", 100)?
            .set_default("cache.fresh_seconds", 600)?
            .set_default("cache.max_stale_seconds", 1800)?
            .set_default("cache.bucket_degrees", 0.05)?
            .set_default("rate_limit.global_per_minute", 300)?
            .set_default("rate_limit.caller_per_minute", 60)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (WGW_ prefix)
            .add_source(
                Environment::with_prefix("WGW")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Whether error bodies may carry `debug` details and the debug routes are mounted
    pub fn diagnostics_enabled(&self) -> bool {
        self.debug || self.environment == "dev"
    }
}

impl UpstreamConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
}

// The API key must never reach a log line
impl std::fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &if self.api_key.is_empty() { "" } else { "***" })
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("timeout_ms", &self.timeout_ms)
            .field("retries", &self.retries)
            .field("backoff_base_ms", &self.backoff_base_ms)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            debug: false,
            log_format: "pretty".to_string(),
            server: ServerConfig::default(),
            store: StoreConfig::default(),
            upstream: UpstreamConfig::default(),
            cache: CacheConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "0.0.0.0".to_string(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Redis,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            command_timeout_ms: 500,
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openweathermap.org".to_string(),
            api_key: String::new(),
            connect_timeout_ms: 1000,
            timeout_ms: 3000,
            retries: 2,
            backoff_base_ms: 100,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            fresh_seconds: 600,
            max_stale_seconds: 1800,
            bucket_degrees: shared::DEFAULT_BUCKET_DEGREES,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            global_per_minute: 300,
            caller_per_minute: 60,
        }
    }
}
