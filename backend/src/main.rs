//! Weather Gateway - server binary

use std::{net::SocketAddr, sync::Arc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use weather_gateway::{
    clock::{Clock, SystemClock, TokioSleeper},
    config::{Config, StoreBackend},
    create_app,
    external::OpenWeatherClient,
    store::{CacheStore, CounterStore, InMemoryStore, RedisStore},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "weather_gateway=debug,tower_http=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if config.log_format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting Weather Gateway");
    tracing::info!("Environment: {}", config.environment);
    tracing::debug!(upstream = ?config.upstream, "Upstream configuration");

    if config.upstream.api_key.is_empty() {
        tracing::warn!("upstream.api_key is not set; requests needing the upstream will fail");
    }
    if config.diagnostics_enabled() {
        tracing::warn!("Diagnostic mode is on: error bodies include upstream details");
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // Select the shared store
    let (cache_store, counter_store): (Arc<dyn CacheStore>, Arc<dyn CounterStore>) =
        match config.store.backend {
            StoreBackend::Redis => {
                // Connects on first use; an outage degrades to cache misses
                // and unenforced rate limits instead of a failed start
                let store = Arc::new(RedisStore::new(&config.store)?);
                tracing::info!("Using Redis store, connecting on first use");
                let cache: Arc<dyn CacheStore> = store.clone();
                let counters: Arc<dyn CounterStore> = store;
                (cache, counters)
            }
            StoreBackend::Memory => {
                tracing::info!("Using in-process store; cache and counters are not shared");
                let store = Arc::new(InMemoryStore::new(clock.clone()));
                let cache: Arc<dyn CacheStore> = store.clone();
                let counters: Arc<dyn CounterStore> = store;
                (cache, counters)
            }
        };

    let upstream = Arc::new(OpenWeatherClient::new(&config.upstream, Arc::new(TokioSleeper))?);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;

    // Build application
    let state = AppState::new(config, cache_store, counter_store, clock, upstream);
    let app = create_app(state);

    // Start server
    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}
