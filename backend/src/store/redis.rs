//! Redis-backed store shared by every gateway instance

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

use ::redis::aio::ConnectionManager;
use ::redis::{AsyncCommands, Client, RedisResult};

use super::{CacheStore, CounterStore, StoreError};
use crate::config::StoreConfig;

/// Redis connection with a per-command deadline.
///
/// The connection is opened on first use, not at startup, so the gateway
/// serves requests while Redis is down: until a connection exists every
/// command fails with [`StoreError::Unavailable`], and the next command
/// tries again. Once open, the connection manager reconnects on its own.
#[derive(Clone)]
pub struct RedisStore {
    client: Client,
    connection: Arc<OnceCell<ConnectionManager>>,
    command_timeout: Duration,
}

impl RedisStore {
    /// Parse the Redis URL; no connection is made yet
    pub fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        let client = Client::open(config.redis_url.as_str())?;

        Ok(Self {
            client,
            connection: Arc::new(OnceCell::new()),
            command_timeout: Duration::from_millis(config.command_timeout_ms),
        })
    }

    /// Shared connection, opened on first call
    async fn connection(&self) -> Result<ConnectionManager, StoreError> {
        let connection = self
            .connection
            .get_or_try_init(|| async {
                let connect = ConnectionManager::new(self.client.clone());
                match tokio::time::timeout(self.command_timeout, connect).await {
                    Ok(Ok(connection)) => {
                        tracing::info!("Redis connection established");
                        Ok(connection)
                    }
                    Ok(Err(e)) => Err(StoreError::Unavailable(format!("Redis connection failed: {}", e))),
                    Err(_) => Err(StoreError::Unavailable("Redis connection timed out".to_string())),
                }
            })
            .await?;

        Ok(connection.clone())
    }

    async fn bounded<T, F>(&self, operation: F) -> Result<T, StoreError>
    where
        F: Future<Output = RedisResult<T>>,
    {
        match tokio::time::timeout(self.command_timeout, operation).await {
            Ok(result) => result.map_err(StoreError::from),
            Err(_) => Err(StoreError::Timeout),
        }
    }
}

#[async_trait]
impl CounterStore for RedisStore {
    async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        let mut conn = self.connection().await?;
        self.bounded(async move { conn.incr(key, 1i64).await }).await
    }

    async fn expire(&self, key: &str, ttl_seconds: i64) -> Result<bool, StoreError> {
        let mut conn = self.connection().await?;
        self.bounded(async move { conn.expire(key, ttl_seconds).await })
            .await
    }

    async fn ttl(&self, key: &str) -> Result<i64, StoreError> {
        let mut conn = self.connection().await?;
        self.bounded(async move { conn.ttl(key).await }).await
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.connection().await?;
        self.bounded(async move { conn.get(key).await }).await
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        self.bounded(async move { conn.set_ex(key, value, ttl_seconds).await })
            .await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let pong: String = self
            .bounded(async move { ::redis::cmd("PING").query_async(&mut conn).await })
            .await?;

        if pong == "PONG" {
            Ok(())
        } else {
            Err(StoreError::Unavailable(format!("unexpected PING reply: {}", pong)))
        }
    }
}
