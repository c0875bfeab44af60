//! Shared state store capabilities
//!
//! Cache entries and rate counters live outside the process. The gateway
//! only needs atomic increment with TTL for counters and opaque get/set
//! with TTL for cache blobs, so those are the two capabilities exposed here.

pub mod memory;
pub mod redis;

use async_trait::async_trait;
use thiserror::Error;

pub use self::memory::InMemoryStore;
pub use self::redis::RedisStore;

/// `ttl` result for a key that does not exist
pub const TTL_MISSING: i64 = -2;

/// `ttl` result for a key without an expiry
pub const TTL_PERSISTENT: i64 = -1;

/// Store failures
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store operation timed out")]
    Timeout,

    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("Stored value is not a counter: {0}")]
    NotACounter(String),

    #[error("Failed to encode value: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Atomic counters with expiry
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increment by one and return the new value; missing keys start at 0
    async fn incr(&self, key: &str) -> Result<i64, StoreError>;

    /// Set the key's time to live; false if the key does not exist
    async fn expire(&self, key: &str, ttl_seconds: i64) -> Result<bool, StoreError>;

    /// Remaining seconds, [`TTL_MISSING`] or [`TTL_PERSISTENT`]
    async fn ttl(&self, key: &str) -> Result<i64, StoreError>;
}

/// Opaque blobs with expiry
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), StoreError>;

    /// Round-trip used by the readiness check
    async fn ping(&self) -> Result<(), StoreError>;
}
