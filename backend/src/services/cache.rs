//! Result cache with freshness and staleness windows

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use shared::{GeoQuery, NormalizedWeather};

use crate::clock::Clock;
use crate::config::CacheConfig;
use crate::store::{CacheStore, StoreError};

/// Freshness rules, independent of any store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub fresh_seconds: i64,
    pub max_stale_seconds: i64,
}

impl CachePolicy {
    /// Negative windows are clamped to zero
    pub fn new(fresh_seconds: i64, max_stale_seconds: i64) -> Self {
        Self {
            fresh_seconds: fresh_seconds.max(0),
            max_stale_seconds: max_stale_seconds.max(0),
        }
    }

    /// Never negative, even when `cached_at` is ahead of `now`
    pub fn age_seconds(&self, cached_at: i64, now: i64) -> i64 {
        now.saturating_sub(cached_at).max(0)
    }

    /// Fresh up to and including `fresh_seconds`
    pub fn is_fresh(&self, cached_at: i64, now: i64) -> bool {
        self.age_seconds(cached_at, now) <= self.fresh_seconds
    }

    pub fn is_within_max_stale(&self, cached_at: i64, now: i64) -> bool {
        self.age_seconds(cached_at, now) <= self.max_stale_seconds
    }

    /// Entries must outlive the stale window, not just the fresh one
    pub fn store_ttl_seconds(&self) -> u64 {
        let ttl = self.fresh_seconds.max(self.max_stale_seconds).max(1);
        u64::try_from(ttl).unwrap_or(1)
    }
}

impl From<&CacheConfig> for CachePolicy {
    fn from(config: &CacheConfig) -> Self {
        Self::new(config.fresh_seconds, config.max_stale_seconds)
    }
}

/// Stored cache value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub cached_at: i64,
    pub payload: NormalizedWeather,
}

/// Normalized results keyed by bucketed query
pub struct ResultCache {
    store: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
    policy: CachePolicy,
    bucket_degrees: f64,
}

impl ResultCache {
    pub fn new(
        store: Arc<dyn CacheStore>,
        clock: Arc<dyn Clock>,
        policy: CachePolicy,
        bucket_degrees: f64,
    ) -> Self {
        let bucket_degrees = if bucket_degrees > 0.0 {
            bucket_degrees
        } else {
            shared::DEFAULT_BUCKET_DEGREES
        };

        Self {
            store,
            clock,
            policy,
            bucket_degrees,
        }
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    pub fn key_for(&self, query: &GeoQuery) -> String {
        query.cache_key(self.bucket_degrees)
    }

    /// Look up an entry. Unreadable data and store failures count as a miss.
    pub async fn get(&self, key: &str) -> Option<CacheEntry> {
        let stored = match self.store.get(key).await {
            Ok(Some(stored)) => stored,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(cache_key = %key, error = %e, "Cache read failed, treating as miss");
                return None;
            }
        };

        match serde_json::from_str::<CacheEntry>(&stored) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(cache_key = %key, error = %e, "Discarding malformed cache entry");
                None
            }
        }
    }

    /// Overwrite the entry for `key`, stamped with the current time
    pub async fn set(&self, key: &str, payload: &NormalizedWeather) -> Result<CacheEntry, StoreError> {
        let entry = CacheEntry {
            cached_at: self.clock.now(),
            payload: payload.clone(),
        };

        let encoded = serde_json::to_string(&entry)?;
        self.store
            .set_ex(key, &encoded, self.policy.store_ttl_seconds())
            .await?;

        Ok(entry)
    }

    pub fn is_fresh(&self, cached_at: i64) -> bool {
        self.policy.is_fresh(cached_at, self.clock.now())
    }

    pub fn is_within_max_stale(&self, cached_at: i64) -> bool {
        self.policy.is_within_max_stale(cached_at, self.clock.now())
    }

    pub fn age_seconds(&self, cached_at: i64) -> i64 {
        self.policy.age_seconds(cached_at, self.clock.now())
    }
}
