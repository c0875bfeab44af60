//! Fixed-window request quotas, global and per caller
//!
//! Counters live in the shared store under `rate:global:<window>` and
//! `rate:caller:<caller>:<window>`, where the window is `floor(now / 60)`.
//! A counter gets its 60 second expiry on the increment that creates it.
//! When the store misbehaves the limiter lets requests through.

use std::sync::Arc;

use crate::clock::Clock;
use crate::config::RateLimitConfig;
use crate::store::{CounterStore, StoreError};

const WINDOW_SECONDS: i64 = 60;

/// Outcome of a quota check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Zero when allowed, at least one otherwise
    pub retry_after_seconds: i64,
}

impl RateLimitDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            retry_after_seconds: 0,
        }
    }
}

pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    clock: Arc<dyn Clock>,
    global_per_minute: i64,
    caller_per_minute: i64,
}

impl RateLimiter {
    /// Limits of zero or less disable that tier
    pub fn new(
        store: Arc<dyn CounterStore>,
        clock: Arc<dyn Clock>,
        global_per_minute: i64,
        caller_per_minute: i64,
    ) -> Self {
        Self {
            store,
            clock,
            global_per_minute,
            caller_per_minute,
        }
    }

    pub fn from_config(store: Arc<dyn CounterStore>, clock: Arc<dyn Clock>, config: &RateLimitConfig) -> Self {
        Self::new(store, clock, config.global_per_minute, config.caller_per_minute)
    }

    /// Count this request against both tiers
    pub async fn check(&self, caller_id: &str) -> RateLimitDecision {
        match self.try_check(caller_id).await {
            Ok(decision) => decision,
            Err(e) => {
                tracing::warn!(caller_id, error = %e, "Rate limiter store failed, allowing request");
                RateLimitDecision::allow()
            }
        }
    }

    async fn try_check(&self, caller_id: &str) -> Result<RateLimitDecision, StoreError> {
        let window = self.clock.now().div_euclid(WINDOW_SECONDS);
        let global_key = format!("rate:global:{}", window);
        let caller_key = format!("rate:caller:{}:{}", caller_id, window);

        let global_count = self.increment(&global_key).await?;
        let caller_count = self.increment(&caller_key).await?;

        let mut allowed = true;
        let mut retry_after = 0;

        if self.global_per_minute > 0 && global_count > self.global_per_minute {
            allowed = false;
            retry_after = retry_after.max(self.remaining(&global_key).await?);
        }

        if self.caller_per_minute > 0 && caller_count > self.caller_per_minute {
            allowed = false;
            retry_after = retry_after.max(self.remaining(&caller_key).await?);
        }

        if allowed {
            return Ok(RateLimitDecision::allow());
        }

        tracing::info!(caller_id, global_count, caller_count, "Rate limit exceeded");
        Ok(RateLimitDecision {
            allowed: false,
            retry_after_seconds: retry_after.max(1),
        })
    }

    async fn increment(&self, key: &str) -> Result<i64, StoreError> {
        let count = self.store.incr(key).await?;
        if count == 1 {
            self.store.expire(key, WINDOW_SECONDS).await?;
        }
        Ok(count)
    }

    /// Remaining TTL, with missing or persistent keys reported as 0
    async fn remaining(&self, key: &str) -> Result<i64, StoreError> {
        Ok(self.store.ttl(key).await?.max(0))
    }
}
