//! In-process store for single-instance deployments and tests
//!
//! Expiry follows the injected clock, so TTL behavior can be stepped
//! through deterministically. An outage switch makes every operation fail,
//! and an operation counter lets tests assert that nothing touched the store.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use super::{CacheStore, CounterStore, StoreError, TTL_MISSING, TTL_PERSISTENT};
use crate::clock::Clock;

#[derive(Debug, Clone)]
struct Slot {
    value: String,
    expires_at: Option<i64>,
}

/// HashMap-backed implementation of both store capabilities
pub struct InMemoryStore {
    clock: Arc<dyn Clock>,
    slots: Mutex<HashMap<String, Slot>>,
    unavailable: AtomicBool,
    operations: AtomicUsize,
}

impl InMemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            slots: Mutex::new(HashMap::new()),
            unavailable: AtomicBool::new(false),
            operations: AtomicUsize::new(0),
        }
    }

    /// Simulate an outage: every operation fails until switched back
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of operations attempted so far, failed ones included
    pub fn operations(&self) -> usize {
        self.operations.load(Ordering::SeqCst)
    }

    /// Write a raw value without expiry, bypassing the counters
    pub fn insert_raw(&self, key: &str, value: &str) {
        self.slots.lock().insert(
            key.to_string(),
            Slot {
                value: value.to_string(),
                expires_at: None,
            },
        );
    }

    fn begin(&self) -> Result<(), StoreError> {
        self.operations.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store switched off".to_string()));
        }
        Ok(())
    }

    /// Drop the key if its expiry has passed, then hand back the live slot
    fn live<'a>(slots: &'a mut HashMap<String, Slot>, key: &str, now: i64) -> Option<&'a mut Slot> {
        let expired = slots
            .get(key)
            .and_then(|slot| slot.expires_at)
            .map(|at| at <= now)
            .unwrap_or(false);
        if expired {
            slots.remove(key);
        }
        slots.get_mut(key)
    }
}

#[async_trait]
impl CounterStore for InMemoryStore {
    async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        self.begin()?;
        let now = self.clock.now();
        let mut slots = self.slots.lock();

        match Self::live(&mut slots, key, now) {
            Some(slot) => {
                let current: i64 = slot
                    .value
                    .parse()
                    .map_err(|_| StoreError::NotACounter(key.to_string()))?;
                let next = current + 1;
                slot.value = next.to_string();
                Ok(next)
            }
            None => {
                slots.insert(
                    key.to_string(),
                    Slot {
                        value: "1".to_string(),
                        expires_at: None,
                    },
                );
                Ok(1)
            }
        }
    }

    async fn expire(&self, key: &str, ttl_seconds: i64) -> Result<bool, StoreError> {
        self.begin()?;
        let now = self.clock.now();
        let mut slots = self.slots.lock();

        match Self::live(&mut slots, key, now) {
            Some(slot) => {
                slot.expires_at = Some(now + ttl_seconds);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn ttl(&self, key: &str) -> Result<i64, StoreError> {
        self.begin()?;
        let now = self.clock.now();
        let mut slots = self.slots.lock();

        Ok(match Self::live(&mut slots, key, now) {
            Some(Slot {
                expires_at: Some(at),
                ..
            }) => *at - now,
            Some(_) => TTL_PERSISTENT,
            None => TTL_MISSING,
        })
    }
}

#[async_trait]
impl CacheStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.begin()?;
        let now = self.clock.now();
        let mut slots = self.slots.lock();

        Ok(Self::live(&mut slots, key, now).map(|slot| slot.value.clone()))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), StoreError> {
        self.begin()?;
        let now = self.clock.now();
        let ttl = i64::try_from(ttl_seconds).unwrap_or(i64::MAX - now);

        self.slots.lock().insert(
            key.to_string(),
            Slot {
                value: value.to_string(),
                expires_at: Some(now.saturating_add(ttl)),
            },
        );
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.begin()
    }
}
