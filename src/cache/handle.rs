//! Shared cache handle
//!
//! `Cache<V>` guards a `CacheStore` with one coarse mutex and reports
//! evictions to an optional event emitter once the lock is released.

use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;

use crate::cache::{CacheConfig, CacheStats, CacheStore};
use crate::clock::{system_clock, SharedClock};
use crate::events::{publish, EventKind, SharedEmitter};

/// Bounded, idle-expiring LRU cache safe for concurrent use.
#[derive(Debug)]
pub struct Cache<V> {
    store: Mutex<CacheStore<V>>,
    name: String,
    events: Option<SharedEmitter>,
}

impl<V: Clone> Cache<V> {
    /// Creates a cache on the system clock.
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, system_clock())
    }

    pub fn with_clock(config: CacheConfig, clock: SharedClock) -> Self {
        Self {
            store: Mutex::new(CacheStore::new(config, clock)),
            name: "cache".to_string(),
            events: None,
        }
    }

    /// Publishes evictions and clears on `emitter`, tagged with `name`.
    pub fn with_events(mut self, name: impl Into<String>, emitter: SharedEmitter) -> Self {
        self.name = name.into();
        self.events = Some(emitter);
        self.store.get_mut().track_evictions(true);
        self
    }

    pub fn set(&self, key: impl Into<String>, value: V) {
        self.with_store(|store| store.set(key.into(), value));
    }

    /// Returns a clone of the live value, restarting its idle window.
    pub fn get(&self, key: &str) -> Option<V> {
        self.with_store(|store| store.get(key).cloned())
    }

    pub fn has(&self, key: &str) -> bool {
        self.with_store(|store| store.has(key))
    }

    pub fn delete(&self, key: &str) -> bool {
        self.store.lock().delete(key)
    }

    pub fn clear(&self) {
        let removed = self.store.lock().clear();
        publish(
            self.events.as_ref(),
            &self.name,
            EventKind::CacheCleared { removed },
        );
    }

    /// Number of live entries.
    pub fn size(&self) -> usize {
        self.with_store(CacheStore::size)
    }

    pub fn get_stats(&self) -> CacheStats {
        self.store.lock().stats()
    }

    pub fn cleanup_expired(&self) -> usize {
        self.with_store(CacheStore::cleanup_expired)
    }

    /// Idle time left before `key` expires; `None` if absent or expired.
    pub fn ttl_remaining(&self, key: &str) -> Option<Duration> {
        self.store.lock().ttl_remaining(key)
    }

    /// Returns the cached value for `key`, or computes, stores and returns it.
    ///
    /// The lock is not held while `fetch` runs, so concurrent misses on the
    /// same key may each fetch; the last write wins. Errors are not cached.
    pub async fn get_or_try_insert_with<F, Fut, E>(&self, key: &str, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }
        let value = fetch().await?;
        self.set(key, value.clone());
        Ok(value)
    }

    fn with_store<R>(&self, op: impl FnOnce(&mut CacheStore<V>) -> R) -> R {
        let (result, evicted) = {
            let mut store = self.store.lock();
            let result = op(&mut store);
            (result, store.drain_evicted())
        };

        for (key, reason) in evicted {
            publish(
                self.events.as_ref(),
                &self.name,
                EventKind::CacheEvicted { key, reason },
            );
        }
        result
    }
}

impl<V: Clone> Default for Cache<V> {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}
