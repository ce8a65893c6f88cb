//! Cache Store Module
//!
//! Unsynchronized cache engine: HashMap storage, LRU ordering and idle expiry.
//! `Cache` wraps it in a mutex for shared use.

use std::collections::HashMap;
use std::time::Duration;

use tracing::debug;

use crate::cache::{CacheEntry, CacheStats, LruTracker};
use crate::clock::SharedClock;
use crate::events::EvictionReason;

// == Cache Config ==
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of live entries
    pub max_size: usize,
    /// Idle timeout; every read restarts it
    pub ttl: Duration,
}

impl CacheConfig {
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self { max_size, ttl }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: 1000,
            ttl: Duration::from_secs(5 * 60),
        }
    }
}

// == Cache Store ==
#[derive(Debug)]
pub struct CacheStore<V> {
    /// Key-value storage
    entries: HashMap<String, CacheEntry<V>>,
    /// LRU access order
    lru: LruTracker,
    /// Running counters
    stats: CacheStats,
    max_size: usize,
    ttl: Duration,
    clock: SharedClock,
    /// Removals not yet reported to the owner
    evicted: Vec<(String, EvictionReason)>,
    /// Whether removals are recorded for `drain_evicted`
    track_evictions: bool,
}

impl<V> CacheStore<V> {
    // == Constructor ==
    pub fn new(config: CacheConfig, clock: SharedClock) -> Self {
        Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            stats: CacheStats::new(config.max_size, config.ttl),
            max_size: config.max_size,
            ttl: config.ttl,
            clock,
            evicted: Vec::new(),
            track_evictions: false,
        }
    }

    /// Records evictions and expirations for `drain_evicted`. Off by default;
    /// turning it off drops anything not yet drained.
    pub fn track_evictions(&mut self, enable: bool) {
        self.track_evictions = enable;
        if !enable {
            self.evicted.clear();
        }
    }

    // == Set ==
    /// Stores a value, overwriting any previous one and restarting its idle window.
    ///
    /// Inserting a new key into a full store first drops expired entries, then,
    /// if still full, evicts the least recently used entry.
    pub fn set(&mut self, key: String, value: V) {
        if self.max_size == 0 {
            debug!(key = %key, "Cache has zero capacity, value not stored");
            return;
        }

        let now = self.clock.now();

        if let Some(entry) = self.entries.get_mut(&key) {
            *entry = CacheEntry::new(value, now);
            self.lru.touch(&key);
            debug!(key = %key, "Cache entry overwritten");
            return;
        }

        if self.entries.len() >= self.max_size {
            self.cleanup_expired();
        }
        if self.entries.len() >= self.max_size {
            if let Some(oldest) = self.lru.evict_oldest() {
                self.entries.remove(&oldest);
                self.stats.record_eviction();
                debug!(key = %oldest, "LRU cache entry evicted");
                self.note_eviction(oldest, EvictionReason::Capacity);
            }
        }

        self.lru.touch(&key);
        debug!(key = %key, "Cache entry set");
        self.entries.insert(key, CacheEntry::new(value, now));
    }

    // == Get ==
    /// Returns the value and restarts its idle window.
    ///
    /// A missing or expired key is a miss; expired entries are removed.
    pub fn get(&mut self, key: &str) -> Option<&V> {
        let now = self.clock.now();

        if self.remove_if_expired(key) {
            self.stats.record_miss();
            return None;
        }

        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.touch(now);
                self.lru.touch(key);
                self.stats.record_hit();
                debug!(key, "Cache hit");
                Some(&entry.value)
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    // == Has ==
    /// Checks for a live entry without refreshing it.
    pub fn has(&mut self, key: &str) -> bool {
        !self.remove_if_expired(key) && self.entries.contains_key(key)
    }

    // == Delete ==
    /// Removes an entry. Returns true iff it existed.
    pub fn delete(&mut self, key: &str) -> bool {
        let existed = self.entries.remove(key).is_some();
        if existed {
            self.lru.remove(key);
            debug!(key, "Cache entry deleted");
        }
        existed
    }

    // == Clear ==
    /// Removes every entry and returns how many were dropped.
    pub fn clear(&mut self) -> usize {
        let removed = self.entries.len();
        self.entries.clear();
        self.lru.clear();
        debug!(removed, "Cache cleared");
        removed
    }

    // == Size ==
    /// Number of live entries; expired ones are purged first.
    pub fn size(&mut self) -> usize {
        self.cleanup_expired();
        self.entries.len()
    }

    /// Number of stored entries, expired or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // == Stats ==
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.size = self.entries.len();
        stats
    }

    /// Remaining idle time of a live entry.
    pub fn ttl_remaining(&self, key: &str) -> Option<Duration> {
        let now = self.clock.now();
        self.entries
            .get(key)
            .filter(|entry| !entry.is_expired(now, self.ttl))
            .map(|entry| entry.ttl_remaining(now, self.ttl))
    }

    // == Cleanup Expired ==
    /// Removes all expired entries and returns how many were removed.
    pub fn cleanup_expired(&mut self) -> usize {
        let now = self.clock.now();
        let ttl = self.ttl;
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now, ttl))
            .map(|(key, _)| key.clone())
            .collect();

        let count = expired.len();
        for key in expired {
            self.entries.remove(&key);
            self.lru.remove(&key);
            debug!(key = %key, "Expired cache entry evicted");
            self.note_eviction(key, EvictionReason::Expired);
        }
        self.stats.record_expirations(count);
        count
    }

    /// Takes the removals recorded since the last call.
    pub fn drain_evicted(&mut self) -> Vec<(String, EvictionReason)> {
        std::mem::take(&mut self.evicted)
    }

    fn note_eviction(&mut self, key: String, reason: EvictionReason) {
        if self.track_evictions {
            self.evicted.push((key, reason));
        }
    }

    fn remove_if_expired(&mut self, key: &str) -> bool {
        let now = self.clock.now();
        let expired = self
            .entries
            .get(key)
            .is_some_and(|entry| entry.is_expired(now, self.ttl));

        if expired {
            self.entries.remove(key);
            self.lru.remove(key);
            self.stats.record_expirations(1);
            self.note_eviction(key.to_string(), EvictionReason::Expired);
            debug!(key, "Cache entry expired");
        }
        expired
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::clock::ManualClock;

    fn store(max_size: usize) -> (CacheStore<String>, ManualClock) {
        let clock = ManualClock::new();
        let config = CacheConfig::new(max_size, Duration::from_millis(1000));
        (CacheStore::new(config, Arc::new(clock.clone())), clock)
    }

    fn set(store: &mut CacheStore<String>, key: &str, value: &str) {
        store.set(key.to_string(), value.to_string());
    }

    #[test]
    fn test_store_set_and_get() {
        let (mut store, _) = store(10);
        set(&mut store, "key1", "value1");

        assert_eq!(store.get("key1").map(String::as_str), Some("value1"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_get_nonexistent() {
        let (mut store, _) = store(10);
        assert!(store.get("missing").is_none());
        assert_eq!(store.stats().misses, 1);
    }

    #[test]
    fn test_store_overwrite_keeps_size() {
        let (mut store, _) = store(10);
        set(&mut store, "key1", "value1");
        set(&mut store, "key1", "value2");

        assert_eq!(store.get("key1").map(String::as_str), Some("value2"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_delete() {
        let (mut store, _) = store(10);
        set(&mut store, "key1", "value1");

        assert!(store.delete("key1"));
        assert!(!store.delete("key1"));
        assert!(store.get("key1").is_none());
    }

    #[test]
    fn test_store_idle_expiry() {
        let (mut store, clock) = store(10);
        store.track_evictions(true);
        set(&mut store, "key1", "value1");

        clock.advance(Duration::from_millis(500));
        assert!(store.get("key1").is_some());

        clock.advance(Duration::from_millis(1001));
        assert!(store.get("key1").is_none());
        assert_eq!(store.len(), 0, "expired entry removed on read");
        assert_eq!(
            store.drain_evicted(),
            vec![("key1".to_string(), EvictionReason::Expired)]
        );
    }

    #[test]
    fn test_store_get_refreshes_idle_window() {
        let (mut store, clock) = store(10);
        set(&mut store, "key1", "value1");

        clock.advance(Duration::from_millis(500));
        store.get("key1");

        clock.advance(Duration::from_millis(500));
        assert!(store.get("key1").is_some());

        clock.advance(Duration::from_millis(1001));
        assert!(store.get("key1").is_none());
    }

    #[test]
    fn test_store_has_does_not_refresh() {
        let (mut store, clock) = store(10);
        set(&mut store, "key1", "value1");

        clock.advance(Duration::from_millis(800));
        assert!(store.has("key1"));

        clock.advance(Duration::from_millis(201));
        assert!(!store.has("key1"));
        assert!(!store.has("missing"));
    }

    #[test]
    fn test_store_lru_eviction() {
        let (mut store, _) = store(3);
        store.track_evictions(true);
        set(&mut store, "key1", "value1");
        set(&mut store, "key2", "value2");
        set(&mut store, "key3", "value3");
        set(&mut store, "key4", "value4");

        assert_eq!(store.len(), 3);
        assert!(store.get("key1").is_none());
        assert!(store.get("key4").is_some());
        assert_eq!(store.stats().evictions, 1);
        assert_eq!(
            store.drain_evicted(),
            vec![("key1".to_string(), EvictionReason::Capacity)]
        );
    }

    #[test]
    fn test_store_untracked_evictions_not_retained() {
        let (mut store, clock) = store(2);
        for i in 0..50 {
            set(&mut store, &format!("key{i}"), "value");
        }
        clock.advance(Duration::from_millis(1001));
        assert_eq!(store.size(), 0);

        assert_eq!(store.stats().evictions, 48);
        assert!(store.drain_evicted().is_empty());
    }

    #[test]
    fn test_store_get_protects_from_eviction() {
        let (mut store, clock) = store(3);
        set(&mut store, "key1", "value1");
        clock.advance(Duration::from_millis(10));
        set(&mut store, "key2", "value2");
        clock.advance(Duration::from_millis(10));
        set(&mut store, "key3", "value3");

        store.get("key1");
        set(&mut store, "key4", "value4");

        assert!(store.has("key1"));
        assert!(!store.has("key2"));
        assert!(store.has("key3"));
    }

    #[test]
    fn test_store_full_prefers_dropping_expired() {
        let (mut store, clock) = store(2);
        set(&mut store, "stale", "v");
        clock.advance(Duration::from_millis(900));
        set(&mut store, "fresh", "v");
        clock.advance(Duration::from_millis(200));

        set(&mut store, "new", "v");

        assert!(store.has("fresh"));
        assert!(store.has("new"));
        assert_eq!(store.stats().evictions, 0);
        assert_eq!(store.stats().expirations, 1);
    }

    #[test]
    fn test_store_zero_capacity_stores_nothing() {
        let (mut store, _) = store(0);
        set(&mut store, "key", "value");
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_size_purges_expired() {
        let (mut store, clock) = store(10);
        set(&mut store, "a", "1");
        set(&mut store, "b", "2");
        clock.advance(Duration::from_millis(600));
        set(&mut store, "c", "3");
        clock.advance(Duration::from_millis(600));

        assert_eq!(store.len(), 3);
        assert_eq!(store.size(), 1);
    }

    #[test]
    fn test_store_clear() {
        let (mut store, _) = store(10);
        set(&mut store, "a", "1");
        set(&mut store, "b", "2");

        assert_eq!(store.clear(), 2);
        assert_eq!(store.size(), 0);
        assert!(store.get("a").is_none());
    }

    #[test]
    fn test_store_stats() {
        let (mut store, _) = store(10);
        set(&mut store, "key1", "value1");
        store.get("key1");
        store.get("missing");

        let stats = store.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.size, 1);
        assert_eq!(stats.max_size, 10);
        assert_eq!(stats.ttl, Duration::from_millis(1000));
    }

    #[test]
    fn test_store_ttl_remaining() {
        let (mut store, clock) = store(10);
        set(&mut store, "key1", "value1");
        clock.advance(Duration::from_millis(300));

        assert_eq!(store.ttl_remaining("key1"), Some(Duration::from_millis(700)));
        assert_eq!(store.ttl_remaining("missing"), None);
    }
}
