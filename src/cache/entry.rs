//! Cache Entry Module
//!
//! Defines a single cache entry with idle-based expiry.

use std::time::{Duration, Instant};

// == Cache Entry ==
/// A stored value plus its access metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// When the value was written
    pub inserted_at: Instant,
    /// Last successful read or write; starts at `inserted_at`
    pub last_accessed: Instant,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates an entry written at `now`.
    pub fn new(value: V, now: Instant) -> Self {
        Self {
            value,
            inserted_at: now,
            last_accessed: now,
        }
    }

    // == Is Expired ==
    /// Checks whether the entry has been idle for longer than `ttl`.
    ///
    /// Boundary condition: an entry idle for exactly `ttl` is still live; it
    /// expires once the idle time strictly exceeds `ttl`.
    pub fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        self.idle(now) > ttl
    }

    // == Touch ==
    /// Restarts the idle window.
    pub fn touch(&mut self, now: Instant) {
        self.last_accessed = now;
    }

    /// Time since the last access.
    pub fn idle(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_accessed)
    }

    // == Time To Live ==
    /// Remaining idle time before expiry, zero once expired.
    pub fn ttl_remaining(&self, now: Instant, ttl: Duration) -> Duration {
        ttl.saturating_sub(self.idle(now))
    }
}
