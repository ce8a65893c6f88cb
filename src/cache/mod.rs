//! Cache Module
//!
//! Bounded in-memory cache with idle-based expiry and LRU eviction, used to
//! memoize idempotent, read-heavy integration results.

mod entry;
mod handle;
mod lru;
mod stats;
mod store;


// Re-export public types
pub use entry::CacheEntry;
pub use handle::Cache;
pub use lru::LruTracker;
pub use stats::CacheStats;
pub use store::{CacheConfig, CacheStore};
