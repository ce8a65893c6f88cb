//! Expiry Sweep Task
//!
//! Lookups already drop expired entries lazily; the sweep reclaims the ones
//! nobody asks for again.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::Cache;
use crate::config::MIN_CLEANUP_INTERVAL;

/// Spawns a task that purges expired entries from `cache` every `interval`.
///
/// Intervals shorter than `MIN_CLEANUP_INTERVAL` are raised to it. The task
/// loops until aborted through the returned handle.
///
/// # Example
/// ```ignore
/// let cache = Arc::new(Cache::new(CacheConfig::default()));
/// let sweeper = spawn_cleanup_task(Arc::clone(&cache), Duration::from_secs(60));
/// // Later, during shutdown:
/// sweeper.abort();
/// ```
pub fn spawn_cleanup_task<V>(cache: Arc<Cache<V>>, interval: Duration) -> JoinHandle<()>
where
    V: Clone + Send + 'static,
{
    let interval = interval.max(MIN_CLEANUP_INTERVAL);

    tokio::spawn(async move {
        info!(
            interval_secs = interval.as_secs_f64(),
            "Starting cache cleanup task"
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = cache.cleanup_expired();
            if removed > 0 {
                info!(removed, "Cache cleanup: removed expired entries");
            } else {
                debug!("Cache cleanup: no expired entries found");
            }
        }
    })
}
