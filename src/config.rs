//! Configuration Module
//!
//! Loads default settings for the primitives from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::CacheConfig;
use crate::retry::RetryOptions;

/// Floor for the expiry sweep interval; zero would spin the task.
pub const MIN_CLEANUP_INTERVAL: Duration = Duration::from_millis(1);

/// Toolkit defaults.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Maximum number of entries a cache holds
    pub cache_max_size: usize,
    /// Idle time in milliseconds after which a cache entry expires
    pub cache_ttl_ms: u64,
    /// Total attempts per retried operation
    pub retry_max_attempts: u32,
    /// First retry wait in milliseconds
    pub retry_initial_delay_ms: u64,
    /// Upper bound on a retry wait; uncapped when `None`
    pub retry_max_delay_ms: Option<u64>,
    /// Randomize retry waits by up to 10%
    pub retry_jitter: bool,
    /// Background expiry sweep interval in seconds
    pub cleanup_interval_secs: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_MAX_SIZE` - Maximum cache entries (default: 1000)
    /// - `CACHE_TTL_MS` - Idle expiry in milliseconds (default: 300000)
    /// - `RETRY_MAX_ATTEMPTS` - Attempts per operation (default: 3)
    /// - `RETRY_INITIAL_DELAY_MS` - First backoff wait (default: 1000)
    /// - `RETRY_MAX_DELAY_MS` - Backoff cap (default: none)
    /// - `RETRY_JITTER` - Randomize backoff, `true`/`false` (default: false)
    /// - `CLEANUP_INTERVAL_SECS` - Expiry sweep frequency (default: 60)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            cache_max_size: parse_var("CACHE_MAX_SIZE").unwrap_or(defaults.cache_max_size),
            cache_ttl_ms: parse_var("CACHE_TTL_MS").unwrap_or(defaults.cache_ttl_ms),
            retry_max_attempts: parse_var("RETRY_MAX_ATTEMPTS")
                .unwrap_or(defaults.retry_max_attempts),
            retry_initial_delay_ms: parse_var("RETRY_INITIAL_DELAY_MS")
                .unwrap_or(defaults.retry_initial_delay_ms),
            retry_max_delay_ms: parse_var("RETRY_MAX_DELAY_MS").or(defaults.retry_max_delay_ms),
            retry_jitter: parse_var("RETRY_JITTER").unwrap_or(defaults.retry_jitter),
            cleanup_interval_secs: parse_var("CLEANUP_INTERVAL_SECS")
                .unwrap_or(defaults.cleanup_interval_secs),
        }
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new(self.cache_max_size, Duration::from_millis(self.cache_ttl_ms))
    }

    pub fn retry_options(&self) -> RetryOptions {
        let options = RetryOptions::new()
            .max_attempts(self.retry_max_attempts)
            .initial_delay(Duration::from_millis(self.retry_initial_delay_ms))
            .jitter(self.retry_jitter);
        match self.retry_max_delay_ms {
            Some(cap) => options.max_delay(Duration::from_millis(cap)),
            None => options,
        }
    }

    /// Sweep interval, never shorter than `MIN_CLEANUP_INTERVAL`.
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs).max(MIN_CLEANUP_INTERVAL)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_max_size: 1000,
            cache_ttl_ms: 300_000,
            retry_max_attempts: 3,
            retry_initial_delay_ms: 1000,
            retry_max_delay_ms: None,
            retry_jitter: false,
            cleanup_interval_secs: 60,
        }
    }
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
