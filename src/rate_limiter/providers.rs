//! Per-provider rate limit presets.

use std::time::Duration;

use tracing::debug;

use super::limiter::{RateLimiter, RateLimiterConfig};

/// Dedicated presets: (provider id, max requests, window seconds).
pub const PROVIDER_PRESETS: [(&str, usize, u64); 4] = [
    ("ccb", 100, 60),
    ("tithely", 120, 60),
    ("planningcenter", 100, 20),
    ("breeze", 150, 60),
];

/// Fallback for unknown providers: 60 requests per minute.
const DEFAULT_PRESET: (usize, u64) = (60, 60);

const PROVIDER_RETRY_ATTEMPTS: u32 = 3;
const PROVIDER_RETRY_DELAY: Duration = Duration::from_millis(1000);

/// Returns the preset for `provider_id`, matched case-insensitively.
///
/// Unknown ids get a conservative 60 requests per minute.
pub fn provider_config(provider_id: &str) -> RateLimiterConfig {
    let (max_requests, window_secs) = PROVIDER_PRESETS
        .iter()
        .find(|(id, _, _)| id.eq_ignore_ascii_case(provider_id))
        .map_or(DEFAULT_PRESET, |&(_, max, secs)| (max, secs));

    RateLimiterConfig::new(max_requests, Duration::from_secs(window_secs))
        .with_retry(PROVIDER_RETRY_ATTEMPTS, PROVIDER_RETRY_DELAY)
}

/// Provider ids with a dedicated preset.
pub fn known_providers() -> impl Iterator<Item = &'static str> {
    PROVIDER_PRESETS.iter().map(|(id, _, _)| *id)
}

/// Builds a limiter preset for `provider_id`, named after it.
pub fn create_provider_rate_limiter(provider_id: &str) -> RateLimiter {
    let config = provider_config(provider_id);
    debug!(
        provider = provider_id,
        max_requests = config.max_requests,
        window_secs = config.time_window.as_secs(),
        "Creating provider rate limiter"
    );
    RateLimiter::new(config).named(provider_id)
}
