//! Rate Limiter Module
//!
//! Sliding-window throttling of outbound calls with FIFO queueing, fixed-delay
//! retry of rate-limited failures and provider presets.

mod limiter;
mod providers;

pub use limiter::{RateLimiter, RateLimiterConfig};
pub use providers::{
    create_provider_rate_limiter, known_providers, provider_config, PROVIDER_PRESETS,
};
