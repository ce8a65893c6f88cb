//! Resilience Kit - Client resilience primitives for third-party API integrations
//!
//! Provides an idle-expiring LRU cache, exponential retry, sliding-window rate
//! limiting and a failure-isolating event bus, all driven by an injectable clock.

pub mod cache;
pub mod cancel;
pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod rate_limiter;
pub mod retry;
pub mod tasks;

pub use cache::{Cache, CacheConfig, CacheStats};
pub use cancel::CancelToken;
pub use client::{RateLimitedClient, RetryableClient};
pub use clock::{Clock, ManualClock, SharedClock, TokioClock};
pub use config::Config;
pub use error::{Classify, ClientError, FaultKind, RateLimitError, RetryError};
pub use events::{EventEmitter, EventKind, ListenerId, ResilienceEvent, SharedEmitter};
pub use rate_limiter::{
    create_provider_rate_limiter, provider_config, RateLimiter, RateLimiterConfig,
};
pub use retry::{
    create_retryable_client, retry, retry_with_fallback, with_retry, RetryOptions, RetryPolicy,
};
pub use tasks::spawn_cleanup_task;
