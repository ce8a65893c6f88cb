//! Retry Module
//!
//! Classification-driven retry with exponential backoff. `RetryPolicy` carries
//! options, clock and event sink; the free functions below run on the system
//! clock for one-off use.

mod options;
mod policy;

use std::fmt::Display;
use std::future::Future;

use futures::future::BoxFuture;

use crate::client::RetryableClient;
use crate::error::{Classify, RetryError};

pub use options::{OnRetry, RetryAttempt, RetryOptions, JITTER_RATIO};
pub use policy::RetryPolicy;

/// Retries `op` according to `options`.
pub async fn retry<T, E, F, Fut>(op: F, options: RetryOptions) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Classify + Display,
{
    RetryPolicy::new(options).retry(op).await
}

/// Retries `primary`, then falls back to `fallback` once if it still fails.
pub async fn retry_with_fallback<T, E, F, Fut, G, GFut, FE>(
    primary: F,
    fallback: G,
    options: RetryOptions,
) -> Result<T, FE>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Classify + Display,
    G: FnOnce() -> GFut,
    GFut: Future<Output = Result<T, FE>>,
{
    RetryPolicy::new(options)
        .retry_with_fallback(primary, fallback)
        .await
}

/// Wraps `f` so every call is retried.
pub fn with_retry<A, T, E, F, Fut>(
    f: F,
    options: RetryOptions,
) -> impl Fn(A) -> BoxFuture<'static, Result<T, RetryError<E>>> + Send + Sync
where
    A: Clone + Send + Sync + 'static,
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Classify + Display + Send + 'static,
{
    RetryPolicy::new(options).with_retry(f)
}

/// Decorates `client` so calls routed through it are retried.
pub fn create_retryable_client<C>(client: C, options: RetryOptions) -> RetryableClient<C> {
    RetryableClient::new(client, RetryPolicy::new(options))
}
