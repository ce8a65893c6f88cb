//! Client Decorators
//!
//! Wrap an integration client so every call routed through `call` is retried
//! or throttled. Plain fields and methods stay reachable through `inner()`.

use std::fmt::Display;
use std::future::Future;

use crate::cancel::CancelToken;
use crate::error::{Classify, RateLimitError, RetryError};
use crate::rate_limiter::RateLimiter;
use crate::retry::RetryPolicy;

// == Retryable Client ==
/// Client whose calls are retried with a shared policy.
#[derive(Debug, Clone)]
pub struct RetryableClient<C> {
    inner: C,
    policy: RetryPolicy,
}

impl<C> RetryableClient<C> {
    // == Constructor ==
    /// Wraps `inner`; see also `retry::create_retryable_client`.
    pub fn new(inner: C, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// Undecorated access to the wrapped client.
    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn into_inner(self) -> C {
        self.inner
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    // == Call ==
    /// Invokes `f` on the wrapped client under the retry policy.
    ///
    /// `f` is called once per attempt, e.g. `client.call(|c| c.fetch_people())`.
    pub async fn call<'a, T, E, F, Fut>(&'a self, mut f: F) -> Result<T, RetryError<E>>
    where
        F: FnMut(&'a C) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + Display,
    {
        let inner = &self.inner;
        self.policy.retry(|| f(inner)).await
    }
}

// == Rate Limited Client ==
/// Client whose calls share one rate limiter window.
#[derive(Debug, Clone)]
pub struct RateLimitedClient<C> {
    inner: C,
    limiter: RateLimiter,
}

impl<C> RateLimitedClient<C> {
    // == Constructor ==
    /// Wraps `inner`; usually built through `RateLimiter::wrap_client`.
    pub fn new(inner: C, limiter: RateLimiter) -> Self {
        Self { inner, limiter }
    }

    /// Undecorated access to the wrapped client.
    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn into_inner(self) -> C {
        self.inner
    }

    /// The shared limiter; clones of it throttle the same window.
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    // == Call ==
    /// Invokes `f` on the wrapped client once a window slot is free.
    pub async fn call<'a, T, E, F, Fut>(&'a self, mut f: F) -> Result<T, E>
    where
        F: FnMut(&'a C) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + Display,
    {
        let inner = &self.inner;
        self.limiter.execute(|| f(inner)).await
    }

    /// `call` with a label used in throttling log lines.
    pub async fn call_labeled<'a, T, E, F, Fut>(&'a self, label: &str, mut f: F) -> Result<T, E>
    where
        F: FnMut(&'a C) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + Display,
    {
        let inner = &self.inner;
        self.limiter.execute_labeled(label, || f(inner)).await
    }

    /// `call` that gives up once `token` fires while the call is queued or
    /// pausing before a retry.
    pub async fn call_cancellable<'a, T, E, F, Fut>(
        &'a self,
        mut f: F,
        token: &CancelToken,
    ) -> Result<T, RateLimitError<E>>
    where
        F: FnMut(&'a C) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + Display,
    {
        let inner = &self.inner;
        self.limiter.execute_cancellable(|| f(inner), token).await
    }
}
