//! Retry policy with exponential backoff
//!
//! Retries an async operation while its failures classify as transient,
//! waiting on the injected clock between attempts.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::clock::{system_clock, SharedClock};
use crate::error::{Classify, RetryError};
use crate::events::{millis, publish, EventKind, SharedEmitter};
use crate::retry::{RetryAttempt, RetryOptions};

// == Retry Policy ==
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    options: RetryOptions,
    clock: SharedClock,
    name: String,
    events: Option<SharedEmitter>,
}

impl RetryPolicy {
    /// Creates a policy on the system clock.
    pub fn new(options: RetryOptions) -> Self {
        Self::with_clock(options, system_clock())
    }

    pub fn with_clock(options: RetryOptions, clock: SharedClock) -> Self {
        Self {
            options,
            clock,
            name: "retry".to_string(),
            events: None,
        }
    }

    /// Publishes scheduled and exhausted retries on `emitter`, tagged with `name`.
    pub fn with_events(mut self, name: impl Into<String>, emitter: SharedEmitter) -> Self {
        self.name = name.into();
        self.events = Some(emitter);
        self
    }

    pub fn options(&self) -> &RetryOptions {
        &self.options
    }

    // == Retry ==
    /// Runs `op` until it succeeds, fails non-retryably, or runs out of attempts.
    pub async fn retry<T, E, F, Fut>(&self, op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + Display,
    {
        self.run(op, None).await
    }

    /// Like `retry`, but a fired `token` aborts the wait between attempts.
    pub async fn retry_cancellable<T, E, F, Fut>(
        &self,
        op: F,
        token: &CancelToken,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + Display,
    {
        self.run(op, Some(token)).await
    }

    // == Retry With Fallback ==
    /// Retries `primary`; if it finally fails, runs `fallback` once.
    ///
    /// Fallback errors are returned as-is.
    pub async fn retry_with_fallback<T, E, F, Fut, G, GFut, FE>(
        &self,
        primary: F,
        fallback: G,
    ) -> Result<T, FE>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + Display,
        G: FnOnce() -> GFut,
        GFut: Future<Output = Result<T, FE>>,
    {
        match self.retry(primary).await {
            Ok(value) => Ok(value),
            Err(err) => {
                warn!(policy = %self.name, error = %err, "Primary operation failed, attempting fallback");
                fallback().await
            }
        }
    }

    // == With Retry ==
    /// Wraps `f` into a function taking the same argument whose calls are retried.
    ///
    /// The argument is cloned for every attempt.
    pub fn with_retry<A, T, E, F, Fut>(
        &self,
        f: F,
    ) -> impl Fn(A) -> BoxFuture<'static, Result<T, RetryError<E>>> + Send + Sync
    where
        A: Clone + Send + Sync + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Classify + Display + Send + 'static,
    {
        let policy = self.clone();
        let f = Arc::new(f);
        move |args: A| {
            let policy = policy.clone();
            let f = Arc::clone(&f);
            let call: BoxFuture<'static, Result<T, RetryError<E>>> =
                Box::pin(async move { policy.retry(|| f(args.clone())).await });
            call
        }
    }

    async fn run<T, E, F, Fut>(
        &self,
        mut op: F,
        cancel: Option<&CancelToken>,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + Display,
    {
        let max_attempts = self.options.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let error = match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(policy = %self.name, attempts = attempt, "Operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            let fault = error.fault_kind();
            if !self.options.is_retryable(fault) {
                debug!(policy = %self.name, ?fault, error = %error, "Non-retryable error");
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last_error: error,
                });
            }

            if attempt >= max_attempts {
                warn!(
                    policy = %self.name,
                    attempts = attempt,
                    error = %error,
                    "Retry attempts exhausted"
                );
                publish(
                    self.events.as_ref(),
                    &self.name,
                    EventKind::RetryExhausted {
                        attempts: attempt,
                        fault,
                    },
                );
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last_error: error,
                });
            }

            let delay = self.options.delay_for(attempt);
            warn!(
                policy = %self.name,
                attempt,
                delay_ms = millis(delay),
                error = %error,
                "Attempt failed, retrying"
            );
            if let Some(on_retry) = &self.options.on_retry {
                on_retry(&RetryAttempt {
                    attempt,
                    delay,
                    fault,
                    error: error.to_string(),
                });
            }
            publish(
                self.events.as_ref(),
                &self.name,
                EventKind::RetryScheduled {
                    attempt,
                    delay_ms: millis(delay),
                    fault,
                },
            );

            match cancel {
                Some(token) => {
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => {
                            debug!(policy = %self.name, attempts = attempt, "Retry cancelled");
                            return Err(RetryError::Cancelled { attempts: attempt });
                        }
                        _ = self.clock.sleep(delay) => {}
                    }
                }
                None => self.clock.sleep(delay).await,
            }
            attempt += 1;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryOptions::default())
    }
}
