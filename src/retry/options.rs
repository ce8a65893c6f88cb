//! Retry options and backoff schedule.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use crate::error::FaultKind;

/// Largest random extra wait, as a fraction of the backoff delay.
pub const JITTER_RATIO: f64 = 0.1;

/// Details handed to the `on_retry` callback before each wait.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryAttempt {
    /// The attempt that just failed, starting at 1
    pub attempt: u32,
    /// Wait before the next attempt
    pub delay: Duration,
    pub fault: FaultKind,
    /// Display form of the failure
    pub error: String,
}

pub type OnRetry = Arc<dyn Fn(&RetryAttempt) + Send + Sync>;

// == Retry Options ==
#[derive(Clone)]
pub struct RetryOptions {
    /// Total invocations, including the first
    pub max_attempts: u32,
    /// Wait after the first failure
    pub initial_delay: Duration,
    /// Upper bound on any single wait; uncapped when `None`
    pub max_delay: Option<Duration>,
    /// Growth factor between consecutive waits
    pub backoff_factor: f64,
    /// Adds up to `JITTER_RATIO` of each wait at random, before the cap
    pub jitter: bool,
    /// Overrides which fault kinds are retried
    pub retry_on: Option<Vec<FaultKind>>,
    pub on_retry: Option<OnRetry>,
}

impl RetryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = Some(delay);
        self
    }

    pub fn backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    pub fn jitter(mut self, enable: bool) -> Self {
        self.jitter = enable;
        self
    }

    /// Retries only the listed kinds instead of every transient one.
    pub fn retry_on(mut self, kinds: impl IntoIterator<Item = FaultKind>) -> Self {
        self.retry_on = Some(kinds.into_iter().collect());
        self
    }

    pub fn on_retry<F>(mut self, callback: F) -> Self
    where
        F: Fn(&RetryAttempt) + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(callback));
        self
    }

    pub fn is_retryable(&self, fault: FaultKind) -> bool {
        match &self.retry_on {
            Some(kinds) => kinds.contains(&fault),
            None => fault.is_retryable(),
        }
    }

    /// Wait between attempt `attempt` and `attempt + 1`:
    /// `min(initial_delay * factor^(attempt - 1), max_delay)`.
    ///
    /// With jitter on, the uncapped delay is first stretched by a random
    /// fraction in `[0, JITTER_RATIO)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let nanos = self.initial_delay.as_nanos() as f64 * self.backoff_factor.powi(exponent);
        let delay = if nanos.is_finite() && nanos < u64::MAX as f64 {
            Duration::from_nanos(nanos.round().max(0.0) as u64)
        } else {
            Duration::from_nanos(u64::MAX)
        };
        let delay = if self.jitter { add_jitter(delay) } else { delay };

        match self.max_delay {
            Some(cap) => delay.min(cap),
            None => delay,
        }
    }
}

fn add_jitter(base: Duration) -> Duration {
    let extra = base.as_secs_f64() * JITTER_RATIO * rand::thread_rng().gen::<f64>();
    base.saturating_add(Duration::try_from_secs_f64(extra).unwrap_or(Duration::ZERO))
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1000),
            max_delay: None,
            backoff_factor: 2.0,
            jitter: false,
            retry_on: None,
            on_retry: None,
        }
    }
}

impl fmt::Debug for RetryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryOptions")
            .field("max_attempts", &self.max_attempts)
            .field("initial_delay", &self.initial_delay)
            .field("max_delay", &self.max_delay)
            .field("backoff_factor", &self.backoff_factor)
            .field("jitter", &self.jitter)
            .field("retry_on", &self.retry_on)
            .field("on_retry", &self.on_retry.is_some())
            .finish()
    }
}
