//! Sliding-window rate limiter.
//!
//! Start instants of admitted calls are kept in a log; a call is admitted once
//! fewer than `max_requests` starts fall inside the trailing `time_window`.
//! Admission is serialized by a fair async mutex, so queued calls are
//! released in submission order.

use std::collections::VecDeque;
use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::client::RateLimitedClient;
use crate::clock::{system_clock, SharedClock};
use crate::error::{Classify, RateLimitError};
use crate::events::{millis, publish, EventKind, SharedEmitter};

const DEFAULT_LABEL: &str = "API call";
const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1000);

// == Config ==
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimiterConfig {
    /// Starts allowed per window
    pub max_requests: usize,
    /// Length of the trailing window
    pub time_window: Duration,
    /// Total attempts for rate-limited failures; no retry when `None`
    pub retry_attempts: Option<u32>,
    /// Fixed wait between those attempts (1s when unset)
    pub retry_delay: Option<Duration>,
}

impl RateLimiterConfig {
    pub fn new(max_requests: usize, time_window: Duration) -> Self {
        Self {
            max_requests,
            time_window,
            retry_attempts: None,
            retry_delay: None,
        }
    }

    pub fn with_retry(mut self, attempts: u32, delay: Duration) -> Self {
        self.retry_attempts = Some(attempts);
        self.retry_delay = Some(delay);
        self
    }

    fn attempts(&self) -> u32 {
        self.retry_attempts.unwrap_or(1).max(1)
    }

    fn retry_delay(&self) -> Duration {
        self.retry_delay.unwrap_or(DEFAULT_RETRY_DELAY)
    }

    fn capacity(&self) -> usize {
        self.max_requests.max(1)
    }
}

#[derive(Debug, Default)]
struct WindowState {
    /// Start instants inside the current window, oldest first
    starts: Mutex<VecDeque<Instant>>,
    /// FIFO admission gate
    gate: tokio::sync::Mutex<()>,
    /// Calls waiting for admission
    queued: AtomicUsize,
}

/// Suspension point of a throttled call.
#[derive(Debug, Clone, Copy)]
enum Wait {
    /// Waiting for a window slot
    Admission,
    /// Fixed pause before retrying a rate-limited failure
    Backoff(Duration),
}

/// Decrements the queue gauge however admission ends.
struct QueuedGuard<'a>(&'a AtomicUsize);

impl Drop for QueuedGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

// == Rate Limiter ==
/// Throttles operation starts per rolling window.
///
/// Clones share the same window and queue.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimiterConfig,
    name: String,
    clock: SharedClock,
    events: Option<SharedEmitter>,
    state: Arc<WindowState>,
}

impl RateLimiter {
    /// Creates a limiter on the system clock.
    pub fn new(config: RateLimiterConfig) -> Self {
        Self::with_clock(config, system_clock())
    }

    pub fn with_clock(config: RateLimiterConfig, clock: SharedClock) -> Self {
        Self {
            config,
            name: "rate_limiter".to_string(),
            clock,
            events: None,
            state: Arc::new(WindowState::default()),
        }
    }

    /// Names the limiter in logs and events.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Publishes throttling events on `emitter` under `name`.
    pub fn with_events(mut self, name: impl Into<String>, emitter: SharedEmitter) -> Self {
        self.name = name.into();
        self.events = Some(emitter);
        self
    }

    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Calls currently waiting for a slot.
    pub fn queued(&self) -> usize {
        self.state.queued.load(Ordering::SeqCst)
    }

    /// Starts inside the trailing window as of now.
    pub fn in_window(&self) -> usize {
        let mut starts = self.state.starts.lock();
        self.prune(&mut starts, self.clock.now());
        starts.len()
    }

    // == Execute ==
    /// Runs `op` once a window slot is free.
    ///
    /// Rate-limited failures are retried per the config; any other failure,
    /// or the last rate-limited one, is returned unchanged.
    pub async fn execute<T, E, F, Fut>(&self, op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + Display,
    {
        self.execute_labeled(DEFAULT_LABEL, op).await
    }

    /// `execute` with a caller-supplied label for log lines.
    pub async fn execute_labeled<T, E, F, Fut>(&self, label: &str, op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + Display,
    {
        self.run(
            label,
            move |wait| async move {
                self.wait(label, wait).await;
                Ok(())
            },
            |err| err,
            op,
        )
        .await
    }

    /// Like `execute`, but a fired `token` abandons the call while it is
    /// still waiting for a slot or pausing before a retry.
    pub async fn execute_cancellable<T, E, F, Fut>(
        &self,
        op: F,
        token: &CancelToken,
    ) -> Result<T, RateLimitError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + Display,
    {
        self.run(
            DEFAULT_LABEL,
            move |wait| async move {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        debug!(limiter = %self.name, ?wait, "Queued call cancelled");
                        Err(RateLimitError::Cancelled)
                    }
                    _ = self.wait(DEFAULT_LABEL, wait) => Ok(()),
                }
            },
            RateLimitError::Operation,
            op,
        )
        .await
    }

    // == Wrap Client ==
    /// Decorates `client` so calls routed through it share this limiter.
    pub fn wrap_client<C>(&self, client: C) -> RateLimitedClient<C> {
        RateLimitedClient::new(client, self.clone())
    }

    /// Attempt loop; every suspension goes through `pause`.
    async fn run<T, E, R, F, Fut, A, AFut>(
        &self,
        label: &str,
        mut pause: A,
        wrap: fn(E) -> R,
        mut op: F,
    ) -> Result<T, R>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + Display,
        A: FnMut(Wait) -> AFut,
        AFut: Future<Output = Result<(), R>>,
    {
        let attempts = self.config.attempts();
        let mut attempt = 1;

        loop {
            pause(Wait::Admission).await?;

            let error = match op().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            if !error.fault_kind().is_rate_limit() || attempt >= attempts {
                return Err(wrap(error));
            }

            let delay = self.config.retry_delay();
            warn!(
                limiter = %self.name,
                label,
                attempt,
                delay_ms = millis(delay),
                error = %error,
                "Rate limit exceeded, retrying"
            );
            publish(
                self.events.as_ref(),
                &self.name,
                EventKind::RateLimitRetry {
                    attempt,
                    delay_ms: millis(delay),
                },
            );
            pause(Wait::Backoff(delay)).await?;
            attempt += 1;
        }
    }

    async fn wait(&self, label: &str, wait: Wait) {
        match wait {
            Wait::Admission => self.admit(label).await,
            Wait::Backoff(delay) => self.clock.sleep(delay).await,
        }
    }

    /// Waits for a slot and records the start.
    async fn admit(&self, label: &str) {
        self.state.queued.fetch_add(1, Ordering::SeqCst);
        let _queued = QueuedGuard(&self.state.queued);
        let _gate = self.state.gate.lock().await;

        loop {
            let wait = {
                let mut starts = self.state.starts.lock();
                let now = self.clock.now();
                self.prune(&mut starts, now);

                if starts.len() < self.config.capacity() {
                    starts.push_back(now);
                    return;
                }
                starts
                    .front()
                    .map(|oldest| (*oldest + self.config.time_window).saturating_duration_since(now))
                    .unwrap_or_default()
            };

            let queued = self.queued();
            info!(
                limiter = %self.name,
                label,
                wait_ms = millis(wait),
                queued,
                "Rate limit reached, waiting for window"
            );
            publish(
                self.events.as_ref(),
                &self.name,
                EventKind::RateLimitEngaged {
                    wait_ms: millis(wait),
                    queued,
                },
            );
            self.clock.sleep(wait).await;
        }
    }

    fn prune(&self, starts: &mut VecDeque<Instant>, now: Instant) {
        while let Some(oldest) = starts.front() {
            if now.saturating_duration_since(*oldest) >= self.config.time_window {
                starts.pop_front();
            } else {
                break;
            }
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    use crate::clock::ManualClock;
    use crate::error::{ClientError, FaultKind};

    fn ok_op(calls: &Arc<AtomicU32>) -> impl FnMut() -> futures::future::Ready<Result<u32, ClientError>> {
        let calls = Arc::clone(calls);
        move || futures::future::ready(Ok(calls.fetch_add(1, Ordering::SeqCst) + 1))
    }

    fn failing_op(
        calls: &Arc<AtomicU32>,
        error: ClientError,
        failures: u32,
    ) -> impl FnMut() -> futures::future::Ready<Result<&'static str, ClientError>> {
        let calls = Arc::clone(calls);
        move || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            futures::future::ready(if n < failures {
                Err(error.clone())
            } else {
                Ok("success")
            })
        }
    }

    fn limiter(config: RateLimiterConfig) -> (RateLimiter, ManualClock) {
        let clock = ManualClock::new();
        (RateLimiter::with_clock(config, Arc::new(clock.clone())), clock)
    }

    #[tokio::test]
    async fn test_allows_requests_within_limit() {
        let (limiter, clock) = limiter(RateLimiterConfig::new(2, Duration::from_millis(1000)));
        let calls = Arc::new(AtomicU32::new(0));

        limiter.execute(ok_op(&calls)).await.unwrap();
        limiter.execute(ok_op(&calls)).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(clock.sleeps().is_empty());
        assert_eq!(limiter.in_window(), 2);
    }

    #[tokio::test]
    async fn test_third_request_waits_for_window() {
        let (limiter, clock) = limiter(RateLimiterConfig::new(2, Duration::from_millis(1000)));
        let calls = Arc::new(AtomicU32::new(0));

        limiter.execute(ok_op(&calls)).await.unwrap();
        clock.advance(Duration::from_millis(300));
        limiter.execute(ok_op(&calls)).await.unwrap();
        limiter.execute(ok_op(&calls)).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(clock.sleeps(), vec![Duration::from_millis(700)]);
        assert_eq!(clock.elapsed(), Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_window_slides() {
        let (limiter, clock) = limiter(RateLimiterConfig::new(2, Duration::from_millis(1000)));
        let calls = Arc::new(AtomicU32::new(0));

        limiter.execute(ok_op(&calls)).await.unwrap();
        clock.advance(Duration::from_millis(600));
        limiter.execute(ok_op(&calls)).await.unwrap();
        clock.advance(Duration::from_millis(400));

        // first start left the window exactly now
        limiter.execute(ok_op(&calls)).await.unwrap();
        assert!(clock.sleeps().is_empty());
        assert_eq!(limiter.in_window(), 2);
    }

    #[tokio::test]
    async fn test_retries_rate_limited_failures() {
        let (limiter, clock) = limiter(
            RateLimiterConfig::new(10, Duration::from_millis(1000))
                .with_retry(3, Duration::from_millis(1000)),
        );
        let calls = Arc::new(AtomicU32::new(0));

        let result = limiter
            .execute(failing_op(&calls, ClientError::rate_limited("rate limit"), 2))
            .await
            .unwrap();

        assert_eq!(result, "success");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            clock.sleeps(),
            vec![Duration::from_millis(1000), Duration::from_millis(1000)]
        );
    }

    #[tokio::test]
    async fn test_gives_up_after_retry_attempts() {
        let (limiter, _) = limiter(
            RateLimiterConfig::new(10, Duration::from_millis(1000))
                .with_retry(2, Duration::from_millis(1000)),
        );
        let calls = Arc::new(AtomicU32::new(0));

        let err = limiter
            .execute(failing_op(&calls, ClientError::rate_limited("rate limit"), 10))
            .await
            .unwrap_err();

        assert_eq!(err.kind, FaultKind::RateLimited);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_other_failures_not_retried() {
        let (limiter, _) = limiter(
            RateLimiterConfig::new(10, Duration::from_millis(1000))
                .with_retry(3, Duration::from_millis(1000)),
        );
        let calls = Arc::new(AtomicU32::new(0));

        let err = limiter
            .execute(failing_op(&calls, ClientError::new(FaultKind::TimedOut, "timeout"), 10))
            .await
            .unwrap_err();

        assert_eq!(err.kind, FaultKind::TimedOut);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_retry_without_config() {
        let (limiter, _) = limiter(RateLimiterConfig::new(10, Duration::from_millis(1000)));
        let calls = Arc::new(AtomicU32::new(0));

        let _ = limiter
            .execute(failing_op(&calls, ClientError::rate_limited("429"), 10))
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_attempts_consume_window_slots() {
        let (limiter, clock) = limiter(
            RateLimiterConfig::new(2, Duration::from_millis(1000))
                .with_retry(3, Duration::from_millis(100)),
        );
        let calls = Arc::new(AtomicU32::new(0));

        limiter
            .execute(failing_op(&calls, ClientError::rate_limited("429"), 2))
            .await
            .unwrap();

        // two starts at t=0 and t=100, third admitted once t=0 leaves the window
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(clock.elapsed(), Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_queued_calls_release_in_fifo_order() {
        let limiter = RateLimiter::new(RateLimiterConfig::new(1, Duration::from_millis(100)));
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for i in 0..5 {
            let limiter = limiter.clone();
            let order = Arc::clone(&order);
            handles.push(tokio::spawn(async move {
                limiter
                    .execute(|| {
                        order.lock().push(i);
                        async { Ok::<_, ClientError>(()) }
                    })
                    .await
            }));
            tokio::task::yield_now().await;
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(*order.lock(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_invariant_under_concurrency() {
        let window = Duration::from_millis(1000);
        let limiter = RateLimiter::new(RateLimiterConfig::new(3, window));
        let starts = Arc::new(Mutex::new(Vec::new()));

        let handles: Vec<_> = (0..12)
            .map(|_| {
                let limiter = limiter.clone();
                let starts = Arc::clone(&starts);
                tokio::spawn(async move {
                    limiter
                        .execute(|| {
                            starts.lock().push(tokio::time::Instant::now());
                            async { Ok::<_, ClientError>(()) }
                        })
                        .await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let starts = starts.lock();
        assert_eq!(starts.len(), 12);
        for (i, start) in starts.iter().enumerate() {
            let in_window = starts[i..]
                .iter()
                .filter(|later| later.duration_since(*start) < window)
                .count();
            assert!(in_window <= 3, "{in_window} starts inside one window");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_queued_call() {
        let limiter = RateLimiter::new(RateLimiterConfig::new(1, Duration::from_secs(60)));
        let calls = Arc::new(AtomicU32::new(0));
        limiter.execute(ok_op(&calls)).await.unwrap();

        let token = CancelToken::new();
        let queued = {
            let limiter = limiter.clone();
            let token = token.clone();
            let calls = Arc::clone(&calls);
            tokio::spawn(async move { limiter.execute_cancellable(ok_op(&calls), &token).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(limiter.queued(), 1);

        token.cancel();
        let err = queued.await.unwrap().unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(limiter.queued(), 0);
        assert_eq!(limiter.in_window(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_retry_backoff() {
        let limiter = RateLimiter::new(
            RateLimiterConfig::new(10, Duration::from_secs(1))
                .with_retry(3, Duration::from_secs(30)),
        );
        let calls = Arc::new(AtomicU32::new(0));
        let token = CancelToken::new();
        let started = tokio::time::Instant::now();

        let pending = {
            let limiter = limiter.clone();
            let token = token.clone();
            let calls = Arc::clone(&calls);
            tokio::spawn(async move {
                limiter
                    .execute_cancellable(
                        failing_op(&calls, ClientError::rate_limited("429"), u32::MAX),
                        &token,
                    )
                    .await
            })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;
        token.cancel();
        let err = pending.await.unwrap().unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() < Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_cancellable_passes_operation_errors_through() {
        let (limiter, _) = limiter(RateLimiterConfig::new(5, Duration::from_secs(1)));
        let calls = Arc::new(AtomicU32::new(0));
        let token = CancelToken::new();

        let err = limiter
            .execute_cancellable(failing_op(&calls, ClientError::permanent("bad"), 1), &token)
            .await
            .unwrap_err();

        assert_eq!(
            err.into_operation_error().map(|e| e.kind),
            Some(FaultKind::Permanent)
        );
    }

    #[tokio::test]
    async fn test_throttle_events_published() {
        use crate::events::{EventEmitter, ResilienceEvent, RATE_LIMIT_ENGAGED};

        let emitter: SharedEmitter = Arc::new(EventEmitter::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        emitter.on(RATE_LIMIT_ENGAGED, move |event: &ResilienceEvent| {
            sink.lock().push((event.source.clone(), event.kind.clone()));
        });

        let (limiter, _) = limiter(RateLimiterConfig::new(1, Duration::from_millis(500)));
        let limiter = limiter.with_events("breeze", emitter);
        let calls = Arc::new(AtomicU32::new(0));
        limiter.execute(ok_op(&calls)).await.unwrap();
        limiter.execute(ok_op(&calls)).await.unwrap();

        assert_eq!(
            *seen.lock(),
            vec![(
                "breeze".to_string(),
                EventKind::RateLimitEngaged {
                    wait_ms: 500,
                    queued: 1
                }
            )]
        );
    }
}
