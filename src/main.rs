//! Resilience Kit demo
//!
//! Simulates a church-management-system sync: a flaky people API is throttled
//! by a rate limiter, retried with backoff, and its pages are cached. Every
//! resilience event is logged as JSON.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use resilience_kit::events::{
    CACHE_CLEARED, CACHE_EVICTED, RATE_LIMIT_ENGAGED, RATE_LIMIT_RETRY, RETRY_EXHAUSTED,
    RETRY_SCHEDULED,
};
use resilience_kit::{
    provider_config, spawn_cleanup_task, Cache, ClientError, Config, EventEmitter,
    RateLimiter, RateLimiterConfig, ResilienceEvent, RetryPolicy, SharedEmitter,
};

const PROVIDER: &str = "planningcenter";
const PAGES: u32 = 4;

#[derive(Debug, Clone, Serialize)]
struct Person {
    id: u32,
    name: String,
}

/// People API that fails on a fixed schedule.
#[derive(Debug, Default)]
struct SimulatedChms {
    requests: AtomicU32,
}

impl SimulatedChms {
    async fn fetch_people(&self, page: u32) -> Result<Vec<Person>, ClientError> {
        let n = self.requests.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;

        match n {
            1 => Err(ClientError::from_status(503, "Service Unavailable")),
            3 => Err(ClientError::from_status(429, "Too Many Requests")),
            _ => Ok((1..=3)
                .map(|i| Person {
                    id: page * 100 + i,
                    name: format!("Member {page}-{i}"),
                })
                .collect()),
        }
    }
}

fn log_events(emitter: &EventEmitter<ResilienceEvent>) {
    for name in [
        CACHE_EVICTED,
        CACHE_CLEARED,
        RETRY_SCHEDULED,
        RETRY_EXHAUSTED,
        RATE_LIMIT_ENGAGED,
        RATE_LIMIT_RETRY,
    ] {
        emitter.on(name, |event: &ResilienceEvent| {
            match serde_json::to_string(event) {
                Ok(json) => info!(event = %json, "Resilience event"),
                Err(e) => warn!(error = %e, "Failed to serialize event"),
            }
        });
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "resilience_kit=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!(?config, "Configuration loaded");

    let emitter: SharedEmitter = Arc::new(EventEmitter::new());
    log_events(&emitter);

    let cache: Arc<Cache<Vec<Person>>> =
        Arc::new(Cache::new(config.cache_config()).with_events("people", Arc::clone(&emitter)));
    let cleanup_handle = spawn_cleanup_task(Arc::clone(&cache), config.cleanup_interval());

    let preset = provider_config(PROVIDER);
    info!(
        provider = PROVIDER,
        max_requests = preset.max_requests,
        window_secs = preset.time_window.as_secs(),
        "Provider preset"
    );

    // Tighter than the preset so the demo shows queueing
    let limiter = RateLimiter::new(
        RateLimiterConfig::new(2, Duration::from_secs(1))
            .with_retry(3, Duration::from_millis(250)),
    )
    .with_events(PROVIDER, Arc::clone(&emitter));
    let client = limiter.wrap_client(SimulatedChms::default());

    let policy = RetryPolicy::new(config.retry_options()).with_events("sync", Arc::clone(&emitter));

    for pass in 1..=2 {
        info!(pass, "Starting sync pass");
        for page in 1..=PAGES {
            let key = format!("people:page:{page}");
            if let Some(people) = cache.get(&key) {
                info!(page, count = people.len(), "Served page from cache");
                continue;
            }

            let people = policy
                .retry(|| client.call_labeled("fetch_people", move |api| api.fetch_people(page)))
                .await?;
            info!(page, count = people.len(), "Fetched page");
            cache.set(key, people);
        }
    }

    info!(
        requests = client.inner().requests.load(Ordering::SeqCst),
        "Sync finished"
    );
    info!(stats = %serde_json::to_string(&cache.get_stats())?, "Cache statistics");

    cleanup_handle.abort();
    Ok(())
}
