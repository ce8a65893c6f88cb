//! Events Module
//!
//! Generic event emitter plus the state-change events the toolkit publishes
//! (cache evictions, scheduled retries, throttling).

mod emitter;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::FaultKind;

pub use emitter::{EventEmitter, ListenerId};

// == Event Names ==
pub const CACHE_EVICTED: &str = "cache:evicted";
pub const CACHE_CLEARED: &str = "cache:cleared";
pub const RETRY_SCHEDULED: &str = "retry:scheduled";
pub const RETRY_EXHAUSTED: &str = "retry:exhausted";
pub const RATE_LIMIT_ENGAGED: &str = "rate_limit:engaged";
pub const RATE_LIMIT_RETRY: &str = "rate_limit:retry";

/// Emitter carrying toolkit events, shared between components and subscribers.
pub type SharedEmitter = Arc<EventEmitter<ResilienceEvent>>;

// == Eviction Reason ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionReason {
    /// Removed to make room for a new key
    Capacity,
    /// Idle longer than the TTL
    Expired,
}

// == Event Kind ==
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    CacheEvicted {
        key: String,
        reason: EvictionReason,
    },
    CacheCleared {
        removed: usize,
    },
    RetryScheduled {
        attempt: u32,
        delay_ms: u64,
        fault: FaultKind,
    },
    RetryExhausted {
        attempts: u32,
        fault: FaultKind,
    },
    RateLimitEngaged {
        wait_ms: u64,
        queued: usize,
    },
    RateLimitRetry {
        attempt: u32,
        delay_ms: u64,
    },
}

impl EventKind {
    /// Event name the kind is emitted under.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::CacheEvicted { .. } => CACHE_EVICTED,
            EventKind::CacheCleared { .. } => CACHE_CLEARED,
            EventKind::RetryScheduled { .. } => RETRY_SCHEDULED,
            EventKind::RetryExhausted { .. } => RETRY_EXHAUSTED,
            EventKind::RateLimitEngaged { .. } => RATE_LIMIT_ENGAGED,
            EventKind::RateLimitRetry { .. } => RATE_LIMIT_RETRY,
        }
    }
}

// == Resilience Event ==
/// A state change published by a toolkit component.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResilienceEvent {
    /// Name of the component instance (cache name, limiter label, ...)
    pub source: String,
    /// Wall-clock time of publication
    pub occurred_at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl ResilienceEvent {
    pub fn new(source: impl Into<String>, kind: EventKind) -> Self {
        Self {
            source: source.into(),
            occurred_at: Utc::now(),
            kind,
        }
    }
}

/// Publishes `kind` on `emitter` if one is attached.
pub(crate) fn publish(emitter: Option<&SharedEmitter>, source: &str, kind: EventKind) {
    if let Some(emitter) = emitter {
        let event = ResilienceEvent::new(source, kind);
        emitter.emit(event.kind.name(), &event);
    }
}

pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_publish_routes_by_kind_name() {
        let emitter: SharedEmitter = Arc::new(EventEmitter::new());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        emitter.on(CACHE_EVICTED, move |event: &ResilienceEvent| {
            sink.lock().push(event.clone());
        });

        publish(
            Some(&emitter),
            "people",
            EventKind::CacheEvicted {
                key: "household:42".to_string(),
                reason: EvictionReason::Capacity,
            },
        );
        publish(Some(&emitter), "people", EventKind::CacheCleared { removed: 3 });
        publish(None, "people", EventKind::CacheCleared { removed: 1 });

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].source, "people");
    }

    #[test]
    fn test_event_serializes_flat() {
        let event = ResilienceEvent::new(
            "ccb",
            EventKind::RetryScheduled {
                attempt: 2,
                delay_ms: 2000,
                fault: FaultKind::TimedOut,
            },
        );

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["source"], "ccb");
        assert_eq!(json["type"], "retry_scheduled");
        assert_eq!(json["attempt"], 2);
        assert_eq!(json["delay_ms"], 2000);
        assert!(json.get("occurred_at").is_some());
    }
}
