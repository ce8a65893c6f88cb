//! Event Emitter Module
//!
//! Synchronous named-event pub/sub. Each listener runs inside its own panic
//! boundary, so a faulty subscriber never blocks delivery to the others or
//! unwinds into the publisher.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error};

type Callback<A> = Arc<dyn Fn(&A) + Send + Sync>;

// == Listener Id ==
/// Handle returned on registration, used to unregister a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Listener<A> {
    id: ListenerId,
    callback: Callback<A>,
    once: bool,
}

// == Event Emitter ==
/// Named-event dispatcher carrying payloads of type `A`.
pub struct EventEmitter<A> {
    /// Listeners per event name, in registration order
    listeners: Mutex<HashMap<String, Vec<Listener<A>>>>,
    next_id: AtomicU64,
}

impl<A> EventEmitter<A> {
    // == Constructor ==
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    // == On ==
    /// Registers a persistent listener for `event`.
    pub fn on<F>(&self, event: &str, callback: F) -> ListenerId
    where
        F: Fn(&A) + Send + Sync + 'static,
    {
        self.register(event, Arc::new(callback), false)
    }

    // == Once ==
    /// Registers a listener that is removed before its first invocation.
    pub fn once<F>(&self, event: &str, callback: F) -> ListenerId
    where
        F: Fn(&A) + Send + Sync + 'static,
    {
        self.register(event, Arc::new(callback), true)
    }

    // == Off ==
    /// Unregisters a listener. Returns false if it was not registered for `event`.
    pub fn off(&self, event: &str, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let Some(list) = listeners.get_mut(event) else {
            return false;
        };

        let before = list.len();
        list.retain(|listener| listener.id != id);
        let removed = list.len() != before;

        if list.is_empty() {
            listeners.remove(event);
        }
        if removed {
            debug!(event, "Event listener removed");
        }
        removed
    }

    // == Emit ==
    /// Invokes every listener registered for `event` at call time, in order.
    ///
    /// Listeners run after the registry lock is released, so they may register,
    /// remove or emit re-entrantly. A panicking listener is logged and skipped.
    pub fn emit(&self, event: &str, args: &A) {
        let callbacks: Vec<Callback<A>> = {
            let mut listeners = self.listeners.lock();
            let Some(list) = listeners.get_mut(event) else {
                return;
            };

            let callbacks = list
                .iter()
                .map(|listener| Arc::clone(&listener.callback))
                .collect();
            list.retain(|listener| !listener.once);
            if list.is_empty() {
                listeners.remove(event);
            }
            callbacks
        };

        for callback in callbacks {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| callback(args))) {
                error!(
                    event,
                    error = %panic_message(panic.as_ref()),
                    "Error in event listener"
                );
            }
        }
        debug!(event, "Event emitted");
    }

    // == Remove All Listeners ==
    /// Clears listeners for one event, or for every event when `event` is `None`.
    pub fn remove_all_listeners(&self, event: Option<&str>) {
        let mut listeners = self.listeners.lock();
        match event {
            Some(event) => {
                listeners.remove(event);
                debug!(event, "All listeners removed for event");
            }
            None => {
                listeners.clear();
                debug!("All event listeners removed");
            }
        }
    }

    // == Listener Count ==
    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.lock().get(event).map_or(0, Vec::len)
    }

    fn register(&self, event: &str, callback: Callback<A>, once: bool) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .lock()
            .entry(event.to_string())
            .or_default()
            .push(Listener { id, callback, once });
        debug!(event, once, "Event listener added");
        id
    }
}

impl<A> Default for EventEmitter<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> fmt::Debug for EventEmitter<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let listeners = self.listeners.lock();
        let counts: HashMap<&str, usize> = listeners
            .iter()
            .map(|(event, list)| (event.as_str(), list.len()))
            .collect();
        f.debug_struct("EventEmitter")
            .field("listeners", &counts)
            .finish()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "listener panicked".to_string()
    }
}
