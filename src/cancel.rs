//! Cancel Token Module
//!
//! Cooperative cancellation for queued and backing-off calls. A fired token
//! aborts limiter admission waits, limiter retry pauses and retry-policy
//! backoff; an operation that already started runs to completion.

use std::sync::Arc;

use tokio::sync::watch;

// == Cancel Token ==
/// Cancellation handle shared between a caller and the calls it started.
///
/// Cloning yields another handle to the same signal.
#[derive(Debug, Clone)]
pub struct CancelToken {
    /// Shared by all clones; sending `true` fires the token
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    // == Constructor ==
    /// Creates a token that has not fired.
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    // == Cancel ==
    /// Signals every waiter holding this token. Firing twice is a no-op.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Returns true once `cancel` has been called on any clone.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    // == Wait ==
    /// Resolves once `cancel` has been called; immediately if it already was.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                // Sender dropped without cancelling; never resolves.
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
