//! Explicit cancellation token.
//!
//! Every suspension point in the scan and proof paths checks one of
//! these. Cancellation is level-triggered and sticky: once cancelled,
//! a token stays cancelled, and a cancelled operation settles into a
//! failure instead of hanging.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

/// Returned from [`CancellationToken::check`] at a suspension point
/// that observed cancellation.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("operation cancelled")]
pub struct Cancelled;

struct Inner {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Cloneable cancellation token. All clones observe the same state.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

impl CancellationToken {
    /// A fresh, uncancelled token.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    /// Cancel the token. Idempotent; waiters are woken exactly once.
    pub fn cancel(&self) {
        if !self.inner.cancelled.swap(true, Ordering::AcqRel) {
            self.inner.notify.notify_waiters();
        }
    }

    /// Whether the token has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Fail fast at a suspension point.
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }

    /// Resolve when the token is cancelled. Used with `tokio::select!`
    /// to abandon an in-flight capability call.
    pub async fn cancelled(&self) {
        loop {
            if self.is_cancelled() {
                return;
            }
            let notified = self.inner.notify.notified();
            // Re-check between the load and the wait: cancel() may have
            // fired notify_waiters before we registered.
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
