//! Proof handle: the caller-facing view of one in-flight proof
//! request.
//!
//! A handle is created `pending` and resolved exactly once; the first
//! resolution wins and later resolutions (including cancellation) are
//! ignored. One handle per request, never reused.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

use idv_core::cancel::CancellationToken;
use idv_core::error::FailureCode;
use idv_core::proof::{HandleStatus, ProofOutcome};

struct HandleShared {
    state: Mutex<HandleState>,
    resolved: Notify,
}

struct HandleState {
    status: HandleStatus,
    outcome: Option<ProofOutcome>,
}

/// Caller-facing handle for one proof request.
#[derive(Clone)]
pub struct ProofHandle {
    id: String,
    cancel: CancellationToken,
    shared: Arc<HandleShared>,
}

impl ProofHandle {
    /// Create a pending handle plus its single-use resolver.
    pub(crate) fn pending(id: String, cancel: CancellationToken) -> (Self, HandleResolver) {
        let shared = Arc::new(HandleShared {
            state: Mutex::new(HandleState {
                status: HandleStatus::Pending,
                outcome: None,
            }),
            resolved: Notify::new(),
        });
        let handle = Self {
            id,
            cancel,
            shared: shared.clone(),
        };
        (handle, HandleResolver { shared })
    }

    /// Session identifier of this request.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current lifecycle status.
    pub fn status(&self) -> HandleStatus {
        self.shared.state.lock().status
    }

    /// Await resolution. Returns immediately when already terminal.
    pub async fn result(&self) -> ProofOutcome {
        loop {
            let notified = self.shared.resolved.notified();
            if let Some(outcome) = self.shared.state.lock().outcome.clone() {
                return outcome;
            }
            notified.await;
        }
    }

    /// Cancel the request. Sets a failed status with the cancellation
    /// reason; never panics, and calling it again (or after
    /// resolution) is a no-op.
    pub fn cancel(&self) {
        self.cancel.cancel();
        HandleResolver {
            shared: self.shared.clone(),
        }
        .resolve(ProofOutcome::failure(FailureCode::UserCancelled));
    }
}

impl std::fmt::Debug for ProofHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProofHandle")
            .field("id", &self.id)
            .field("status", &self.status())
            .finish()
    }
}

/// Producer side of a handle. First `resolve` wins.
pub(crate) struct HandleResolver {
    shared: Arc<HandleShared>,
}

impl HandleResolver {
    /// Resolve the handle. Ignored when already terminal.
    pub(crate) fn resolve(&self, outcome: ProofOutcome) {
        {
            let mut state = self.shared.state.lock();
            if state.status.is_terminal() {
                return;
            }
            state.status = if outcome.ok {
                HandleStatus::Completed
            } else {
                HandleStatus::Failed
            };
            state.outcome = Some(outcome);
        }
        self.shared.resolved.notify_waiters();
    }
}
