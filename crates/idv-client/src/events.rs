//! Client event bus.
//!
//! A registry from a closed set of event kinds to an ordered list of
//! subscribers. No dynamic key creation: an event kind that does not
//! exist in [`EventKind`] cannot be subscribed to or emitted.
//!
//! Dispatch semantics:
//!
//! - `emit` runs callbacks synchronously, in registration order;
//! - dispatch iterates a snapshot, so unsubscribing during a pass does
//!   not affect callbacks already scheduled for that pass but removes
//!   the subscriber from all future passes;
//! - [`Unsubscribe`] is idempotent — calling it twice is a no-op.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use idv_core::error::FailureCode;
use idv_core::scan::Progress;

/// The closed set of client event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Progress report from a long-running operation.
    Progress,
    /// Orchestration state change notification.
    State,
    /// Terminal error report.
    Error,
}

/// Payload delivered to subscribers. The variant determines which
/// subscriber list receives it.
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    /// Progress report.
    Progress(Progress),
    /// New orchestration state name.
    State(String),
    /// Terminal error with its machine-readable code.
    Error {
        /// Stable reason code.
        code: FailureCode,
        /// Human-readable detail; never required for classification.
        message: String,
    },
}

impl EventPayload {
    /// The kind this payload dispatches under.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Progress(_) => EventKind::Progress,
            Self::State(_) => EventKind::State,
            Self::Error { .. } => EventKind::Error,
        }
    }
}

type Callback = Arc<dyn Fn(&EventPayload) + Send + Sync>;

struct Subscriber {
    id: u64,
    callback: Callback,
}

struct BusInner {
    next_id: AtomicU64,
    subscribers: Mutex<HashMap<EventKind, Vec<Subscriber>>>,
}

/// Synchronous multi-subscriber event bus. Cheap to clone; clones
/// share the registry.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    /// An empty bus.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                next_id: AtomicU64::new(1),
                subscribers: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Register a callback for `kind`. Returns the revocation handle.
    pub fn on(
        &self,
        kind: EventKind,
        callback: impl Fn(&EventPayload) + Send + Sync + 'static,
    ) -> Unsubscribe {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .subscribers
            .lock()
            .entry(kind)
            .or_default()
            .push(Subscriber {
                id,
                callback: Arc::new(callback),
            });
        Unsubscribe {
            bus: Arc::downgrade(&self.inner),
            kind,
            id,
        }
    }

    /// Deliver `payload` to every subscriber of its kind, in
    /// registration order.
    pub fn emit(&self, payload: &EventPayload) {
        // Snapshot under the lock, dispatch outside it: a callback may
        // subscribe or unsubscribe without deadlocking.
        let snapshot: Vec<Callback> = {
            let subscribers = self.inner.subscribers.lock();
            subscribers
                .get(&payload.kind())
                .map(|list| list.iter().map(|s| s.callback.clone()).collect())
                .unwrap_or_default()
        };
        for callback in snapshot {
            callback(payload);
        }
    }

    #[cfg(test)]
    fn subscriber_count(&self, kind: EventKind) -> usize {
        self.inner
            .subscribers
            .lock()
            .get(&kind)
            .map_or(0, Vec::len)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Revocation handle returned by [`EventBus::on`]. Idempotent; dropping
/// it without calling [`Unsubscribe::unsubscribe`] leaves the
/// subscription active for the lifetime of the bus.
pub struct Unsubscribe {
    bus: Weak<BusInner>,
    kind: EventKind,
    id: u64,
}

impl Unsubscribe {
    /// Remove the subscription. A second call finds nothing to remove.
    pub fn unsubscribe(&self) {
        if let Some(bus) = self.bus.upgrade() {
            if let Some(list) = bus.subscribers.lock().get_mut(&self.kind) {
                list.retain(|s| s.id != self.id);
            }
        }
    }
}
