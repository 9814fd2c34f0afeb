use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tokio::sync::oneshot;
use tracing::debug;

use crate::form::form_model::FormSnapshot;

// ============================================================================
// Pending-extraction registry
// ============================================================================
//
// Single source of truth for "is a re-extraction outstanding". Every entry is
// resolved at most once: resolution removes the entry before the snapshot is
// delivered, so a duplicate or late response finds nothing and is dropped.

struct PendingRequest {
    tx: oneshot::Sender<FormSnapshot>,
    issued_at: Instant,
    deadline: Instant,
}

#[derive(Default)]
pub struct PendingExtractions {
    inner: Mutex<HashMap<String, PendingRequest>>,
}

impl PendingExtractions {
    pub fn new() -> PendingExtractions {
        PendingExtractions::default()
    }

    /// Register a fresh correlation id and get the receiver its response will
    /// be delivered on.
    pub fn register(&self, request_id: &str, ttl: Duration) -> oneshot::Receiver<FormSnapshot> {
        let (tx, rx) = oneshot::channel();
        let now = Instant::now();
        let mut inner = self.inner.lock().expect("pending registry poisoned");
        inner.insert(
            request_id.to_string(),
            PendingRequest {
                tx,
                issued_at: now,
                deadline: now + ttl,
            },
        );
        rx
    }

    /// Deliver a response. Unknown or expired ids are a no-op, never an
    /// error; returns whether a waiter was actually resolved.
    pub fn resolve(&self, request_id: &str, snapshot: FormSnapshot) -> bool {
        let entry = {
            let mut inner = self.inner.lock().expect("pending registry poisoned");
            inner.remove(request_id)
        };
        match entry {
            Some(pending) => {
                if Instant::now() > pending.deadline {
                    debug!(request_id, "extraction response after deadline, discarded");
                    return false;
                }
                debug!(
                    request_id,
                    elapsed_ms = pending.issued_at.elapsed().as_millis() as u64,
                    "extraction response resolved"
                );
                // A dropped receiver means the waiter already timed out.
                pending.tx.send(snapshot).is_ok()
            }
            None => {
                debug!(request_id, "extraction response for unknown id, discarded");
                false
            }
        }
    }

    /// Forget a request after its waiter gave up.
    pub fn abandon(&self, request_id: &str) {
        let mut inner = self.inner.lock().expect("pending registry poisoned");
        inner.remove(request_id);
    }

    /// Drop entries whose deadline has passed.
    pub fn sweep_expired(&self) {
        let now = Instant::now();
        let mut inner = self.inner.lock().expect("pending registry poisoned");
        inner.retain(|_, pending| pending.deadline >= now);
    }

    /// Drop everything, failing all outstanding waiters. Called on
    /// disconnect.
    pub fn fail_all(&self) {
        let mut inner = self.inner.lock().expect("pending registry poisoned");
        inner.clear();
    }

    pub fn outstanding(&self) -> usize {
        self.inner.lock().expect("pending registry poisoned").len()
    }
}
