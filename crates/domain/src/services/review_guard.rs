//! Review concurrency guard.
//!
//! At most one accept/reject pass may run against a given export at a time,
//! and at most one undo per lead. The guard is an in-process permit set: an
//! operation acquires its key on entry and the permit releases it on drop,
//! error paths included. A second caller for a held key is turned away
//! immediately rather than queued, so duplicate operator clicks collapse
//! into one write instead of stacking up.
//!
//! This debounces within one process; it is not a distributed lock across
//! replicas.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Permit set keyed by operation scope.
#[derive(Debug, Default)]
pub struct ReviewGuard {
    in_flight: Mutex<HashSet<String>>,
}

impl ReviewGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Key guarding accept/reject passes over one export.
    pub fn review_key(log_id: &str) -> String {
        format!("review:{}", log_id)
    }

    /// Key guarding undo calls for one stored lead.
    pub fn undo_key(lead_id: i64) -> String {
        format!("undo:{}", lead_id)
    }

    /// Attempts to begin an operation for `key`. Returns `None` when an
    /// operation holding the same key is still in flight.
    pub fn try_begin(self: &Arc<Self>, key: String) -> Option<ReviewPermit> {
        let mut in_flight = self.in_flight.lock().unwrap();
        if !in_flight.insert(key.clone()) {
            return None;
        }
        drop(in_flight);
        Some(ReviewPermit {
            guard: Arc::clone(self),
            key,
        })
    }

    /// Whether an operation currently holds `key`.
    pub fn is_held(&self, key: &str) -> bool {
        self.in_flight.lock().unwrap().contains(key)
    }

    fn release(&self, key: &str) {
        self.in_flight.lock().unwrap().remove(key);
    }
}

/// Held while a guarded operation runs; releases its key on drop.
#[derive(Debug)]
pub struct ReviewPermit {
    guard: Arc<ReviewGuard>,
    key: String,
}

impl Drop for ReviewPermit {
    fn drop(&mut self) {
        self.guard.release(&self.key);
    }
}
