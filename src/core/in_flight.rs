//! Set of resources currently assigned to a worker.

use std::collections::HashSet;
use std::hash::Hash;

use parking_lot::Mutex;

/// Guards against two workers processing the same resource at once.
///
/// Locked separately from the due-time queue so that upserts never wait on
/// dispatch or completion bookkeeping.
#[derive(Debug)]
pub struct InFlightTracker<K> {
    active: Mutex<HashSet<K>>,
}

impl<K> Default for InFlightTracker<K> {
    fn default() -> Self {
        Self {
            active: Mutex::new(HashSet::new()),
        }
    }
}

impl<K: Eq + Hash> InFlightTracker<K> {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `key` in flight. Returns `false` if it already was.
    pub fn try_claim(&self, key: K) -> bool {
        self.active.lock().insert(key)
    }

    /// Clear the in-flight marker. Returns `false` if `key` was not marked.
    pub fn release(&self, key: &K) -> bool {
        self.active.lock().remove(key)
    }

    /// Whether `key` is currently assigned to a worker.
    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.active.lock().contains(key)
    }

    /// Number of resources in flight.
    #[must_use]
    pub fn len(&self) -> usize {
        self.active.lock().len()
    }

    /// True when no resource is in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active.lock().is_empty()
    }
}
