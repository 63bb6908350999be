//! Min-heap of due times keyed uniquely by resource.
//!
//! `std::collections::BinaryHeap` cannot reposition an element in place, so
//! the heap is maintained by hand over a `Vec`. Lookups for an existing key
//! are a linear scan; that is fine for tens to thousands of resources. A
//! key-to-index map would be needed beyond that.

use std::time::SystemTime;

/// One pending entry: a resource and the time it becomes eligible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleEntry<K> {
    /// The scheduled resource.
    pub resource: K,
    /// Time at which the resource becomes due.
    pub due_at: SystemTime,
}

/// Result of an upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upserted {
    /// The resource had no entry; a new one was pushed.
    Inserted,
    /// An existing entry had its due time overwritten.
    Updated,
}

/// Priority queue ordered by earliest `due_at`, at most one entry per key.
#[derive(Debug)]
pub struct DueTimeQueue<K> {
    entries: Vec<ScheduleEntry<K>>,
}

impl<K> Default for DueTimeQueue<K> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<K: PartialEq> DueTimeQueue<K> {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pending entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Set the due time for `resource`, inserting it if absent.
    ///
    /// `UNIX_EPOCH` sorts ahead of everything else and means "process now".
    pub fn upsert(&mut self, resource: K, due_at: SystemTime) -> Upserted {
        if let Some(idx) = self.entries.iter().position(|e| e.resource == resource) {
            self.entries[idx].due_at = due_at;
            self.fix(idx);
            return Upserted::Updated;
        }
        self.entries.push(ScheduleEntry { resource, due_at });
        self.sift_up(self.entries.len() - 1);
        Upserted::Inserted
    }

    /// Earliest entry, if any.
    #[must_use]
    pub fn peek(&self) -> Option<&ScheduleEntry<K>> {
        self.entries.first()
    }

    /// Remove and return the earliest entry.
    pub fn pop(&mut self) -> Option<ScheduleEntry<K>> {
        if self.entries.is_empty() {
            return None;
        }
        let last = self.entries.len() - 1;
        self.entries.swap(0, last);
        let entry = self.entries.pop();
        if !self.entries.is_empty() {
            self.sift_down(0);
        }
        entry
    }

    /// Pending due time for `resource`.
    #[must_use]
    pub fn due_at(&self, resource: &K) -> Option<SystemTime> {
        self.entries
            .iter()
            .find(|e| e.resource == *resource)
            .map(|e| e.due_at)
    }

    fn fix(&mut self, idx: usize) {
        let idx = self.sift_up(idx);
        self.sift_down(idx);
    }

    fn sift_up(&mut self, mut idx: usize) -> usize {
        while idx > 0 {
            let parent = (idx - 1) / 2;
            if self.entries[idx].due_at >= self.entries[parent].due_at {
                break;
            }
            self.entries.swap(idx, parent);
            idx = parent;
        }
        idx
    }

    fn sift_down(&mut self, mut idx: usize) {
        let len = self.entries.len();
        loop {
            let left = 2 * idx + 1;
            if left >= len {
                break;
            }
            let right = left + 1;
            let mut smallest = left;
            if right < len && self.entries[right].due_at < self.entries[left].due_at {
                smallest = right;
            }
            if self.entries[smallest].due_at >= self.entries[idx].due_at {
                break;
            }
            self.entries.swap(idx, smallest);
            idx = smallest;
        }
    }
}
