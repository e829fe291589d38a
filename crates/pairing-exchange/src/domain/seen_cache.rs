//! # Seen-Envelope Cache
//!
//! The relay may hand back entries that were already acknowledged. This
//! bounded cache remembers recently consumed envelope ids so redeliveries
//! are acknowledged again without running their handler twice.
//!
//! Eviction is first-in, first-out once `capacity` ids are held.

use std::collections::{HashSet, VecDeque};
use uuid::Uuid;

/// Bounded set of consumed envelope ids.
pub struct SeenEnvelopes {
    /// Membership lookup.
    ids: HashSet<Uuid>,

    /// Insertion order, oldest first.
    order: VecDeque<Uuid>,

    capacity: usize,
}

impl SeenEnvelopes {
    /// Default number of ids remembered.
    pub const DEFAULT_CAPACITY: usize = 1024;

    /// Create a cache holding at most `capacity` ids (minimum 1).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            ids: HashSet::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Whether the id was consumed recently.
    pub fn contains(&self, id: &Uuid) -> bool {
        self.ids.contains(id)
    }

    /// Record a consumed id. Returns false if it was already present.
    pub fn insert(&mut self, id: Uuid) -> bool {
        if !self.ids.insert(id) {
            return false;
        }
        self.order.push_back(id);
        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.ids.remove(&evicted);
            }
        }
        true
    }

    /// Number of ids held.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// True when nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl Default for SeenEnvelopes {
    fn default() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }
}
