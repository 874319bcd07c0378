//! Dedup tracker: every notification identity ever merged.
//!
//! Design:
//! - Keyed by `NotificationId` only, for the initial load and every delta.
//! - Grow-only for the lifetime of the process. There is no
//!   `remove`: once seen, a record can never be merged (or enqueued) again.

use std::collections::HashSet;

use crate::domain::NotificationId;

#[derive(Debug, Default)]
pub struct DedupTracker {
    seen: HashSet<NotificationId>,
}

impl DedupTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_seen(&self, id: &NotificationId) -> bool {
        self.seen.contains(id)
    }

    /// Returns `true` if `id` was not seen before.
    pub fn mark_seen(&mut self, id: NotificationId) -> bool {
        self.seen.insert(id)
    }

    /// Distinct identities seen so far.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
