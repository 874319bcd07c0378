//! Pending notification index: variant -> records still waiting on stock.
//!
//! Invariant: a record identity appears in at most one list, at most once.
//! The index itself does not check this; callers go through
//! `DedupTracker` first (see `PollLoop::merge`).

use std::collections::BTreeMap;

use crate::domain::{NotificationRecord, VariantId};

#[derive(Debug, Default)]
pub struct PendingIndex {
    by_variant: BTreeMap<VariantId, Vec<NotificationRecord>>,
}

impl PendingIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to the variant's list, creating it if absent.
    pub fn add(&mut self, record: NotificationRecord) {
        self.by_variant
            .entry(record.variant_id)
            .or_default()
            .push(record);
    }

    /// Snapshot of the variants that currently have pending records.
    pub fn variants_pending(&self) -> Vec<VariantId> {
        self.by_variant.keys().copied().collect()
    }

    /// Remove and return every record for `variant_id`, in arrival order.
    ///
    /// A later `add` for the same variant starts a fresh list.
    pub fn drain(&mut self, variant_id: VariantId) -> Vec<NotificationRecord> {
        self.by_variant.remove(&variant_id).unwrap_or_default()
    }

    /// Records waiting on `variant_id`, oldest first.
    pub fn get(&self, variant_id: VariantId) -> &[NotificationRecord] {
        self.by_variant
            .get(&variant_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn pending_for(&self, variant_id: VariantId) -> usize {
        self.get(variant_id).len()
    }

    pub fn contains_variant(&self, variant_id: VariantId) -> bool {
        self.by_variant.contains_key(&variant_id)
    }

    /// Total records across all variants.
    pub fn total(&self) -> usize {
        self.by_variant.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_variant.is_empty()
    }
}
