//! In-memory Notification Source and Inventory Service.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    NotificationBatch, NotificationId, NotificationRecord, Product, ProductId, Variant, VariantId,
};
use crate::error::{InventoryError, SourceError};
use crate::ports::{Clock, InventoryService, NotificationSource};

#[derive(Default)]
struct SourceState {
    records: Vec<NotificationRecord>,
    /// Number of upcoming fetches that fail with `Unreachable`.
    failures_remaining: u32,
}

/// Notification Source backed by a `Vec`.
///
/// `as_of` comes from the injected clock, so tests control the cursor.
pub struct InMemoryNotificationSource {
    state: Mutex<SourceState>,
    clock: Arc<dyn Clock>,
    fetches: AtomicU32,
}

impl InMemoryNotificationSource {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(SourceState::default()),
            clock,
            fetches: AtomicU32::new(0),
        }
    }

    pub fn insert(&self, record: NotificationRecord) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .records
            .push(record);
    }

    /// Make the next `n` fetches fail.
    pub fn fail_next(&self, n: u32) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .failures_remaining = n;
    }

    /// Fetch calls received so far, failed ones included.
    pub fn fetch_count(&self) -> u32 {
        self.fetches.load(Ordering::Relaxed)
    }

    fn query(
        &self,
        filter: impl Fn(&NotificationRecord) -> bool,
    ) -> Result<NotificationBatch, SourceError> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.failures_remaining > 0 {
            state.failures_remaining -= 1;
            return Err(SourceError::Unreachable("connection refused".to_string()));
        }
        let records = state
            .records
            .iter()
            .filter(|r| !r.sent && filter(r))
            .cloned()
            .collect();
        Ok(NotificationBatch::new(records, self.clock.now()))
    }
}

#[async_trait]
impl NotificationSource for InMemoryNotificationSource {
    async fn fetch_all_unsent(&self) -> Result<NotificationBatch, SourceError> {
        self.query(|_| true)
    }

    async fn fetch_since(&self, since: DateTime<Utc>) -> Result<NotificationBatch, SourceError> {
        self.query(|r| r.created_at >= since)
    }

    async fn mark_sent(
        &self,
        id: &NotificationId,
        sent_at: DateTime<Utc>,
    ) -> Result<(), SourceError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let record = state
            .records
            .iter_mut()
            .find(|r| &r.id == id)
            .ok_or_else(|| SourceError::NotFound(id.clone()))?;
        record.sent = true;
        record.sent_at = Some(sent_at);
        Ok(())
    }
}

#[derive(Default)]
struct InventoryState {
    variants: HashMap<VariantId, Variant>,
    products: HashMap<ProductId, Product>,
    failing: HashSet<VariantId>,
}

/// Inventory Service backed by maps.
#[derive(Default)]
pub struct InMemoryInventory {
    state: Mutex<InventoryState>,
    variant_lookups: AtomicU32,
    product_lookups: AtomicU32,
}

impl InMemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, InventoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_variant(&self, variant: Variant) {
        self.state().variants.insert(variant.id, variant);
    }

    /// Change the stock level of a known variant. Unknown variants are ignored.
    pub fn set_quantity(&self, variant_id: VariantId, quantity: i64) {
        if let Some(v) = self.state().variants.get_mut(&variant_id) {
            v.inventory_quantity = quantity;
        }
    }

    pub fn set_product(&self, product: Product) {
        self.state().products.insert(product.id, product);
    }

    /// Make lookups for `variant_id` fail until `recover_variant`.
    pub fn fail_variant(&self, variant_id: VariantId) {
        self.state().failing.insert(variant_id);
    }

    pub fn recover_variant(&self, variant_id: VariantId) {
        self.state().failing.remove(&variant_id);
    }

    pub fn variant_lookups(&self) -> u32 {
        self.variant_lookups.load(Ordering::Relaxed)
    }

    pub fn product_lookups(&self) -> u32 {
        self.product_lookups.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl InventoryService for InMemoryInventory {
    async fn get_variant(&self, variant_id: VariantId) -> Result<Variant, InventoryError> {
        self.variant_lookups.fetch_add(1, Ordering::Relaxed);
        let state = self.state();
        if state.failing.contains(&variant_id) {
            return Err(InventoryError::Unavailable(format!(
                "lookup of {variant_id} timed out"
            )));
        }
        state
            .variants
            .get(&variant_id)
            .cloned()
            .ok_or(InventoryError::VariantNotFound(variant_id))
    }

    async fn get_product(&self, variant: &Variant) -> Result<Product, InventoryError> {
        self.product_lookups.fetch_add(1, Ordering::Relaxed);
        self.state()
            .products
            .get(&variant.product_id)
            .cloned()
            .ok_or(InventoryError::ProductNotFound {
                variant: variant.id,
                product: variant.product_id,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::FixedClock;
    use crate::testing::{at, product, record_at, t0, variant};

    #[tokio::test]
    async fn fetch_since_is_inclusive_and_skips_sent() {
        let clock = Arc::new(FixedClock::new(at(100)));
        let source = InMemoryNotificationSource::new(clock.clone());
        source.insert(record_at("old", 1, at(10)));
        source.insert(record_at("edge", 1, at(50)));
        source.insert(record_at("new", 1, at(60)));
        source.insert(record_at("done", 1, at(70)));
        source
            .mark_sent(&NotificationId::from("done"), at(80))
            .await
            .unwrap();
        assert!(matches!(
            source.mark_sent(&NotificationId::from("ghost"), at(80)).await,
            Err(SourceError::NotFound(_))
        ));

        let batch = source.fetch_since(at(50)).await.unwrap();
        let ids: Vec<&str> = batch.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["edge", "new"]);
        assert_eq!(batch.as_of, at(100));

        let all = source.fetch_all_unsent().await.unwrap();
        assert_eq!(all.records.len(), 3);
    }

    #[tokio::test]
    async fn injected_failures_are_consumed() {
        let source = InMemoryNotificationSource::new(Arc::new(FixedClock::new(t0())));
        source.fail_next(2);

        assert!(source.fetch_all_unsent().await.is_err());
        assert!(source.fetch_all_unsent().await.is_err());
        assert!(source.fetch_all_unsent().await.is_ok());
        assert_eq!(source.fetch_count(), 3);
    }

    #[tokio::test]
    async fn inventory_lookups() {
        let inventory = InMemoryInventory::new();
        inventory.set_variant(variant(42, 0));
        inventory.set_product(product(42));

        inventory.set_quantity(VariantId::new(42), 7);
        let v = inventory.get_variant(VariantId::new(42)).await.unwrap();
        assert_eq!(v.inventory_quantity, 7);
        assert_eq!(inventory.get_product(&v).await.unwrap(), product(42));

        assert!(matches!(
            inventory.get_variant(VariantId::new(9)).await,
            Err(InventoryError::VariantNotFound(_))
        ));

        inventory.fail_variant(VariantId::new(42));
        assert!(matches!(
            inventory.get_variant(VariantId::new(42)).await,
            Err(InventoryError::Unavailable(_))
        ));
        inventory.recover_variant(VariantId::new(42));
        assert!(inventory.get_variant(VariantId::new(42)).await.is_ok());
    }
}
