//! CachingInventory - Product の短期キャッシュ
//!
//! Product は読み取り専用なので、variant ID をキーに TTL の間だけ使い回しても
//! 観測できる振る舞いは変わらない。在庫数（get_variant）は毎回問い合わせる。

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};

use crate::domain::{Product, Variant, VariantId};
use crate::error::InventoryError;
use crate::ports::{Clock, InventoryService};

pub struct CachingInventory {
    inner: Arc<dyn InventoryService>,
    clock: Arc<dyn Clock>,
    ttl: TimeDelta,
    products: Mutex<HashMap<VariantId, (DateTime<Utc>, Product)>>,
}

impl CachingInventory {
    pub fn new(inner: Arc<dyn InventoryService>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            inner,
            clock,
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
            products: Mutex::new(HashMap::new()),
        }
    }

    fn cached(&self, variant_id: VariantId, now: DateTime<Utc>) -> Option<Product> {
        let products = self.products.lock().unwrap_or_else(PoisonError::into_inner);
        products
            .get(&variant_id)
            .filter(|(fetched_at, _)| now.signed_duration_since(*fetched_at) < self.ttl)
            .map(|(_, product)| product.clone())
    }
}

#[async_trait]
impl InventoryService for CachingInventory {
    async fn get_variant(&self, variant_id: VariantId) -> Result<Variant, InventoryError> {
        self.inner.get_variant(variant_id).await
    }

    async fn get_product(&self, variant: &Variant) -> Result<Product, InventoryError> {
        let now = self.clock.now();
        if let Some(product) = self.cached(variant.id, now) {
            return Ok(product);
        }

        let product = self.inner.get_product(variant).await?;
        self.products
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(variant.id, (now, product.clone()));
        Ok(product)
    }
}
