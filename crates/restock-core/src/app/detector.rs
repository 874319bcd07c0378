//! RestockDetector - pending な variant ごとに在庫を確認する
//!
//! # フロー
//! 1. PendingIndex::variants_pending() のスナップショットを取る
//! 2. variant ごとに InventoryService::get_variant()
//! 3. 在庫 > 0 なら get_product()（通知ごとではなく variant ごとに1回）
//! 4. 在庫 <= 0 なら pending 件数を unfulfilled に加算（レコードには触らない）
//!
//! 1件の lookup 失敗は他の variant の判定を止めない。リトライもしない。

use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::{Product, Variant, VariantId};
use crate::error::InventoryError;
use crate::pending::PendingIndex;
use crate::ports::InventoryService;

/// A variant confirmed in stock this cycle, with its product snapshot.
#[derive(Debug, Clone)]
pub struct Restocked {
    pub variant_id: VariantId,
    pub variant: Variant,
    pub product: Product,
}

#[derive(Debug)]
pub struct LookupFailure {
    pub variant_id: VariantId,
    pub error: InventoryError,
}

/// Result of one detection pass.
///
/// Variants in `failures` are in neither `in_stock` nor `out_of_stock`.
#[derive(Debug, Default)]
pub struct Detection {
    pub in_stock: Vec<Restocked>,
    pub out_of_stock: Vec<VariantId>,
    /// Pending records belonging to `out_of_stock` variants.
    pub unfulfilled: usize,
    pub failures: Vec<LookupFailure>,
}

pub struct RestockDetector {
    inventory: Arc<dyn InventoryService>,
}

impl RestockDetector {
    pub fn new(inventory: Arc<dyn InventoryService>) -> Self {
        Self { inventory }
    }

    pub async fn detect(&self, pending: &PendingIndex) -> Detection {
        let mut detection = Detection::default();

        for variant_id in pending.variants_pending() {
            let variant = match self.inventory.get_variant(variant_id).await {
                Ok(variant) => variant,
                Err(error) => {
                    warn!(variant = %variant_id, error = %error, "inventory lookup failed, skipping variant this cycle");
                    detection.failures.push(LookupFailure { variant_id, error });
                    continue;
                }
            };

            if !variant.is_in_stock() {
                let waiting = pending.pending_for(variant_id);
                debug!(variant = %variant_id, quantity = variant.inventory_quantity, waiting, "out of stock");
                detection.unfulfilled += waiting;
                detection.out_of_stock.push(variant_id);
                continue;
            }

            match self.inventory.get_product(&variant).await {
                Ok(product) => {
                    debug!(variant = %variant_id, quantity = variant.inventory_quantity, "in stock");
                    detection.in_stock.push(Restocked {
                        variant_id,
                        variant,
                        product,
                    });
                }
                Err(error) => {
                    warn!(variant = %variant_id, error = %error, "product lookup failed, skipping variant this cycle");
                    detection.failures.push(LookupFailure { variant_id, error });
                }
            }
        }

        detection
    }
}
