//! InventoryService port - カタログ・在庫の参照

use async_trait::async_trait;

use crate::domain::{Product, Variant, VariantId};
use crate::error::InventoryError;

/// Catalog lookups used by the restock detector.
///
/// Each call is independent; a failure for one variant says nothing about
/// the others.
#[async_trait]
pub trait InventoryService: Send + Sync {
    /// Current snapshot of a variant, including its stock level.
    async fn get_variant(&self, variant_id: VariantId) -> Result<Variant, InventoryError>;

    /// The product a variant belongs to.
    async fn get_product(&self, variant: &Variant) -> Result<Product, InventoryError>;
}
