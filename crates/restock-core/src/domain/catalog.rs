//! Catalog snapshots returned by the Inventory Service.

use serde::{Deserialize, Serialize};

use super::ids::{ProductId, VariantId};

/// A purchasable configuration of a product, with its live stock level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub id: VariantId,
    pub product_id: ProductId,
    #[serde(default)]
    pub title: String,
    /// May be zero or negative (oversold).
    pub inventory_quantity: i64,
}

impl Variant {
    pub fn new(id: VariantId, product_id: ProductId, inventory_quantity: i64) -> Self {
        Self {
            id,
            product_id,
            title: String::new(),
            inventory_quantity,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// In stock means strictly positive quantity.
    pub fn is_in_stock(&self) -> bool {
        self.inventory_quantity > 0
    }
}

/// Display data used to compose the restock email.
///
/// Read-only from this crate's point of view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub title: String,
    /// URL path segment of the storefront page.
    #[serde(default)]
    pub handle: String,
}

impl Product {
    pub fn new(id: ProductId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            handle: String::new(),
        }
    }

    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.handle = handle.into();
        self
    }
}
