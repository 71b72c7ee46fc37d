//! Point-in-time inventory records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::StoreId;

/// One sellable variant as observed on the storefront.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    /// Stable identity key used to match records across scans.
    pub sku: String,
    /// Display title (`"<product> - <variant>"`).
    pub title: String,
    /// Storefront variant id.
    pub variant_id: String,
    /// Units in stock. Never negative.
    pub quantity: u64,
    /// Unit price in minor currency units.
    pub price_cents: u64,
    /// Storefront availability flag.
    pub available: bool,
}

/// Complete inventory of one store at one instant.
///
/// Products are kept sorted by SKU with duplicates removed, so lookups can
/// binary-search and the differ can merge two snapshots in one pass. A
/// snapshot is never mutated after construction; the next scan supersedes
/// it with a new value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySnapshot {
    store_id: StoreId,
    taken_at: DateTime<Utc>,
    products: Vec<ProductRecord>,
}

impl InventorySnapshot {
    /// Builds a snapshot, ordering products by SKU.
    ///
    /// When two records share a SKU the first one wins.
    #[must_use]
    pub fn new(store_id: StoreId, taken_at: DateTime<Utc>, mut products: Vec<ProductRecord>) -> Self {
        products.sort_by(|a, b| a.sku.cmp(&b.sku));
        products.dedup_by(|later, earlier| later.sku == earlier.sku);
        Self {
            store_id,
            taken_at,
            products,
        }
    }

    /// An empty snapshot, used as the baseline before the first scan.
    #[must_use]
    pub fn empty(store_id: StoreId) -> Self {
        Self::new(store_id, Utc::now(), Vec::new())
    }

    /// Store this snapshot belongs to.
    #[must_use]
    pub const fn store_id(&self) -> StoreId {
        self.store_id
    }

    /// When the underlying fetch completed.
    #[must_use]
    pub const fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    /// Products in ascending SKU order.
    #[must_use]
    pub fn products(&self) -> &[ProductRecord] {
        &self.products
    }

    /// Looks up a product by SKU.
    #[must_use]
    pub fn get(&self, sku: &str) -> Option<&ProductRecord> {
        self.products
            .binary_search_by(|p| p.sku.as_str().cmp(sku))
            .ok()
            .and_then(|idx| self.products.get(idx))
    }

    /// Number of distinct SKUs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.products.len()
    }

    /// Returns `true` if the snapshot holds no products.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Sum of all quantities.
    #[must_use]
    pub fn total_stock(&self) -> u64 {
        self.products
            .iter()
            .fold(0u64, |acc, p| acc.saturating_add(p.quantity))
    }
}

#[cfg(test)]
pub(crate) fn record(sku: &str, quantity: u64, price_cents: u64) -> ProductRecord {
    ProductRecord {
        sku: sku.to_string(),
        title: format!("Product {sku}"),
        variant_id: format!("v-{sku}"),
        quantity,
        price_cents,
        available: quantity > 0,
    }
}
