//! Typed inventory changes between two consecutive snapshots.
//!
//! Change events are produced transiently by the differ for every scan.
//! They are not persisted directly; their count is kept in scan history
//! and the alert evaluator turns some of them into alerts.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind discriminator of a [`ChangeEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Quantity went up (and was already positive).
    StockIncreased,
    /// Quantity went down but stayed positive.
    StockDecreased,
    /// Quantity went from zero to positive.
    BackInStock,
    /// Quantity dropped to zero.
    OutOfStock,
    /// Unit price changed.
    PriceChanged,
    /// SKU appeared for the first time.
    NewProduct,
    /// SKU disappeared from the storefront.
    ProductRemoved,
}

impl ChangeKind {
    /// Returns the kind as a static string slice.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StockIncreased => "stock_increased",
            Self::StockDecreased => "stock_decreased",
            Self::BackInStock => "back_in_stock",
            Self::OutOfStock => "out_of_stock",
            Self::PriceChanged => "price_changed",
            Self::NewProduct => "new_product",
            Self::ProductRemoved => "product_removed",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single detected change for one SKU.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum ChangeEvent {
    /// Quantity increased from a positive value.
    StockIncreased {
        /// Affected SKU.
        sku: String,
        /// Product title.
        title: String,
        /// Quantity before the scan.
        before: u64,
        /// Quantity after the scan.
        after: u64,
    },

    /// Quantity decreased and is still positive.
    StockDecreased {
        /// Affected SKU.
        sku: String,
        /// Product title.
        title: String,
        /// Quantity before the scan.
        before: u64,
        /// Quantity after the scan.
        after: u64,
    },

    /// Quantity went from zero to positive.
    BackInStock {
        /// Affected SKU.
        sku: String,
        /// Product title.
        title: String,
        /// Quantity before the scan (always zero).
        before: u64,
        /// Quantity after the scan.
        after: u64,
    },

    /// Quantity dropped to zero.
    OutOfStock {
        /// Affected SKU.
        sku: String,
        /// Product title.
        title: String,
        /// Quantity before the scan.
        before: u64,
        /// Quantity after the scan (always zero).
        after: u64,
    },

    /// Unit price changed.
    PriceChanged {
        /// Affected SKU.
        sku: String,
        /// Product title.
        title: String,
        /// Price before the scan, in minor units.
        before_cents: u64,
        /// Price after the scan, in minor units.
        after_cents: u64,
    },

    /// SKU not present in the previous snapshot.
    NewProduct {
        /// Affected SKU.
        sku: String,
        /// Product title.
        title: String,
        /// Initial quantity.
        quantity: u64,
        /// Initial price, in minor units.
        price_cents: u64,
    },

    /// SKU no longer present on the storefront.
    ProductRemoved {
        /// Affected SKU.
        sku: String,
        /// Product title.
        title: String,
        /// Last observed quantity.
        last_quantity: u64,
        /// Last observed price, in minor units.
        last_price_cents: u64,
    },
}

impl ChangeEvent {
    /// Returns the SKU this event refers to.
    #[must_use]
    pub fn sku(&self) -> &str {
        match self {
            Self::StockIncreased { sku, .. }
            | Self::StockDecreased { sku, .. }
            | Self::BackInStock { sku, .. }
            | Self::OutOfStock { sku, .. }
            | Self::PriceChanged { sku, .. }
            | Self::NewProduct { sku, .. }
            | Self::ProductRemoved { sku, .. } => sku,
        }
    }

    /// Returns the product title carried by this event.
    #[must_use]
    pub fn title(&self) -> &str {
        match self {
            Self::StockIncreased { title, .. }
            | Self::StockDecreased { title, .. }
            | Self::BackInStock { title, .. }
            | Self::OutOfStock { title, .. }
            | Self::PriceChanged { title, .. }
            | Self::NewProduct { title, .. }
            | Self::ProductRemoved { title, .. } => title,
        }
    }

    /// Returns the kind discriminator.
    #[must_use]
    pub const fn kind(&self) -> ChangeKind {
        match self {
            Self::StockIncreased { .. } => ChangeKind::StockIncreased,
            Self::StockDecreased { .. } => ChangeKind::StockDecreased,
            Self::BackInStock { .. } => ChangeKind::BackInStock,
            Self::OutOfStock { .. } => ChangeKind::OutOfStock,
            Self::PriceChanged { .. } => ChangeKind::PriceChanged,
            Self::NewProduct { .. } => ChangeKind::NewProduct,
            Self::ProductRemoved { .. } => ChangeKind::ProductRemoved,
        }
    }

    /// Returns `(before, after)` quantities for stock-transition events.
    #[must_use]
    pub const fn quantity_transition(&self) -> Option<(u64, u64)> {
        match self {
            Self::StockIncreased { before, after, .. }
            | Self::StockDecreased { before, after, .. }
            | Self::BackInStock { before, after, .. }
            | Self::OutOfStock { before, after, .. } => Some((*before, *after)),
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn accessors() {
        let event = ChangeEvent::OutOfStock {
            sku: "A".to_string(),
            title: "Shirt".to_string(),
            before: 5,
            after: 0,
        };
        assert_eq!(event.sku(), "A");
        assert_eq!(event.title(), "Shirt");
        assert_eq!(event.kind(), ChangeKind::OutOfStock);
        assert_eq!(event.quantity_transition(), Some((5, 0)));
    }

    #[test]
    fn price_change_has_no_quantity_transition() {
        let event = ChangeEvent::PriceChanged {
            sku: "A".to_string(),
            title: "Shirt".to_string(),
            before_cents: 1000,
            after_cents: 1200,
        };
        assert!(event.quantity_transition().is_none());
    }

    #[test]
    fn serializes_with_event_type_tag() {
        let event = ChangeEvent::BackInStock {
            sku: "A".to_string(),
            title: "Shirt".to_string(),
            before: 0,
            after: 4,
        };
        let Ok(json) = serde_json::to_value(&event) else {
            panic!("serialization failed");
        };
        assert_eq!(
            json.get("event_type").and_then(|v| v.as_str()),
            Some("back_in_stock")
        );
        assert_eq!(json.get("after").and_then(|v| v.as_u64()), Some(4));
    }

    #[test]
    fn kind_strings_match_serde_names() {
        for kind in [
            ChangeKind::StockIncreased,
            ChangeKind::StockDecreased,
            ChangeKind::BackInStock,
            ChangeKind::OutOfStock,
            ChangeKind::PriceChanged,
            ChangeKind::NewProduct,
            ChangeKind::ProductRemoved,
        ] {
            let Ok(json) = serde_json::to_string(&kind) else {
                panic!("serialization failed");
            };
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }
}
