//! Per-SKU stock observations and their summaries.
//!
//! Every successful scan appends one [`StockObservation`] per product.
//! [`summarize_changes`] folds a window of observations into per-SKU
//! min/max/average figures.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{InventorySnapshot, StoreId};

/// Stock level of one SKU as seen by one scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockObservation {
    /// Store the SKU belongs to.
    pub store_id: StoreId,
    /// Observed SKU.
    pub sku: String,
    /// Product title at the time.
    pub title: String,
    /// Storefront variant id.
    pub variant_id: String,
    /// Units in stock.
    pub quantity: u64,
    /// Unit price in minor currency units.
    pub price_cents: u64,
    /// When the snapshot was taken.
    pub observed_at: DateTime<Utc>,
}

impl StockObservation {
    /// One observation per product of `snapshot`, in SKU order.
    #[must_use]
    pub fn from_snapshot(snapshot: &InventorySnapshot) -> Vec<Self> {
        snapshot
            .products()
            .iter()
            .map(|p| Self {
                store_id: snapshot.store_id(),
                sku: p.sku.clone(),
                title: p.title.clone(),
                variant_id: p.variant_id.clone(),
                quantity: p.quantity,
                price_cents: p.price_cents,
                observed_at: snapshot.taken_at(),
            })
            .collect()
    }
}

/// Narrows a stock history query. Unset fields match all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservationFilter {
    /// Only this SKU.
    pub sku: Option<String>,
    /// Only this storefront variant.
    pub variant_id: Option<String>,
}

impl ObservationFilter {
    /// Returns `true` if `observation` passes every set criterion.
    #[must_use]
    pub fn matches(&self, observation: &StockObservation) -> bool {
        self.sku.as_deref().is_none_or(|sku| observation.sku == sku)
            && self
                .variant_id
                .as_deref()
                .is_none_or(|id| observation.variant_id == id)
    }
}

/// How one SKU's stock moved over a window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockChange {
    /// SKU.
    pub sku: String,
    /// Most recent title seen in the window.
    pub title: String,
    /// Lowest observed quantity.
    pub min_stock: u64,
    /// Highest observed quantity.
    pub max_stock: u64,
    /// Mean observed quantity, rounded to two decimals.
    pub avg_stock: f64,
    /// `max_stock - min_stock`.
    pub stock_change: u64,
}

impl StockChange {
    /// Builds a summary, rounding `avg_stock` to two decimals.
    #[must_use]
    pub fn new(sku: String, title: String, min_stock: u64, max_stock: u64, avg_stock: f64) -> Self {
        Self {
            sku,
            title,
            min_stock,
            max_stock,
            avg_stock: (avg_stock * 100.0).round() / 100.0,
            stock_change: max_stock.saturating_sub(min_stock),
        }
    }
}

/// Summarizes `observations` per SKU, keeping only SKUs whose stock moved,
/// largest movement first (ties by SKU).
#[must_use]
pub fn summarize_changes(observations: &[StockObservation]) -> Vec<StockChange> {
    #[derive(Default)]
    struct Acc<'a> {
        title: &'a str,
        latest: Option<DateTime<Utc>>,
        min: u64,
        max: u64,
        sum: u128,
        count: u32,
    }

    let mut per_sku: BTreeMap<&str, Acc<'_>> = BTreeMap::new();
    for obs in observations {
        let acc = per_sku.entry(obs.sku.as_str()).or_insert_with(|| Acc {
            min: u64::MAX,
            ..Acc::default()
        });
        acc.min = acc.min.min(obs.quantity);
        acc.max = acc.max.max(obs.quantity);
        acc.sum = acc.sum.saturating_add(u128::from(obs.quantity));
        acc.count = acc.count.saturating_add(1);
        if acc.latest.is_none_or(|at| obs.observed_at >= at) {
            acc.latest = Some(obs.observed_at);
            acc.title = obs.title.as_str();
        }
    }

    let mut changes: Vec<StockChange> = per_sku
        .into_iter()
        .filter(|(_, acc)| acc.max != acc.min)
        .map(|(sku, acc)| {
            #[allow(clippy::cast_precision_loss)]
            let avg = acc.sum as f64 / f64::from(acc.count);
            StockChange::new(sku.to_string(), acc.title.to_string(), acc.min, acc.max, avg)
        })
        .collect();
    sort_changes(&mut changes);
    changes
}

/// Orders summaries by movement, largest first, then by SKU.
pub fn sort_changes(changes: &mut [StockChange]) {
    changes.sort_by(|a, b| {
        b.stock_change
            .cmp(&a.stock_change)
            .then_with(|| a.sku.cmp(&b.sku))
    });
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::snapshot::record;
    use chrono::Duration;

    fn observe(sku: &str, quantity: u64, minutes_ago: i64) -> StockObservation {
        StockObservation {
            store_id: StoreId::new(),
            sku: sku.to_string(),
            title: format!("Product {sku} @{minutes_ago}"),
            variant_id: format!("v-{sku}"),
            quantity,
            price_cents: 100,
            observed_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    #[test]
    fn snapshot_yields_one_observation_per_product() {
        let store_id = StoreId::new();
        let snapshot = InventorySnapshot::new(
            store_id,
            Utc::now(),
            vec![record("B", 2, 100), record("A", 7, 250)],
        );
        let observations = StockObservation::from_snapshot(&snapshot);
        let skus: Vec<&str> = observations.iter().map(|o| o.sku.as_str()).collect();
        assert_eq!(skus, ["A", "B"]);
        assert!(observations.iter().all(|o| o.store_id == store_id));
        assert!(observations.iter().all(|o| o.observed_at == snapshot.taken_at()));
    }

    #[test]
    fn unchanged_skus_are_left_out() {
        let observations = [observe("A", 5, 30), observe("A", 5, 10)];
        assert!(summarize_changes(&observations).is_empty());
    }

    #[test]
    fn summary_orders_by_movement() {
        let observations = [
            observe("A", 10, 60),
            observe("A", 8, 30),
            observe("A", 9, 0),
            observe("B", 20, 60),
            observe("B", 0, 0),
            observe("C", 3, 0),
        ];
        let changes = summarize_changes(&observations);
        let [b, a] = changes.as_slice() else {
            panic!("expected two summaries, got {changes:?}");
        };
        assert_eq!(b.sku, "B");
        assert_eq!(b.stock_change, 20);
        assert_eq!(a.min_stock, 8);
        assert_eq!(a.max_stock, 10);
        assert!((a.avg_stock - 9.0).abs() < f64::EPSILON);
        assert_eq!(a.title, "Product A @0");
    }

    #[test]
    fn average_is_rounded_to_two_decimals() {
        let change = StockChange::new("A".to_string(), "A".to_string(), 1, 2, 4.0 / 3.0);
        assert!((change.avg_stock - 1.33).abs() < f64::EPSILON);
    }

    #[test]
    fn filter_matches_sku_and_variant() {
        let obs = observe("A", 1, 0);
        assert!(ObservationFilter::default().matches(&obs));
        let by_sku = ObservationFilter {
            sku: Some("A".to_string()),
            variant_id: None,
        };
        assert!(by_sku.matches(&obs));
        let wrong_variant = ObservationFilter {
            sku: Some("A".to_string()),
            variant_id: Some("v-B".to_string()),
        };
        assert!(!wrong_variant.matches(&obs));
    }
}
