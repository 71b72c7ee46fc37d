//! Monitored storefronts and their scan settings.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::StoreId;

/// A storefront under inventory monitoring.
///
/// Created through the store-management surface, mutated on update and
/// soft-deleted on removal. The scheduler only keeps timers for stores
/// where [`MonitoredStore::is_schedulable`] holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoredStore {
    /// Store identifier (immutable after creation).
    pub id: StoreId,
    /// Human-readable store name.
    pub name: String,
    /// Storefront base URL (e.g. `https://shop.example.com`).
    pub url: String,
    /// Seconds between scheduled scans.
    pub scan_interval_secs: u64,
    /// Quantity at or below which a low-stock alert fires.
    pub low_stock_threshold: u64,
    /// Whether low-stock alerts are raised for this store.
    pub notify_low_stock: bool,
    /// Whether scheduled scans run for this store.
    pub enabled: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last settings change.
    pub updated_at: DateTime<Utc>,
    /// Soft-delete marker. A deleted store is never scanned again.
    pub deleted_at: Option<DateTime<Utc>>,
    /// Start of the last successful scan.
    pub last_scan_at: Option<DateTime<Utc>>,
}

impl MonitoredStore {
    /// Creates an enabled store with the given settings.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        scan_interval_secs: u64,
        low_stock_threshold: u64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: StoreId::new(),
            name: name.into(),
            url: normalize_url(&url.into()),
            scan_interval_secs,
            low_stock_threshold,
            notify_low_stock: true,
            enabled: true,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            last_scan_at: None,
        }
    }

    /// Scan interval as a [`Duration`]. Never zero.
    #[must_use]
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs.max(1))
    }

    /// Returns `true` if the scheduler should keep a timer for this store.
    #[must_use]
    pub const fn is_schedulable(&self) -> bool {
        self.enabled && self.deleted_at.is_none()
    }

    /// Returns `true` once the store has been soft-deleted.
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Applies a partial update, bumping `updated_at`.
    pub fn apply(&mut self, update: &StoreUpdate) {
        if let Some(name) = &update.name {
            self.name.clone_from(name);
        }
        if let Some(interval) = update.scan_interval_secs {
            self.scan_interval_secs = interval;
        }
        if let Some(threshold) = update.low_stock_threshold {
            self.low_stock_threshold = threshold;
        }
        if let Some(notify) = update.notify_low_stock {
            self.notify_low_stock = notify;
        }
        if let Some(enabled) = update.enabled {
            self.enabled = enabled;
        }
        self.updated_at = Utc::now();
    }
}

/// Partial update of a store's settings. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreUpdate {
    /// New name.
    #[serde(default)]
    pub name: Option<String>,
    /// New scan interval in seconds.
    #[serde(default)]
    pub scan_interval_secs: Option<u64>,
    /// New low-stock threshold.
    #[serde(default)]
    pub low_stock_threshold: Option<u64>,
    /// Enable or disable low-stock alerts.
    #[serde(default)]
    pub notify_low_stock: Option<bool>,
    /// Enable or disable scheduled scans.
    #[serde(default)]
    pub enabled: Option<bool>,
}

/// Strips trailing slashes so path joins stay predictable.
fn normalize_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_store_is_schedulable() {
        let store = MonitoredStore::new("Shop", "https://shop.example.com/", 600, 5);
        assert!(store.is_schedulable());
        assert_eq!(store.url, "https://shop.example.com");
        assert_eq!(store.scan_interval(), Duration::from_secs(600));
    }

    #[test]
    fn zero_interval_is_clamped() {
        let store = MonitoredStore::new("Shop", "https://shop.example.com", 0, 5);
        assert_eq!(store.scan_interval(), Duration::from_secs(1));
    }

    #[test]
    fn deleted_or_disabled_store_is_not_schedulable() {
        let mut store = MonitoredStore::new("Shop", "https://shop.example.com", 600, 5);
        store.enabled = false;
        assert!(!store.is_schedulable());

        store.enabled = true;
        store.deleted_at = Some(Utc::now());
        assert!(!store.is_schedulable());
        assert!(store.is_deleted());
    }

    #[test]
    fn apply_changes_only_given_fields() {
        let mut store = MonitoredStore::new("Shop", "https://shop.example.com", 600, 5);
        let before = store.updated_at;
        store.apply(&StoreUpdate {
            low_stock_threshold: Some(2),
            enabled: Some(false),
            ..StoreUpdate::default()
        });
        assert_eq!(store.low_stock_threshold, 2);
        assert!(!store.enabled);
        assert_eq!(store.name, "Shop");
        assert_eq!(store.scan_interval_secs, 600);
        assert!(store.updated_at >= before);
    }
}
