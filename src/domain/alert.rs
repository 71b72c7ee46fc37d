//! Alert rules and raised alerts.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AlertId, MonitoredStore, StoreId};

/// Condition an alert rule watches for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// Quantity crossed down to or below the threshold.
    LowStock,
    /// Quantity reached zero.
    OutOfStock,
    /// Quantity recovered from zero.
    BackInStock,
}

impl AlertKind {
    /// Returns the kind as a static string slice.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LowStock => "low_stock",
            Self::OutOfStock => "out_of_stock",
            Self::BackInStock => "back_in_stock",
        }
    }
}

impl FromStr for AlertKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "low_stock" => Ok(Self::LowStock),
            "out_of_stock" => Ok(Self::OutOfStock),
            "back_in_stock" => Ok(Self::BackInStock),
            other => Err(format!("unknown alert kind: {other}")),
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stateless alert rule evaluated after every scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRule {
    /// Store the rule applies to.
    pub store_id: StoreId,
    /// Condition to watch.
    pub kind: AlertKind,
    /// Quantity threshold. Only meaningful for [`AlertKind::LowStock`].
    pub threshold: u64,
}

impl AlertRule {
    /// Derives the rule set from a store's settings.
    ///
    /// Out-of-stock and back-in-stock rules are always present; the
    /// low-stock rule only when the store has `notify_low_stock` set.
    #[must_use]
    pub fn for_store(store: &MonitoredStore) -> Vec<Self> {
        let mut rules = Vec::with_capacity(3);
        if store.notify_low_stock {
            rules.push(Self {
                store_id: store.id,
                kind: AlertKind::LowStock,
                threshold: store.low_stock_threshold,
            });
        }
        rules.push(Self {
            store_id: store.id,
            kind: AlertKind::OutOfStock,
            threshold: 0,
        });
        rules.push(Self {
            store_id: store.id,
            kind: AlertKind::BackInStock,
            threshold: 0,
        });
        rules
    }
}

/// An alert raised for one SKU by one rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    /// Alert identifier.
    pub id: AlertId,
    /// Store the alert belongs to.
    pub store_id: StoreId,
    /// Affected SKU.
    pub sku: String,
    /// Product title.
    pub title: String,
    /// Rule that fired.
    pub kind: AlertKind,
    /// Quantity before the scan.
    pub before: u64,
    /// Quantity after the scan.
    pub after: u64,
    /// Threshold of the rule that fired.
    pub threshold: u64,
    /// Timestamp of the snapshot that triggered the alert.
    pub raised_at: DateTime<Utc>,
}

impl Alert {
    /// Key identifying the underlying transition.
    ///
    /// Two alerts for the same store, SKU, kind and snapshot time share a
    /// key, letting receivers drop repeated deliveries.
    #[must_use]
    pub fn dedup_key(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.store_id,
            self.sku,
            self.kind,
            self.raised_at.timestamp_millis()
        )
    }
}

/// An alert as kept in the alert log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggedAlert {
    /// The alert as raised.
    #[serde(flatten)]
    pub alert: Alert,
    /// When an operator acknowledged it.
    pub resolved_at: Option<DateTime<Utc>>,
}

impl LoggedAlert {
    /// Wraps a freshly raised, unresolved alert.
    #[must_use]
    pub const fn open(alert: Alert) -> Self {
        Self {
            alert,
            resolved_at: None,
        }
    }

    /// Returns `true` once resolved.
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        self.resolved_at.is_some()
    }

    /// Marks the alert resolved at `at`. Resolving twice keeps the first
    /// timestamp.
    pub fn resolve(&mut self, at: DateTime<Utc>) {
        self.resolved_at.get_or_insert(at);
    }
}

/// Selection applied when listing the alert log. Unset fields match all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlertFilter {
    /// Only alerts of this store.
    pub store_id: Option<StoreId>,
    /// Only alerts of this kind.
    pub kind: Option<AlertKind>,
    /// Only resolved (`true`) or open (`false`) alerts.
    pub resolved: Option<bool>,
}

impl AlertFilter {
    /// Returns `true` if `entry` passes every set criterion.
    #[must_use]
    pub fn matches(&self, entry: &LoggedAlert) -> bool {
        self.store_id.is_none_or(|id| entry.alert.store_id == id)
            && self.kind.is_none_or(|kind| entry.alert.kind == kind)
            && self
                .resolved
                .is_none_or(|resolved| entry.is_resolved() == resolved)
    }
}
