//! Scan outcomes and persisted scan history.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Alert, ChangeEvent, InventorySnapshot, ScanId, StoreId};
use crate::error::ScanError;

/// What started a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanTrigger {
    /// The store's recurring timer fired.
    Scheduled,
    /// An operator requested an immediate scan.
    Manual,
}

impl ScanTrigger {
    /// Returns the trigger as a static string slice.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Manual => "manual",
        }
    }

    /// Parses the storage representation, defaulting to `Scheduled`.
    #[must_use]
    pub fn from_str_lossy(value: &str) -> Self {
        match value {
            "manual" => Self::Manual,
            _ => Self::Scheduled,
        }
    }
}

/// Result of one orchestrated scan.
///
/// Failures are carried in `error`; the orchestrator never returns them as
/// an `Err`.
#[derive(Debug, Clone)]
pub struct ScanResult {
    /// Scan identifier.
    pub scan_id: ScanId,
    /// Store that was scanned.
    pub store_id: StoreId,
    /// What started the scan.
    pub trigger: ScanTrigger,
    /// Whether the new snapshot became current.
    pub success: bool,
    /// The new snapshot, present on success.
    pub snapshot: Option<Arc<InventorySnapshot>>,
    /// Changes relative to the previous snapshot, in SKU order.
    pub change_events: Vec<ChangeEvent>,
    /// Alerts raised from `change_events`.
    pub alerts: Vec<Alert>,
    /// Terminal failure, present when `success` is `false`.
    pub error: Option<ScanError>,
    /// Fetch attempts made.
    pub attempts: u32,
    /// Scan start time.
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration of the whole scan.
    pub duration: Duration,
}

impl ScanResult {
    /// A failed result with no snapshot, events or alerts.
    #[must_use]
    pub fn failure(
        store_id: StoreId,
        trigger: ScanTrigger,
        started_at: DateTime<Utc>,
        attempts: u32,
        error: ScanError,
    ) -> Self {
        Self {
            scan_id: ScanId::new(),
            store_id,
            trigger,
            success: false,
            snapshot: None,
            change_events: Vec::new(),
            alerts: Vec::new(),
            error: Some(error),
            attempts,
            started_at,
            duration: Duration::ZERO,
        }
    }

    /// Condenses the result into a history row.
    #[must_use]
    pub fn to_record(&self) -> ScanRecord {
        ScanRecord {
            scan_id: self.scan_id,
            store_id: self.store_id,
            trigger: self.trigger,
            started_at: self.started_at,
            duration_ms: u64::try_from(self.duration.as_millis()).unwrap_or(u64::MAX),
            success: self.success,
            attempts: self.attempts,
            product_count: self.snapshot.as_ref().map_or(0, |s| s.len() as u64),
            total_stock: self.snapshot.as_ref().map_or(0, |s| s.total_stock()),
            event_count: self.change_events.len() as u64,
            alert_count: self.alerts.len() as u64,
            error: self.error.as_ref().map(ToString::to_string),
        }
    }
}

/// One row of scan history, queryable per store by time range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRecord {
    /// Scan identifier.
    pub scan_id: ScanId,
    /// Store that was scanned.
    pub store_id: StoreId,
    /// What started the scan.
    pub trigger: ScanTrigger,
    /// Scan start time.
    pub started_at: DateTime<Utc>,
    /// Duration in milliseconds.
    pub duration_ms: u64,
    /// Whether the snapshot was replaced.
    pub success: bool,
    /// Fetch attempts made.
    pub attempts: u32,
    /// Distinct SKUs in the new snapshot.
    pub product_count: u64,
    /// Sum of quantities in the new snapshot.
    pub total_stock: u64,
    /// Number of change events.
    pub event_count: u64,
    /// Number of alerts raised.
    pub alert_count: u64,
    /// Error description of a failed scan.
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::snapshot::record;

    #[test]
    fn record_summarizes_successful_scan() {
        let store_id = StoreId::new();
        let snapshot = InventorySnapshot::new(
            store_id,
            Utc::now(),
            vec![record("A", 2, 100), record("B", 3, 100)],
        );
        let result = ScanResult {
            scan_id: ScanId::new(),
            store_id,
            trigger: ScanTrigger::Scheduled,
            success: true,
            snapshot: Some(Arc::new(snapshot)),
            change_events: Vec::new(),
            alerts: Vec::new(),
            error: None,
            attempts: 1,
            started_at: Utc::now(),
            duration: Duration::from_millis(1500),
        };
        let row = result.to_record();
        assert!(row.success);
        assert_eq!(row.duration_ms, 1500);
        assert_eq!(row.product_count, 2);
        assert_eq!(row.total_stock, 5);
        assert!(row.error.is_none());
    }

    #[test]
    fn record_keeps_failure_text() {
        let result = ScanResult::failure(
            StoreId::new(),
            ScanTrigger::Manual,
            Utc::now(),
            1,
            ScanError::PermanentFetch("HTTP 404".to_string()),
        );
        let row = result.to_record();
        assert!(!row.success);
        assert_eq!(row.product_count, 0);
        assert!(row.error.is_some_and(|e| e.contains("404")));
    }
}
