//! Scan DTOs for manual triggers and history queries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Alert, ChangeEvent, ScanId, ScanRecord, ScanResult, ScanTrigger, StoreId};
use crate::error::ScanError;

/// Response body for `POST /stores/{id}/scan`.
///
/// A failed scan is still a `200`: the trigger itself succeeded and the
/// failure is described by `success` and `error`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ScanResponse {
    /// Scan identifier.
    pub scan_id: ScanId,
    /// Scanned store.
    pub store_id: StoreId,
    /// What started the scan.
    pub trigger: ScanTrigger,
    /// Whether the snapshot was replaced.
    pub success: bool,
    /// Fetch attempts made.
    pub attempts: u32,
    /// Scan start time.
    pub started_at: DateTime<Utc>,
    /// Duration in milliseconds.
    pub duration_ms: u64,
    /// Distinct SKUs in the new snapshot.
    pub product_count: u64,
    /// Sum of quantities in the new snapshot.
    pub total_stock: u64,
    /// Detected changes.
    pub change_events: Vec<ChangeEvent>,
    /// Alerts raised.
    pub alerts: Vec<Alert>,
    /// Terminal failure.
    pub error: Option<ScanError>,
}

impl From<ScanResult> for ScanResponse {
    fn from(result: ScanResult) -> Self {
        let record = result.to_record();
        Self {
            scan_id: result.scan_id,
            store_id: result.store_id,
            trigger: result.trigger,
            success: result.success,
            attempts: result.attempts,
            started_at: result.started_at,
            duration_ms: record.duration_ms,
            product_count: record.product_count,
            total_stock: record.total_stock,
            change_events: result.change_events,
            alerts: result.alerts,
            error: result.error,
        }
    }
}

/// Query parameters for `GET /stores/{id}/scans`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScanHistoryParams {
    /// Inclusive lower bound (RFC 3339).
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound (RFC 3339).
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
}

/// Response body for `GET /stores/{id}/scans`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ScanHistoryResponse {
    /// Store identifier.
    pub store_id: StoreId,
    /// History rows, oldest first.
    pub data: Vec<ScanRecord>,
}
