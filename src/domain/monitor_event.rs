//! Observability events published by the scanning engine.
//!
//! Every scan outcome, overlap skip and raised alert is published as a
//! [`MonitorEvent`] through the [`super::EventBus`]. Subscribers are
//! in-process observers (logging sinks, tests).

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{Alert, ScanId, ScanTrigger, StoreId};

/// Why a scan did not start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// A scheduled tick found the previous scan still running.
    Overlap,
    /// A manual trigger found a scan already running.
    Busy,
}

/// Engine event emitted after scans and alert evaluation.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum MonitorEvent {
    /// A scan replaced the store's snapshot.
    ScanCompleted {
        /// Store identifier.
        store_id: StoreId,
        /// Scan identifier.
        scan_id: ScanId,
        /// What started the scan.
        trigger: ScanTrigger,
        /// Number of change events.
        event_count: usize,
        /// Scan duration in milliseconds.
        duration_ms: u64,
        /// Completion timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A scan ended without replacing the snapshot.
    ScanFailed {
        /// Store identifier.
        store_id: StoreId,
        /// Scan identifier.
        scan_id: ScanId,
        /// What started the scan.
        trigger: ScanTrigger,
        /// Failure description.
        error: String,
        /// Completion timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A tick or trigger was dropped because a scan was in flight.
    ScanSkipped {
        /// Store identifier.
        store_id: StoreId,
        /// Why the scan did not start.
        reason: SkipReason,
        /// Timestamp of the dropped request.
        timestamp: DateTime<Utc>,
    },

    /// An alert rule fired.
    AlertRaised {
        /// The raised alert.
        alert: Alert,
    },
}

impl MonitorEvent {
    /// Returns the store ID associated with this event.
    #[must_use]
    pub const fn store_id(&self) -> StoreId {
        match self {
            Self::ScanCompleted { store_id, .. }
            | Self::ScanFailed { store_id, .. }
            | Self::ScanSkipped { store_id, .. } => *store_id,
            Self::AlertRaised { alert } => alert.store_id,
        }
    }

    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::ScanCompleted { .. } => "scan_completed",
            Self::ScanFailed { .. } => "scan_failed",
            Self::ScanSkipped { .. } => "scan_skipped",
            Self::AlertRaised { .. } => "alert_raised",
        }
    }
}
