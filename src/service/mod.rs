//! Service layer: business logic orchestration.
//!
//! [`MonitorService`] validates store and webhook management requests,
//! persists them, keeps the [`crate::engine::ScanScheduler`] in sync, and
//! exposes manual scans, scan history, the alert log and stock reports to
//! the API layer.

pub mod monitor_service;

pub use monitor_service::{
    LowStockItem, MonitorService, MonitorSettings, NewStore, NewWebhook, ScanStatus,
    WebhookUpdate,
};
