//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::domain::EventBus;
use crate::service::MonitorService;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Monitor service for all business logic.
    pub monitor: Arc<MonitorService>,
    /// Event bus carrying scan and alert events.
    pub event_bus: EventBus,
}

impl AppState {
    /// Builds the state around `monitor`, sharing its event bus.
    #[must_use]
    pub fn new(monitor: Arc<MonitorService>) -> Self {
        let event_bus = monitor.event_bus().clone();
        Self { monitor, event_bus }
    }
}
