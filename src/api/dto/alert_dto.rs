//! Alert log and stock report DTOs.

use serde::{Deserialize, Serialize};

use crate::domain::{
    AlertFilter, AlertKind, LoggedAlert, ObservationFilter, StockChange, StockObservation, StoreId,
};
use crate::service::LowStockItem;

/// Query parameters for `GET /alerts`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlertListParams {
    /// Only alerts of this store.
    #[serde(default)]
    pub store_id: Option<StoreId>,
    /// Only alerts of this kind.
    #[serde(default)]
    pub kind: Option<AlertKind>,
    /// Only resolved (`true`) or open (`false`) alerts.
    #[serde(default)]
    pub resolved: Option<bool>,
    /// Alerts to skip.
    #[serde(default)]
    pub offset: usize,
    /// Page size, 1 to 1000. Defaults to 100.
    #[serde(default)]
    pub limit: Option<usize>,
}

impl AlertListParams {
    /// The filter part of the query.
    #[must_use]
    pub const fn filter(&self) -> AlertFilter {
        AlertFilter {
            store_id: self.store_id,
            kind: self.kind,
            resolved: self.resolved,
        }
    }
}

/// Response body for `GET /alerts`.
#[derive(Debug, Serialize)]
pub struct AlertListResponse {
    /// Alerts, newest first.
    pub data: Vec<LoggedAlert>,
    /// Alerts skipped.
    pub offset: usize,
}

/// Query parameters for `GET /low-stock`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LowStockParams {
    /// Upper bound on quantity. Each store's own threshold when absent.
    #[serde(default)]
    pub threshold: Option<u64>,
}

/// Response body for `GET /low-stock`.
#[derive(Debug, Serialize)]
pub struct LowStockResponse {
    /// Threshold applied to every store, if one was given.
    pub threshold: Option<u64>,
    /// Items, lowest quantity first.
    pub data: Vec<LowStockItem>,
}

/// Query parameters for `GET /stores/{id}/stock-history`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StockHistoryParams {
    /// Only this SKU.
    #[serde(default)]
    pub sku: Option<String>,
    /// Only this storefront variant.
    #[serde(default)]
    pub variant_id: Option<String>,
    /// Window in days, 1 to 90. Defaults to 7.
    #[serde(default)]
    pub days: Option<u32>,
}

impl StockHistoryParams {
    /// The filter part of the query.
    #[must_use]
    pub fn filter(&self) -> ObservationFilter {
        ObservationFilter {
            sku: self.sku.clone(),
            variant_id: self.variant_id.clone(),
        }
    }
}

/// Response body for `GET /stores/{id}/stock-history`.
#[derive(Debug, Serialize)]
pub struct StockHistoryResponse {
    /// Store identifier.
    pub store_id: StoreId,
    /// Window in days.
    pub days: u32,
    /// Observations, newest first.
    pub data: Vec<StockObservation>,
}

/// Query parameters for `GET /stores/{id}/stock-changes`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StockChangeParams {
    /// Window in hours, 1 to 168. Defaults to 24.
    #[serde(default)]
    pub hours: Option<u32>,
}

/// Response body for `GET /stores/{id}/stock-changes`.
#[derive(Debug, Serialize)]
pub struct StockChangeResponse {
    /// Store identifier.
    pub store_id: StoreId,
    /// Window in hours.
    pub hours: u32,
    /// Per-SKU movement, largest first.
    pub data: Vec<StockChange>,
}
