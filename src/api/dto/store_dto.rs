//! Store DTOs for create, get, list and inventory endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::common_dto::PaginationMeta;
use crate::domain::{InventorySnapshot, MonitoredStore, ProductRecord, StoreId};
use crate::service::NewStore;

/// Request body for `POST /stores`.
#[derive(Debug, Deserialize)]
pub struct CreateStoreRequest {
    /// Display name.
    pub name: String,
    /// Storefront base URL.
    pub url: String,
    /// Seconds between scheduled scans.
    #[serde(default)]
    pub scan_interval_secs: Option<u64>,
    /// Low-stock threshold.
    #[serde(default)]
    pub low_stock_threshold: Option<u64>,
    /// Raise low-stock alerts.
    #[serde(default)]
    pub notify_low_stock: Option<bool>,
    /// Run scheduled scans.
    #[serde(default)]
    pub enabled: Option<bool>,
}

impl From<CreateStoreRequest> for NewStore {
    fn from(req: CreateStoreRequest) -> Self {
        Self {
            name: req.name,
            url: req.url,
            scan_interval_secs: req.scan_interval_secs,
            low_stock_threshold: req.low_stock_threshold,
            notify_low_stock: req.notify_low_stock,
            enabled: req.enabled,
        }
    }
}

/// A store as returned by the API.
#[derive(Debug, Serialize, Deserialize)]
pub struct StoreDto {
    /// Store identifier.
    pub store_id: StoreId,
    /// Display name.
    pub name: String,
    /// Storefront base URL.
    pub url: String,
    /// Seconds between scheduled scans.
    pub scan_interval_secs: u64,
    /// Low-stock threshold.
    pub low_stock_threshold: u64,
    /// Whether low-stock alerts are raised.
    pub notify_low_stock: bool,
    /// Whether scheduled scans run.
    pub enabled: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last settings change.
    pub updated_at: DateTime<Utc>,
    /// Start of the last successful scan.
    pub last_scan_at: Option<DateTime<Utc>>,
}

impl From<MonitoredStore> for StoreDto {
    fn from(store: MonitoredStore) -> Self {
        Self {
            store_id: store.id,
            name: store.name,
            url: store.url,
            scan_interval_secs: store.scan_interval_secs,
            low_stock_threshold: store.low_stock_threshold,
            notify_low_stock: store.notify_low_stock,
            enabled: store.enabled,
            created_at: store.created_at,
            updated_at: store.updated_at,
            last_scan_at: store.last_scan_at,
        }
    }
}

/// Paginated list response for `GET /stores`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StoreListResponse {
    /// Stores on this page.
    pub data: Vec<StoreDto>,
    /// Pagination metadata.
    pub pagination: PaginationMeta,
}

/// Response body for `GET /stores/{id}/inventory`.
#[derive(Debug, Serialize, Deserialize)]
pub struct InventoryResponse {
    /// Store identifier.
    pub store_id: StoreId,
    /// Snapshot time; `None` before the first successful scan.
    pub taken_at: Option<DateTime<Utc>>,
    /// Distinct SKUs.
    pub product_count: usize,
    /// Sum of all quantities.
    pub total_stock: u64,
    /// Products in SKU order.
    pub products: Vec<ProductRecord>,
}

impl InventoryResponse {
    /// Builds the response, empty when no snapshot exists yet.
    #[must_use]
    pub fn new(store_id: StoreId, snapshot: Option<&InventorySnapshot>) -> Self {
        match snapshot {
            Some(snapshot) => Self {
                store_id,
                taken_at: Some(snapshot.taken_at()),
                product_count: snapshot.len(),
                total_stock: snapshot.total_stock(),
                products: snapshot.products().to_vec(),
            },
            None => Self {
                store_id,
                taken_at: None,
                product_count: 0,
                total_stock: 0,
                products: Vec::new(),
            },
        }
    }
}
