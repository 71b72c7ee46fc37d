//! Database row models and their conversions to domain types.
//!
//! PostgreSQL has no unsigned integers, so counters and quantities are
//! stored as `BIGINT` and clamped on the way in and out.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    Alert, AlertId, AlertKind, DeliveryStatus, InventorySnapshot, LoggedAlert, MonitoredStore,
    ProductRecord, ScanId, ScanRecord, ScanTrigger, StockChange, StockObservation, StoreId,
    WebhookId, WebhookRegistration,
};
use crate::error::PersistenceError;

/// Column tuple selected from `stores`.
pub type StoreTuple = (
    Uuid,
    String,
    String,
    i64,
    i64,
    bool,
    bool,
    DateTime<Utc>,
    DateTime<Utc>,
    Option<DateTime<Utc>>,
    Option<DateTime<Utc>>,
);

/// Column tuple selected from `scan_history`.
pub type ScanHistoryTuple = (
    Uuid,
    Uuid,
    String,
    DateTime<Utc>,
    i64,
    bool,
    i32,
    i64,
    i64,
    i64,
    i64,
    Option<String>,
);

/// Column tuple selected from `webhooks`.
pub type WebhookTuple = (
    Uuid,
    Option<Uuid>,
    String,
    serde_json::Value,
    bool,
    Option<String>,
    String,
    i64,
    Option<DateTime<Utc>>,
    Option<String>,
    DateTime<Utc>,
);

/// Column tuple selected from `alert_log`.
pub type AlertLogTuple = (
    Uuid,
    Uuid,
    String,
    String,
    String,
    i64,
    i64,
    i64,
    DateTime<Utc>,
    Option<DateTime<Utc>>,
);

/// Column tuple selected from `stock_history`.
pub type StockHistoryTuple = (Uuid, String, String, String, i64, i64, DateTime<Utc>);

/// Per-SKU aggregate selected from `stock_history`: sku, latest title,
/// min, max and mean quantity.
pub type StockChangeTuple = (String, String, i64, i64, f64);

/// A row of the `stores` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreRow {
    /// Store identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Normalized storefront URL.
    pub url: String,
    /// Seconds between scheduled scans.
    pub scan_interval_secs: i64,
    /// Low-stock threshold.
    pub low_stock_threshold: i64,
    /// Whether low-stock alerts are raised.
    pub notify_low_stock: bool,
    /// Whether scheduled scans run.
    pub enabled: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last settings change.
    pub updated_at: DateTime<Utc>,
    /// Soft-delete marker.
    pub deleted_at: Option<DateTime<Utc>>,
    /// Start of the last successful scan.
    pub last_scan_at: Option<DateTime<Utc>>,
}

impl From<StoreTuple> for StoreRow {
    fn from(t: StoreTuple) -> Self {
        let (
            id,
            name,
            url,
            scan_interval_secs,
            low_stock_threshold,
            notify_low_stock,
            enabled,
            created_at,
            updated_at,
            deleted_at,
            last_scan_at,
        ) = t;
        Self {
            id,
            name,
            url,
            scan_interval_secs,
            low_stock_threshold,
            notify_low_stock,
            enabled,
            created_at,
            updated_at,
            deleted_at,
            last_scan_at,
        }
    }
}

impl From<&MonitoredStore> for StoreRow {
    fn from(store: &MonitoredStore) -> Self {
        Self {
            id: *store.id.as_uuid(),
            name: store.name.clone(),
            url: store.url.clone(),
            scan_interval_secs: to_i64(store.scan_interval_secs),
            low_stock_threshold: to_i64(store.low_stock_threshold),
            notify_low_stock: store.notify_low_stock,
            enabled: store.enabled,
            created_at: store.created_at,
            updated_at: store.updated_at,
            deleted_at: store.deleted_at,
            last_scan_at: store.last_scan_at,
        }
    }
}

impl From<StoreRow> for MonitoredStore {
    fn from(row: StoreRow) -> Self {
        Self {
            id: StoreId::from_uuid(row.id),
            name: row.name,
            url: row.url,
            scan_interval_secs: to_u64(row.scan_interval_secs),
            low_stock_threshold: to_u64(row.low_stock_threshold),
            notify_low_stock: row.notify_low_stock,
            enabled: row.enabled,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
            last_scan_at: row.last_scan_at,
        }
    }
}

/// Converts a `scan_history` tuple into a domain record.
#[must_use]
pub fn scan_record_from_tuple(t: ScanHistoryTuple) -> ScanRecord {
    let (
        scan_id,
        store_id,
        trigger,
        started_at,
        duration_ms,
        success,
        attempts,
        product_count,
        total_stock,
        event_count,
        alert_count,
        error,
    ) = t;
    ScanRecord {
        scan_id: ScanId::from_uuid(scan_id),
        store_id: StoreId::from_uuid(store_id),
        trigger: ScanTrigger::from_str_lossy(&trigger),
        started_at,
        duration_ms: to_u64(duration_ms),
        success,
        attempts: u32::try_from(attempts).unwrap_or(0),
        product_count: to_u64(product_count),
        total_stock: to_u64(total_stock),
        event_count: to_u64(event_count),
        alert_count: to_u64(alert_count),
        error,
    }
}

/// Converts a `webhooks` tuple into a domain registration.
///
/// # Errors
///
/// Returns a [`PersistenceError`] if the `events` column is not a JSON
/// array of alert kinds.
pub fn webhook_from_tuple(t: WebhookTuple) -> Result<WebhookRegistration, PersistenceError> {
    let (
        id,
        store_id,
        url,
        events,
        active,
        secret,
        status,
        trigger_count,
        last_triggered_at,
        last_error,
        created_at,
    ) = t;
    let events: Vec<AlertKind> = serde_json::from_value(events)?;
    Ok(WebhookRegistration {
        id: WebhookId::from_uuid(id),
        store_id: store_id.map(StoreId::from_uuid),
        url,
        events,
        active,
        secret,
        status: DeliveryStatus::from_str_lossy(&status),
        trigger_count: to_u64(trigger_count),
        last_triggered_at,
        last_error,
        created_at,
    })
}

/// Converts an `alert_log` tuple into a logged alert.
///
/// # Errors
///
/// Returns a [`PersistenceError`] if `kind` is not a known alert kind.
pub fn logged_alert_from_tuple(t: AlertLogTuple) -> Result<LoggedAlert, PersistenceError> {
    let (id, store_id, sku, title, kind, before, after, threshold, raised_at, resolved_at) = t;
    let kind: AlertKind = kind.parse().map_err(PersistenceError)?;
    Ok(LoggedAlert {
        alert: Alert {
            id: AlertId::from_uuid(id),
            store_id: StoreId::from_uuid(store_id),
            sku,
            title,
            kind,
            before: to_u64(before),
            after: to_u64(after),
            threshold: to_u64(threshold),
            raised_at,
        },
        resolved_at,
    })
}

/// Converts a `stock_history` tuple into an observation.
#[must_use]
pub fn observation_from_tuple(t: StockHistoryTuple) -> StockObservation {
    let (store_id, sku, title, variant_id, quantity, price_cents, observed_at) = t;
    StockObservation {
        store_id: StoreId::from_uuid(store_id),
        sku,
        title,
        variant_id,
        quantity: to_u64(quantity),
        price_cents: to_u64(price_cents),
        observed_at,
    }
}

/// Converts a per-SKU aggregate into a change summary.
#[must_use]
pub fn stock_change_from_tuple(t: StockChangeTuple) -> StockChange {
    let (sku, title, min, max, avg) = t;
    StockChange::new(sku, title, to_u64(min), to_u64(max), avg)
}

/// Encodes a snapshot's records for the `current_snapshots.products` column.
///
/// # Errors
///
/// Returns a [`PersistenceError`] if serialization fails.
pub fn encode_products(snapshot: &InventorySnapshot) -> Result<serde_json::Value, PersistenceError> {
    Ok(serde_json::to_value(snapshot.products())?)
}

/// Rebuilds a snapshot from a `current_snapshots` row.
///
/// # Errors
///
/// Returns a [`PersistenceError`] if `products` is not a list of records.
pub fn decode_snapshot(
    store_id: Uuid,
    taken_at: DateTime<Utc>,
    products: serde_json::Value,
) -> Result<InventorySnapshot, PersistenceError> {
    let records: Vec<ProductRecord> = serde_json::from_value(products)?;
    Ok(InventorySnapshot::new(
        StoreId::from_uuid(store_id),
        taken_at,
        records,
    ))
}

/// Clamps an unsigned value into a `BIGINT`.
#[must_use]
pub fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Clamps a `BIGINT` into an unsigned value.
#[must_use]
pub fn to_u64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::snapshot::record;

    #[test]
    fn store_row_round_trips_through_domain() {
        let mut store = MonitoredStore::new("Shop", "https://shop.example.com", 900, 4);
        store.notify_low_stock = false;
        let row = StoreRow::from(&store);
        assert_eq!(row.scan_interval_secs, 900);
        assert_eq!(MonitoredStore::from(row), store);
    }

    #[test]
    fn snapshot_products_decode_sorted() {
        let id = StoreId::new();
        let snapshot = InventorySnapshot::new(
            id,
            Utc::now(),
            vec![record("B", 1, 100), record("A", 2, 200)],
        );
        let Ok(json) = encode_products(&snapshot) else {
            panic!("encode failed");
        };
        let Ok(decoded) = decode_snapshot(*id.as_uuid(), snapshot.taken_at(), json) else {
            panic!("decode failed");
        };
        assert_eq!(decoded, snapshot);
    }

    #[test]
    fn webhook_tuple_rejects_unknown_event_kind() {
        let tuple: WebhookTuple = (
            Uuid::new_v4(),
            None,
            "https://hooks.example.com".to_string(),
            serde_json::json!(["restocked"]),
            true,
            None,
            "healthy".to_string(),
            1,
            None,
            None,
            Utc::now(),
        );
        assert!(webhook_from_tuple(tuple).is_err());
    }

    #[test]
    fn alert_tuple_parses_kind() {
        let id = Uuid::new_v4();
        let tuple: AlertLogTuple = (
            id,
            Uuid::new_v4(),
            "A".to_string(),
            "Product A".to_string(),
            "back_in_stock".to_string(),
            0,
            4,
            0,
            Utc::now(),
            None,
        );
        let Ok(logged) = logged_alert_from_tuple(tuple) else {
            panic!("decode failed");
        };
        assert_eq!(logged.alert.kind, AlertKind::BackInStock);
        assert_eq!(logged.alert.after, 4);
        assert!(!logged.is_resolved());

        let mut bad: AlertLogTuple = (
            id,
            Uuid::new_v4(),
            "A".to_string(),
            "Product A".to_string(),
            "restocked".to_string(),
            0,
            4,
            0,
            Utc::now(),
            None,
        );
        assert!(logged_alert_from_tuple(bad.clone()).is_err());
        bad.4 = "low_stock".to_string();
        assert!(logged_alert_from_tuple(bad).is_ok());
    }

    #[test]
    fn aggregate_average_is_rounded() {
        let change = stock_change_from_tuple(("A".to_string(), "A".to_string(), 2, 5, 3.3333));
        assert_eq!(change.stock_change, 3);
        assert!((change.avg_stock - 3.33).abs() < f64::EPSILON);
    }

    #[test]
    fn negative_columns_clamp_to_zero() {
        assert_eq!(to_u64(-5), 0);
        assert_eq!(to_i64(u64::MAX), i64::MAX);
    }
}
