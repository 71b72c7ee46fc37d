//! PostgreSQL implementation of the persistence layer.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::models::{
    AlertLogTuple, ScanHistoryTuple, StockChangeTuple, StockHistoryTuple, StoreRow, StoreTuple,
    WebhookTuple, decode_snapshot, encode_products, logged_alert_from_tuple,
    observation_from_tuple, scan_record_from_tuple, stock_change_from_tuple, to_i64,
    webhook_from_tuple,
};
use super::{
    AlertLog, ScanHistory, SnapshotStore, StockHistory, StoreRepository, WebhookRepository,
};
use crate::domain::{
    Alert, AlertFilter, AlertId, DeliveryOutcome, InventorySnapshot, LoggedAlert, MonitoredStore,
    ObservationFilter, ScanRecord, StockChange, StockObservation, StoreId, WebhookId,
    WebhookRegistration, stock_history::sort_changes,
};
use crate::error::PersistenceError;

const STORE_COLUMNS: &str = "id, name, url, scan_interval_secs, low_stock_threshold, \
     notify_low_stock, enabled, created_at, updated_at, deleted_at, last_scan_at";

const ALERT_COLUMNS: &str = "id, store_id, sku, title, kind, before_qty, after_qty, threshold, \
     raised_at, resolved_at";

const WEBHOOK_COLUMNS: &str = "id, store_id, url, events, active, secret, status, \
     trigger_count, last_triggered_at, last_error, created_at";

/// PostgreSQL-backed persistence using `sqlx::PgPool`.
///
/// One value implements every persistence trait; wrap it in an `Arc` and
/// hand clones of that to each consumer.
#[derive(Debug, Clone)]
pub struct PostgresPersistence {
    pool: PgPool,
}

impl PostgresPersistence {
    /// Creates a new persistence layer with the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the bundled schema migrations.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), PersistenceError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl SnapshotStore for PostgresPersistence {
    async fn get_current(
        &self,
        store_id: StoreId,
    ) -> Result<Option<Arc<InventorySnapshot>>, PersistenceError> {
        let row = sqlx::query_as::<_, (Uuid, DateTime<Utc>, serde_json::Value)>(
            "SELECT store_id, taken_at, products FROM current_snapshots WHERE store_id = $1",
        )
        .bind(store_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(id, taken_at, products)| decode_snapshot(id, taken_at, products).map(Arc::new))
            .transpose()
    }

    async fn replace_current(
        &self,
        store_id: StoreId,
        snapshot: Arc<InventorySnapshot>,
    ) -> Result<(), PersistenceError> {
        let products = encode_products(&snapshot)?;
        sqlx::query(
            "INSERT INTO current_snapshots (store_id, taken_at, products) VALUES ($1, $2, $3) \
             ON CONFLICT (store_id) DO UPDATE \
             SET taken_at = EXCLUDED.taken_at, products = EXCLUDED.products",
        )
        .bind(store_id.as_uuid())
        .bind(snapshot.taken_at())
        .bind(products)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn discard(&self, store_id: StoreId) -> Result<bool, PersistenceError> {
        let result = sqlx::query("DELETE FROM current_snapshots WHERE store_id = $1")
            .bind(store_id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ScanHistory for PostgresPersistence {
    async fn record(&self, record: &ScanRecord) -> Result<(), PersistenceError> {
        sqlx::query(
            "INSERT INTO scan_history (scan_id, store_id, trigger, started_at, duration_ms, \
             success, attempts, product_count, total_stock, event_count, alert_count, error) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(record.scan_id.as_uuid())
        .bind(record.store_id.as_uuid())
        .bind(record.trigger.as_str())
        .bind(record.started_at)
        .bind(to_i64(record.duration_ms))
        .bind(record.success)
        .bind(i32::try_from(record.attempts).unwrap_or(i32::MAX))
        .bind(to_i64(record.product_count))
        .bind(to_i64(record.total_stock))
        .bind(to_i64(record.event_count))
        .bind(to_i64(record.alert_count))
        .bind(record.error.as_deref())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn query(
        &self,
        store_id: StoreId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ScanRecord>, PersistenceError> {
        let rows = sqlx::query_as::<_, ScanHistoryTuple>(
            "SELECT scan_id, store_id, trigger, started_at, duration_ms, success, attempts, \
             product_count, total_stock, event_count, alert_count, error FROM scan_history \
             WHERE store_id = $1 AND started_at >= $2 AND started_at < $3 \
             ORDER BY started_at ASC",
        )
        .bind(store_id.as_uuid())
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(scan_record_from_tuple).collect())
    }

    async fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<u64, PersistenceError> {
        let result = sqlx::query("DELETE FROM scan_history WHERE started_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl StoreRepository for PostgresPersistence {
    async fn insert(&self, store: &MonitoredStore) -> Result<(), PersistenceError> {
        let row = StoreRow::from(store);
        sqlx::query(&format!(
            "INSERT INTO stores ({STORE_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
        ))
        .bind(row.id)
        .bind(row.name)
        .bind(row.url)
        .bind(row.scan_interval_secs)
        .bind(row.low_stock_threshold)
        .bind(row.notify_low_stock)
        .bind(row.enabled)
        .bind(row.created_at)
        .bind(row.updated_at)
        .bind(row.deleted_at)
        .bind(row.last_scan_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, store_id: StoreId) -> Result<Option<MonitoredStore>, PersistenceError> {
        let row = sqlx::query_as::<_, StoreTuple>(&format!(
            "SELECT {STORE_COLUMNS} FROM stores WHERE id = $1"
        ))
        .bind(store_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|t| MonitoredStore::from(StoreRow::from(t))))
    }

    async fn update(&self, store: &MonitoredStore) -> Result<(), PersistenceError> {
        let row = StoreRow::from(store);
        let result = sqlx::query(
            "UPDATE stores SET name = $2, url = $3, scan_interval_secs = $4, \
             low_stock_threshold = $5, notify_low_stock = $6, enabled = $7, updated_at = $8, \
             deleted_at = $9 WHERE id = $1",
        )
        .bind(row.id)
        .bind(row.name)
        .bind(row.url)
        .bind(row.scan_interval_secs)
        .bind(row.low_stock_threshold)
        .bind(row.notify_low_stock)
        .bind(row.enabled)
        .bind(row.updated_at)
        .bind(row.deleted_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError(format!("store {} does not exist", store.id)));
        }
        Ok(())
    }

    async fn mark_scanned(
        &self,
        store_id: StoreId,
        at: DateTime<Utc>,
    ) -> Result<(), PersistenceError> {
        sqlx::query("UPDATE stores SET last_scan_at = $2 WHERE id = $1")
            .bind(store_id.as_uuid())
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn soft_delete(
        &self,
        store_id: StoreId,
        at: DateTime<Utc>,
    ) -> Result<bool, PersistenceError> {
        let result = sqlx::query(
            "UPDATE stores SET deleted_at = $2, updated_at = $2 \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(store_id.as_uuid())
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_active(&self) -> Result<Vec<MonitoredStore>, PersistenceError> {
        let rows = sqlx::query_as::<_, StoreTuple>(&format!(
            "SELECT {STORE_COLUMNS} FROM stores WHERE deleted_at IS NULL ORDER BY created_at ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|t| MonitoredStore::from(StoreRow::from(t)))
            .collect())
    }
}

#[async_trait]
impl WebhookRepository for PostgresPersistence {
    async fn insert(&self, webhook: &WebhookRegistration) -> Result<(), PersistenceError> {
        let events = serde_json::to_value(&webhook.events)?;
        sqlx::query(&format!(
            "INSERT INTO webhooks ({WEBHOOK_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
        ))
        .bind(webhook.id.as_uuid())
        .bind(webhook.store_id.map(|id| *id.as_uuid()))
        .bind(&webhook.url)
        .bind(events)
        .bind(webhook.active)
        .bind(webhook.secret.as_deref())
        .bind(webhook.status.as_str())
        .bind(to_i64(webhook.trigger_count))
        .bind(webhook.last_triggered_at)
        .bind(webhook.last_error.as_deref())
        .bind(webhook.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: WebhookId) -> Result<Option<WebhookRegistration>, PersistenceError> {
        let row = sqlx::query_as::<_, WebhookTuple>(&format!(
            "SELECT {WEBHOOK_COLUMNS} FROM webhooks WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.map(webhook_from_tuple).transpose()
    }

    async fn list_for_store(
        &self,
        store_id: Option<StoreId>,
    ) -> Result<Vec<WebhookRegistration>, PersistenceError> {
        let rows = if let Some(id) = store_id {
            sqlx::query_as::<_, WebhookTuple>(&format!(
                "SELECT {WEBHOOK_COLUMNS} FROM webhooks \
                 WHERE store_id = $1 OR store_id IS NULL ORDER BY created_at ASC"
            ))
            .bind(id.as_uuid())
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, WebhookTuple>(&format!(
                "SELECT {WEBHOOK_COLUMNS} FROM webhooks ORDER BY created_at ASC"
            ))
            .fetch_all(&self.pool)
            .await
        }?;
        rows.into_iter().map(webhook_from_tuple).collect()
    }

    async fn update(&self, webhook: &WebhookRegistration) -> Result<(), PersistenceError> {
        let events = serde_json::to_value(&webhook.events)?;
        let result = sqlx::query(
            "UPDATE webhooks SET store_id = $2, url = $3, events = $4, active = $5, \
             secret = $6 WHERE id = $1",
        )
        .bind(webhook.id.as_uuid())
        .bind(webhook.store_id.map(|id| *id.as_uuid()))
        .bind(&webhook.url)
        .bind(events)
        .bind(webhook.active)
        .bind(webhook.secret.as_deref())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError(format!(
                "webhook {} does not exist",
                webhook.id
            )));
        }
        Ok(())
    }

    async fn delete(&self, id: WebhookId) -> Result<bool, PersistenceError> {
        let result = sqlx::query("DELETE FROM webhooks WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn record_delivery(
        &self,
        id: WebhookId,
        outcome: &DeliveryOutcome,
    ) -> Result<(), PersistenceError> {
        // Same transitions as `WebhookRegistration::record_outcome`.
        sqlx::query(
            "UPDATE webhooks SET last_triggered_at = $2, last_error = $3, \
             status = CASE WHEN $3::TEXT IS NULL THEN 'healthy' ELSE 'failing' END, \
             trigger_count = trigger_count + CASE WHEN $3::TEXT IS NULL THEN 1 ELSE 0 END \
             WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(outcome.at)
        .bind(outcome.error.as_deref())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl AlertLog for PostgresPersistence {
    async fn append(&self, alerts: &[Alert]) -> Result<(), PersistenceError> {
        if alerts.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for alert in alerts {
            sqlx::query(&format!(
                "INSERT INTO alert_log ({ALERT_COLUMNS}) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NULL)"
            ))
            .bind(alert.id.as_uuid())
            .bind(alert.store_id.as_uuid())
            .bind(&alert.sku)
            .bind(&alert.title)
            .bind(alert.kind.as_str())
            .bind(to_i64(alert.before))
            .bind(to_i64(alert.after))
            .bind(to_i64(alert.threshold))
            .bind(alert.raised_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn list(
        &self,
        filter: &AlertFilter,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<LoggedAlert>, PersistenceError> {
        let rows = sqlx::query_as::<_, AlertLogTuple>(&format!(
            "SELECT {ALERT_COLUMNS} FROM alert_log \
             WHERE ($1::UUID IS NULL OR store_id = $1) \
             AND ($2::TEXT IS NULL OR kind = $2) \
             AND ($3::BOOLEAN IS NULL OR (resolved_at IS NOT NULL) = $3) \
             ORDER BY raised_at DESC, id ASC OFFSET $4 LIMIT $5"
        ))
        .bind(filter.store_id.map(|id| *id.as_uuid()))
        .bind(filter.kind.map(|kind| kind.as_str()))
        .bind(filter.resolved)
        .bind(i64::try_from(offset).unwrap_or(i64::MAX))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(logged_alert_from_tuple).collect()
    }

    async fn resolve(
        &self,
        id: AlertId,
        at: DateTime<Utc>,
    ) -> Result<Option<LoggedAlert>, PersistenceError> {
        let row = sqlx::query_as::<_, AlertLogTuple>(&format!(
            "UPDATE alert_log SET resolved_at = COALESCE(resolved_at, $2) \
             WHERE id = $1 RETURNING {ALERT_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(at)
        .fetch_optional(&self.pool)
        .await?;
        row.map(logged_alert_from_tuple).transpose()
    }

    async fn prune_resolved_before(&self, cutoff: DateTime<Utc>) -> Result<u64, PersistenceError> {
        let result = sqlx::query(
            "DELETE FROM alert_log WHERE resolved_at IS NOT NULL AND resolved_at < $1",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl StockHistory for PostgresPersistence {
    async fn record(&self, observations: &[StockObservation]) -> Result<(), PersistenceError> {
        if observations.is_empty() {
            return Ok(());
        }
        let mut store_ids = Vec::with_capacity(observations.len());
        let mut skus = Vec::with_capacity(observations.len());
        let mut titles = Vec::with_capacity(observations.len());
        let mut variant_ids = Vec::with_capacity(observations.len());
        let mut quantities = Vec::with_capacity(observations.len());
        let mut prices = Vec::with_capacity(observations.len());
        let mut observed = Vec::with_capacity(observations.len());
        for obs in observations {
            store_ids.push(*obs.store_id.as_uuid());
            skus.push(obs.sku.clone());
            titles.push(obs.title.clone());
            variant_ids.push(obs.variant_id.clone());
            quantities.push(to_i64(obs.quantity));
            prices.push(to_i64(obs.price_cents));
            observed.push(obs.observed_at);
        }

        sqlx::query(
            "INSERT INTO stock_history \
             (store_id, sku, title, variant_id, quantity, price_cents, observed_at) \
             SELECT * FROM UNNEST($1::UUID[], $2::TEXT[], $3::TEXT[], $4::TEXT[], \
             $5::BIGINT[], $6::BIGINT[], $7::TIMESTAMPTZ[])",
        )
        .bind(store_ids)
        .bind(skus)
        .bind(titles)
        .bind(variant_ids)
        .bind(quantities)
        .bind(prices)
        .bind(observed)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn query(
        &self,
        store_id: StoreId,
        filter: &ObservationFilter,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<StockObservation>, PersistenceError> {
        let rows = sqlx::query_as::<_, StockHistoryTuple>(
            "SELECT store_id, sku, title, variant_id, quantity, price_cents, observed_at \
             FROM stock_history \
             WHERE store_id = $1 AND observed_at >= $2 \
             AND ($3::TEXT IS NULL OR sku = $3) \
             AND ($4::TEXT IS NULL OR variant_id = $4) \
             ORDER BY observed_at DESC, sku ASC LIMIT $5",
        )
        .bind(store_id.as_uuid())
        .bind(since)
        .bind(filter.sku.as_deref())
        .bind(filter.variant_id.as_deref())
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(observation_from_tuple).collect())
    }

    async fn changes_since(
        &self,
        store_id: StoreId,
        since: DateTime<Utc>,
    ) -> Result<Vec<StockChange>, PersistenceError> {
        let rows = sqlx::query_as::<_, StockChangeTuple>(
            "SELECT sku, \
             (ARRAY_AGG(title ORDER BY observed_at DESC))[1], \
             MIN(quantity), MAX(quantity), AVG(quantity)::FLOAT8 \
             FROM stock_history \
             WHERE store_id = $1 AND observed_at >= $2 \
             GROUP BY sku HAVING MAX(quantity) <> MIN(quantity)",
        )
        .bind(store_id.as_uuid())
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        let mut changes: Vec<StockChange> =
            rows.into_iter().map(stock_change_from_tuple).collect();
        sort_changes(&mut changes);
        Ok(changes)
    }

    async fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<u64, PersistenceError> {
        let result = sqlx::query("DELETE FROM stock_history WHERE observed_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
