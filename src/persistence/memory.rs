//! In-memory implementations of the persistence traits.
//!
//! [`MemorySnapshotStore`] keeps one entry per store in a `HashMap` where
//! each entry is individually protected by a [`tokio::sync::RwLock`]. Reads
//! and replacements for different stores never contend; a replacement for
//! one store swaps an `Arc` under that store's lock, so readers observe the
//! old or the new snapshot in full.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{
    AlertLog, ScanHistory, SnapshotStore, StockHistory, StoreRepository, WebhookRepository,
};
use crate::domain::stock_history::summarize_changes;
use crate::domain::{
    Alert, AlertFilter, AlertId, DeliveryOutcome, InventorySnapshot, LoggedAlert, MonitoredStore,
    ObservationFilter, ScanRecord, StockChange, StockObservation, StoreId, WebhookId,
    WebhookRegistration,
};
use crate::error::PersistenceError;

type SnapshotSlot = Arc<RwLock<Option<Arc<InventorySnapshot>>>>;

/// Current snapshot per store, with per-store locking.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    slots: RwLock<HashMap<StoreId, SnapshotSlot>>,
}

impl MemorySnapshotStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the slot for `store_id`, creating it on first use.
    async fn slot(&self, store_id: StoreId) -> SnapshotSlot {
        if let Some(slot) = self.slots.read().await.get(&store_id) {
            return Arc::clone(slot);
        }
        let mut map = self.slots.write().await;
        Arc::clone(map.entry(store_id).or_default())
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn get_current(
        &self,
        store_id: StoreId,
    ) -> Result<Option<Arc<InventorySnapshot>>, PersistenceError> {
        let slot = self.slots.read().await.get(&store_id).map(Arc::clone);
        let Some(slot) = slot else {
            return Ok(None);
        };
        let current = slot.read().await;
        Ok(current.as_ref().map(Arc::clone))
    }

    async fn replace_current(
        &self,
        store_id: StoreId,
        snapshot: Arc<InventorySnapshot>,
    ) -> Result<(), PersistenceError> {
        let slot = self.slot(store_id).await;
        *slot.write().await = Some(snapshot);
        Ok(())
    }

    async fn discard(&self, store_id: StoreId) -> Result<bool, PersistenceError> {
        let Some(slot) = self.slots.write().await.remove(&store_id) else {
            return Ok(false);
        };
        let had_snapshot = slot.write().await.take().is_some();
        Ok(had_snapshot)
    }
}

/// Scan history grouped by store.
#[derive(Debug, Default)]
pub struct MemoryScanHistory {
    records: RwLock<HashMap<StoreId, Vec<ScanRecord>>>,
}

impl MemoryScanHistory {
    /// Creates an empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScanHistory for MemoryScanHistory {
    async fn record(&self, record: &ScanRecord) -> Result<(), PersistenceError> {
        self.records
            .write()
            .await
            .entry(record.store_id)
            .or_default()
            .push(record.clone());
        Ok(())
    }

    async fn query(
        &self,
        store_id: StoreId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ScanRecord>, PersistenceError> {
        let map = self.records.read().await;
        let mut rows: Vec<ScanRecord> = map
            .get(&store_id)
            .map(|rows| {
                rows.iter()
                    .filter(|r| r.started_at >= from && r.started_at < to)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        rows.sort_by_key(|r| r.started_at);
        Ok(rows)
    }

    async fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<u64, PersistenceError> {
        let mut map = self.records.write().await;
        let mut removed = 0u64;
        for rows in map.values_mut() {
            let before = rows.len();
            rows.retain(|r| r.started_at >= cutoff);
            removed = removed.saturating_add((before - rows.len()) as u64);
        }
        Ok(removed)
    }
}

/// Monitored stores keyed by id.
#[derive(Debug, Default)]
pub struct MemoryStoreRepository {
    stores: RwLock<HashMap<StoreId, MonitoredStore>>,
}

impl MemoryStoreRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StoreRepository for MemoryStoreRepository {
    async fn insert(&self, store: &MonitoredStore) -> Result<(), PersistenceError> {
        let mut map = self.stores.write().await;
        if map.contains_key(&store.id) {
            return Err(PersistenceError(format!("store {} already exists", store.id)));
        }
        if map
            .values()
            .any(|existing| !existing.is_deleted() && existing.url == store.url)
        {
            return Err(PersistenceError(format!(
                "store url {} already monitored",
                store.url
            )));
        }
        map.insert(store.id, store.clone());
        Ok(())
    }

    async fn get(&self, store_id: StoreId) -> Result<Option<MonitoredStore>, PersistenceError> {
        Ok(self.stores.read().await.get(&store_id).cloned())
    }

    async fn update(&self, store: &MonitoredStore) -> Result<(), PersistenceError> {
        let mut map = self.stores.write().await;
        let Some(existing) = map.get_mut(&store.id) else {
            return Err(PersistenceError(format!("store {} does not exist", store.id)));
        };
        // A concurrent scan may have advanced `last_scan_at` since `store`
        // was read.
        let last_scan_at = existing.last_scan_at.max(store.last_scan_at);
        *existing = store.clone();
        existing.last_scan_at = last_scan_at;
        Ok(())
    }

    async fn mark_scanned(
        &self,
        store_id: StoreId,
        at: DateTime<Utc>,
    ) -> Result<(), PersistenceError> {
        if let Some(store) = self.stores.write().await.get_mut(&store_id) {
            store.last_scan_at = Some(at);
        }
        Ok(())
    }

    async fn soft_delete(
        &self,
        store_id: StoreId,
        at: DateTime<Utc>,
    ) -> Result<bool, PersistenceError> {
        let mut map = self.stores.write().await;
        match map.get_mut(&store_id) {
            Some(store) if !store.is_deleted() => {
                store.deleted_at = Some(at);
                store.updated_at = at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_active(&self) -> Result<Vec<MonitoredStore>, PersistenceError> {
        let map = self.stores.read().await;
        let mut stores: Vec<MonitoredStore> =
            map.values().filter(|s| !s.is_deleted()).cloned().collect();
        stores.sort_by_key(|s| s.created_at);
        Ok(stores)
    }
}

/// Webhook registrations keyed by id.
#[derive(Debug, Default)]
pub struct MemoryWebhookRepository {
    webhooks: RwLock<HashMap<WebhookId, WebhookRegistration>>,
}

impl MemoryWebhookRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WebhookRepository for MemoryWebhookRepository {
    async fn insert(&self, webhook: &WebhookRegistration) -> Result<(), PersistenceError> {
        let mut map = self.webhooks.write().await;
        if map.contains_key(&webhook.id) {
            return Err(PersistenceError(format!(
                "webhook {} already exists",
                webhook.id
            )));
        }
        map.insert(webhook.id, webhook.clone());
        Ok(())
    }

    async fn get(&self, id: WebhookId) -> Result<Option<WebhookRegistration>, PersistenceError> {
        Ok(self.webhooks.read().await.get(&id).cloned())
    }

    async fn list_for_store(
        &self,
        store_id: Option<StoreId>,
    ) -> Result<Vec<WebhookRegistration>, PersistenceError> {
        let map = self.webhooks.read().await;
        let mut hooks: Vec<WebhookRegistration> = map
            .values()
            .filter(|w| match store_id {
                None => true,
                Some(id) => w.store_id.is_none_or(|scope| scope == id),
            })
            .cloned()
            .collect();
        hooks.sort_by_key(|w| w.created_at);
        Ok(hooks)
    }

    async fn update(&self, webhook: &WebhookRegistration) -> Result<(), PersistenceError> {
        let mut map = self.webhooks.write().await;
        let Some(existing) = map.get_mut(&webhook.id) else {
            return Err(PersistenceError(format!(
                "webhook {} does not exist",
                webhook.id
            )));
        };
        *existing = webhook.clone();
        Ok(())
    }

    async fn delete(&self, id: WebhookId) -> Result<bool, PersistenceError> {
        Ok(self.webhooks.write().await.remove(&id).is_some())
    }

    async fn record_delivery(
        &self,
        id: WebhookId,
        outcome: &DeliveryOutcome,
    ) -> Result<(), PersistenceError> {
        let mut map = self.webhooks.write().await;
        if let Some(hook) = map.get_mut(&id) {
            hook.record_outcome(outcome);
        }
        Ok(())
    }
}

/// Alert log in raise order.
#[derive(Debug, Default)]
pub struct MemoryAlertLog {
    entries: RwLock<Vec<LoggedAlert>>,
}

impl MemoryAlertLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AlertLog for MemoryAlertLog {
    async fn append(&self, alerts: &[Alert]) -> Result<(), PersistenceError> {
        self.entries
            .write()
            .await
            .extend(alerts.iter().cloned().map(LoggedAlert::open));
        Ok(())
    }

    async fn list(
        &self,
        filter: &AlertFilter,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<LoggedAlert>, PersistenceError> {
        let entries = self.entries.read().await;
        let mut matching: Vec<&LoggedAlert> =
            entries.iter().filter(|e| filter.matches(e)).collect();
        // Stable sort keeps raise order among alerts of one scan.
        matching.reverse();
        matching.sort_by(|a, b| b.alert.raised_at.cmp(&a.alert.raised_at));
        Ok(matching
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn resolve(
        &self,
        id: AlertId,
        at: DateTime<Utc>,
    ) -> Result<Option<LoggedAlert>, PersistenceError> {
        let mut entries = self.entries.write().await;
        Ok(entries.iter_mut().find(|e| e.alert.id == id).map(|entry| {
            entry.resolve(at);
            entry.clone()
        }))
    }

    async fn prune_resolved_before(&self, cutoff: DateTime<Utc>) -> Result<u64, PersistenceError> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|e| e.resolved_at.is_none_or(|at| at >= cutoff));
        Ok((before - entries.len()) as u64)
    }
}

/// Stock observations grouped by store, in recording order.
#[derive(Debug, Default)]
pub struct MemoryStockHistory {
    observations: RwLock<HashMap<StoreId, Vec<StockObservation>>>,
}

impl MemoryStockHistory {
    /// Creates an empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StockHistory for MemoryStockHistory {
    async fn record(&self, observations: &[StockObservation]) -> Result<(), PersistenceError> {
        let mut map = self.observations.write().await;
        for obs in observations {
            map.entry(obs.store_id).or_default().push(obs.clone());
        }
        Ok(())
    }

    async fn query(
        &self,
        store_id: StoreId,
        filter: &ObservationFilter,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<StockObservation>, PersistenceError> {
        let map = self.observations.read().await;
        let Some(rows) = map.get(&store_id) else {
            return Ok(Vec::new());
        };
        let mut rows: Vec<StockObservation> = rows
            .iter()
            .filter(|o| o.observed_at >= since && filter.matches(o))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.observed_at
                .cmp(&a.observed_at)
                .then_with(|| a.sku.cmp(&b.sku))
        });
        rows.truncate(limit);
        Ok(rows)
    }

    async fn changes_since(
        &self,
        store_id: StoreId,
        since: DateTime<Utc>,
    ) -> Result<Vec<StockChange>, PersistenceError> {
        let map = self.observations.read().await;
        let window: Vec<StockObservation> = map
            .get(&store_id)
            .map(|rows| {
                rows.iter()
                    .filter(|o| o.observed_at >= since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(summarize_changes(&window))
    }

    async fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<u64, PersistenceError> {
        let mut map = self.observations.write().await;
        let mut removed = 0u64;
        for rows in map.values_mut() {
            let before = rows.len();
            rows.retain(|o| o.observed_at >= cutoff);
            removed = removed.saturating_add((before - rows.len()) as u64);
        }
        map.retain(|_, rows| !rows.is_empty());
        Ok(removed)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::snapshot::record;
    use crate::domain::{AlertKind, DeliveryStatus, ScanId, ScanTrigger};
    use chrono::Duration;

    fn snapshot(store_id: StoreId, qty: u64) -> Arc<InventorySnapshot> {
        Arc::new(InventorySnapshot::new(
            store_id,
            Utc::now(),
            vec![record("A", qty, 100)],
        ))
    }

    fn scan_record(store_id: StoreId, started_at: DateTime<Utc>) -> ScanRecord {
        ScanRecord {
            scan_id: ScanId::new(),
            store_id,
            trigger: ScanTrigger::Scheduled,
            started_at,
            duration_ms: 10,
            success: true,
            attempts: 1,
            product_count: 1,
            total_stock: 1,
            event_count: 0,
            alert_count: 0,
            error: None,
        }
    }

    #[tokio::test]
    async fn snapshot_absent_before_first_scan() {
        let store = MemorySnapshotStore::new();
        let Ok(current) = store.get_current(StoreId::new()).await else {
            panic!("get_current failed");
        };
        assert!(current.is_none());
    }

    #[tokio::test]
    async fn replace_supersedes_previous() {
        let store = MemorySnapshotStore::new();
        let id = StoreId::new();

        let first = snapshot(id, 5);
        let second = snapshot(id, 2);
        assert!(store.replace_current(id, Arc::clone(&first)).await.is_ok());
        assert!(store.replace_current(id, Arc::clone(&second)).await.is_ok());

        let Ok(Some(current)) = store.get_current(id).await else {
            panic!("expected a current snapshot");
        };
        assert!(Arc::ptr_eq(&current, &second));
        // The superseded snapshot is untouched.
        assert_eq!(first.get("A").map(|p| p.quantity), Some(5));
    }

    #[tokio::test]
    async fn snapshots_are_isolated_per_store() {
        let store = MemorySnapshotStore::new();
        let a = StoreId::new();
        let b = StoreId::new();
        assert!(store.replace_current(a, snapshot(a, 1)).await.is_ok());

        let Ok(current_b) = store.get_current(b).await else {
            panic!("get_current failed");
        };
        assert!(current_b.is_none());
    }

    #[tokio::test]
    async fn discard_drops_the_store_slot() {
        let store = MemorySnapshotStore::new();
        let id = StoreId::new();
        assert!(store.replace_current(id, snapshot(id, 1)).await.is_ok());

        let Ok(true) = store.discard(id).await else {
            panic!("discard should report a snapshot");
        };
        let Ok(false) = store.discard(id).await else {
            panic!("second discard should find nothing");
        };
        assert!(store.slots.read().await.is_empty());
        let Ok(current) = store.get_current(id).await else {
            panic!("get_current failed");
        };
        assert!(current.is_none());
    }

    fn raised(store_id: StoreId, kind: AlertKind, minutes_ago: i64) -> Alert {
        Alert {
            id: AlertId::new(),
            store_id,
            sku: "A".to_string(),
            title: "Product A".to_string(),
            kind,
            before: 5,
            after: 0,
            threshold: 0,
            raised_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    #[tokio::test]
    async fn alert_log_filters_pages_and_resolves() {
        let log = MemoryAlertLog::new();
        let store = StoreId::new();
        let oldest = raised(store, AlertKind::OutOfStock, 30);
        let middle = raised(store, AlertKind::LowStock, 20);
        let newest = raised(StoreId::new(), AlertKind::OutOfStock, 10);
        assert!(log.append(&[oldest.clone(), middle.clone()]).await.is_ok());
        assert!(log.append(std::slice::from_ref(&newest)).await.is_ok());

        let Ok(all) = log.list(&AlertFilter::default(), 0, 10).await else {
            panic!("list failed");
        };
        let ids: Vec<AlertId> = all.iter().map(|e| e.alert.id).collect();
        assert_eq!(ids, [newest.id, middle.id, oldest.id]);

        let Ok(page) = log.list(&AlertFilter::default(), 1, 1).await else {
            panic!("list failed");
        };
        assert_eq!(page.first().map(|e| e.alert.id), Some(middle.id));

        let Ok(Some(resolved)) = log.resolve(oldest.id, Utc::now()).await else {
            panic!("resolve should find the alert");
        };
        assert!(resolved.is_resolved());
        let Ok(None) = log.resolve(AlertId::new(), Utc::now()).await else {
            panic!("unknown alert should not resolve");
        };

        let open_for_store = AlertFilter {
            store_id: Some(store),
            resolved: Some(false),
            ..AlertFilter::default()
        };
        let Ok(open) = log.list(&open_for_store, 0, 10).await else {
            panic!("list failed");
        };
        assert_eq!(open.len(), 1);
        assert_eq!(open.first().map(|e| e.alert.id), Some(middle.id));
    }

    #[tokio::test]
    async fn only_resolved_alerts_are_pruned() {
        let log = MemoryAlertLog::new();
        let store = StoreId::new();
        let old = raised(store, AlertKind::OutOfStock, 60);
        let open = raised(store, AlertKind::LowStock, 60);
        assert!(log.append(&[old.clone(), open.clone()]).await.is_ok());
        assert!(log.resolve(old.id, Utc::now() - Duration::days(10)).await.is_ok());

        let Ok(pruned) = log.prune_resolved_before(Utc::now() - Duration::days(7)).await else {
            panic!("prune failed");
        };
        assert_eq!(pruned, 1);
        let Ok(left) = log.list(&AlertFilter::default(), 0, 10).await else {
            panic!("list failed");
        };
        assert_eq!(left.first().map(|e| e.alert.id), Some(open.id));
    }

    #[tokio::test]
    async fn stock_history_window_and_changes() {
        let history = MemoryStockHistory::new();
        let store = StoreId::new();
        let now = Utc::now();
        for (hours_ago, qty) in [(48, 1), (5, 9), (1, 4)] {
            let taken = InventorySnapshot::new(
                store,
                now - Duration::hours(hours_ago),
                vec![record("A", qty, 100), record("B", 2, 100)],
            );
            assert!(
                history
                    .record(&StockObservation::from_snapshot(&taken))
                    .await
                    .is_ok()
            );
        }

        let since = now - Duration::hours(24);
        let only_a = ObservationFilter {
            sku: Some("A".to_string()),
            ..ObservationFilter::default()
        };
        let Ok(rows) = history.query(store, &only_a, since, 100).await else {
            panic!("query failed");
        };
        let quantities: Vec<u64> = rows.iter().map(|o| o.quantity).collect();
        assert_eq!(quantities, [4, 9]);

        let Ok(limited) = history
            .query(store, &ObservationFilter::default(), since, 1)
            .await
        else {
            panic!("query failed");
        };
        assert_eq!(limited.len(), 1);

        let Ok(changes) = history.changes_since(store, since).await else {
            panic!("changes failed");
        };
        let [change] = changes.as_slice() else {
            panic!("only A moved, got {changes:?}");
        };
        assert_eq!((change.min_stock, change.max_stock), (4, 9));

        let Ok(pruned) = history.prune_before(since).await else {
            panic!("prune failed");
        };
        assert_eq!(pruned, 2);
    }

    #[tokio::test]
    async fn history_range_query_and_prune() {
        let history = MemoryScanHistory::new();
        let id = StoreId::new();
        let now = Utc::now();
        for days_ago in [40, 10, 1] {
            let row = scan_record(id, now - Duration::days(days_ago));
            assert!(history.record(&row).await.is_ok());
        }
        assert!(
            history
                .record(&scan_record(StoreId::new(), now))
                .await
                .is_ok()
        );

        let Ok(recent) = history.query(id, now - Duration::days(15), now).await else {
            panic!("query failed");
        };
        assert_eq!(recent.len(), 2);
        assert!(recent.windows(2).all(|w| match w {
            [a, b] => a.started_at <= b.started_at,
            _ => true,
        }));

        let Ok(pruned) = history.prune_before(now - Duration::days(30)).await else {
            panic!("prune failed");
        };
        assert_eq!(pruned, 1);
    }

    #[tokio::test]
    async fn store_repository_lifecycle() {
        let repo = MemoryStoreRepository::new();
        let store = MonitoredStore::new("Shop", "https://shop.example.com", 600, 3);
        assert!(repo.insert(&store).await.is_ok());

        let duplicate_url = MonitoredStore::new("Again", "https://shop.example.com", 600, 3);
        assert!(repo.insert(&duplicate_url).await.is_err());

        let Ok(true) = repo.soft_delete(store.id, Utc::now()).await else {
            panic!("soft delete should succeed");
        };
        let Ok(false) = repo.soft_delete(store.id, Utc::now()).await else {
            panic!("second delete should report missing");
        };

        let Ok(active) = repo.list_active().await else {
            panic!("list failed");
        };
        assert!(active.is_empty());

        let Ok(Some(deleted)) = repo.get(store.id).await else {
            panic!("soft-deleted store remains readable");
        };
        assert!(deleted.is_deleted());
    }

    #[tokio::test]
    async fn webhook_scoping_and_delivery_stats() {
        let repo = MemoryWebhookRepository::new();
        let store = StoreId::new();
        let scoped = WebhookRegistration::new(Some(store), "https://a.example.com");
        let global = WebhookRegistration::new(None, "https://b.example.com");
        let other = WebhookRegistration::new(Some(StoreId::new()), "https://c.example.com");
        for hook in [&scoped, &global, &other] {
            assert!(repo.insert(hook).await.is_ok());
        }

        let Ok(for_store) = repo.list_for_store(Some(store)).await else {
            panic!("list failed");
        };
        assert_eq!(for_store.len(), 2);

        let Ok(all) = repo.list_for_store(None).await else {
            panic!("list failed");
        };
        assert_eq!(all.len(), 3);

        let outcome = DeliveryOutcome {
            at: Utc::now(),
            attempts: 3,
            error: Some("HTTP 500".to_string()),
        };
        assert!(repo.record_delivery(scoped.id, &outcome).await.is_ok());
        let Ok(Some(updated)) = repo.get(scoped.id).await else {
            panic!("webhook missing");
        };
        assert_eq!(updated.status, DeliveryStatus::Failing);

        let Ok(true) = repo.delete(other.id).await else {
            panic!("delete should succeed");
        };
    }
}
