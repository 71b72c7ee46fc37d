//! Persistence layer: current snapshots, scan history, stores, webhooks,
//! the alert log and per-SKU stock history.
//!
//! Each concern is a trait so the engine can run against the in-memory
//! implementations ([`memory`]) in tests and single-process deployments,
//! or against PostgreSQL ([`postgres`]) through `sqlx::PgPool`.

pub mod memory;
pub mod models;
pub mod postgres;

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    Alert, AlertFilter, AlertId, DeliveryOutcome, InventorySnapshot, LoggedAlert, MonitoredStore,
    ObservationFilter, ScanRecord, StockChange, StockObservation, StoreId, WebhookId,
    WebhookRegistration,
};
use crate::error::PersistenceError;

pub use memory::{
    MemoryAlertLog, MemoryScanHistory, MemorySnapshotStore, MemoryStockHistory,
    MemoryStoreRepository, MemoryWebhookRepository,
};
pub use postgres::PostgresPersistence;

/// Last-known inventory per store.
///
/// Exactly one snapshot is current per store. Replacement is atomic: a
/// concurrent reader sees either the old or the new snapshot in full.
#[async_trait]
pub trait SnapshotStore: Send + Sync + Debug {
    /// Returns the current snapshot, or `None` before the first scan.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] on storage failure.
    async fn get_current(
        &self,
        store_id: StoreId,
    ) -> Result<Option<Arc<InventorySnapshot>>, PersistenceError>;

    /// Makes `snapshot` the current one for `store_id`.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] on storage failure, in which case the
    /// previous snapshot stays current.
    async fn replace_current(
        &self,
        store_id: StoreId,
        snapshot: Arc<InventorySnapshot>,
    ) -> Result<(), PersistenceError>;

    /// Drops the current snapshot of `store_id`. Returns `false` if there
    /// was none.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] on storage failure.
    async fn discard(&self, store_id: StoreId) -> Result<bool, PersistenceError>;
}

/// Scan outcomes, queryable per store by time range.
#[async_trait]
pub trait ScanHistory: Send + Sync + Debug {
    /// Appends one record.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] on storage failure.
    async fn record(&self, record: &ScanRecord) -> Result<(), PersistenceError>;

    /// Records for `store_id` with `from <= started_at < to`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] on storage failure.
    async fn query(
        &self,
        store_id: StoreId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ScanRecord>, PersistenceError>;

    /// Deletes records that started before `cutoff`, returning the count.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] on storage failure.
    async fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<u64, PersistenceError>;
}

/// CRUD over monitored stores.
#[async_trait]
pub trait StoreRepository: Send + Sync + Debug {
    /// Inserts a new store.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] if the id or URL is already taken.
    async fn insert(&self, store: &MonitoredStore) -> Result<(), PersistenceError>;

    /// Fetches a store, including soft-deleted ones.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] on storage failure.
    async fn get(&self, store_id: StoreId) -> Result<Option<MonitoredStore>, PersistenceError>;

    /// Overwrites an existing store.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] on storage failure.
    async fn update(&self, store: &MonitoredStore) -> Result<(), PersistenceError>;

    /// Marks a store deleted. Returns `false` if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] on storage failure.
    async fn soft_delete(
        &self,
        store_id: StoreId,
        at: DateTime<Utc>,
    ) -> Result<bool, PersistenceError>;

    /// Records the start time of the store's latest successful scan.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] on storage failure.
    async fn mark_scanned(
        &self,
        store_id: StoreId,
        at: DateTime<Utc>,
    ) -> Result<(), PersistenceError>;

    /// All stores that are not deleted, ordered by creation time.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] on storage failure.
    async fn list_active(&self) -> Result<Vec<MonitoredStore>, PersistenceError>;
}

/// CRUD over webhook registrations plus delivery bookkeeping.
#[async_trait]
pub trait WebhookRepository: Send + Sync + Debug {
    /// Inserts a registration.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] on storage failure.
    async fn insert(&self, webhook: &WebhookRegistration) -> Result<(), PersistenceError>;

    /// Fetches a registration.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] on storage failure.
    async fn get(&self, id: WebhookId) -> Result<Option<WebhookRegistration>, PersistenceError>;

    /// Registrations scoped to `store_id` plus global ones. `None` lists all.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] on storage failure.
    async fn list_for_store(
        &self,
        store_id: Option<StoreId>,
    ) -> Result<Vec<WebhookRegistration>, PersistenceError>;

    /// Overwrites an existing registration.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] on storage failure.
    async fn update(&self, webhook: &WebhookRegistration) -> Result<(), PersistenceError>;

    /// Deletes a registration. Returns `false` if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] on storage failure.
    async fn delete(&self, id: WebhookId) -> Result<bool, PersistenceError>;

    /// Folds a delivery outcome into the registration's status and stats.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] on storage failure.
    async fn record_delivery(
        &self,
        id: WebhookId,
        outcome: &DeliveryOutcome,
    ) -> Result<(), PersistenceError>;
}

/// Every alert ever raised, with its resolution state.
#[async_trait]
pub trait AlertLog: Send + Sync + Debug {
    /// Appends freshly raised alerts, unresolved.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] on storage failure.
    async fn append(&self, alerts: &[Alert]) -> Result<(), PersistenceError>;

    /// Alerts passing `filter`, newest first, skipping `offset` and
    /// returning at most `limit`.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] on storage failure.
    async fn list(
        &self,
        filter: &AlertFilter,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<LoggedAlert>, PersistenceError>;

    /// Marks an alert resolved at `at`, returning it. `None` if unknown.
    /// An already resolved alert keeps its original timestamp.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] on storage failure.
    async fn resolve(
        &self,
        id: AlertId,
        at: DateTime<Utc>,
    ) -> Result<Option<LoggedAlert>, PersistenceError>;

    /// Deletes alerts resolved before `cutoff`, returning the count. Open
    /// alerts are never pruned.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] on storage failure.
    async fn prune_resolved_before(&self, cutoff: DateTime<Utc>) -> Result<u64, PersistenceError>;
}

/// Per-SKU stock observations over time.
#[async_trait]
pub trait StockHistory: Send + Sync + Debug {
    /// Appends the observations of one scan.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] on storage failure.
    async fn record(&self, observations: &[StockObservation]) -> Result<(), PersistenceError>;

    /// Observations of `store_id` passing `filter` with
    /// `observed_at >= since`, newest first, at most `limit`.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] on storage failure.
    async fn query(
        &self,
        store_id: StoreId,
        filter: &ObservationFilter,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<StockObservation>, PersistenceError>;

    /// Per-SKU movement of `store_id` since `since`, as computed by
    /// [`crate::domain::stock_history::summarize_changes`].
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] on storage failure.
    async fn changes_since(
        &self,
        store_id: StoreId,
        since: DateTime<Utc>,
    ) -> Result<Vec<StockChange>, PersistenceError>;

    /// Deletes observations older than `cutoff`, returning the count.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] on storage failure.
    async fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<u64, PersistenceError>;
}
