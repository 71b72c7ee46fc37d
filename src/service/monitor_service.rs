//! Monitor service: store and webhook management on top of the engine.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::config::MonitorConfig;
use crate::domain::{
    AlertFilter, AlertId, AlertKind, EventBus, InventorySnapshot, LoggedAlert, MonitoredStore,
    ObservationFilter, ScanRecord, ScanResult, StockChange, StockObservation, StoreEvents,
    StoreId, StoreUpdate, WebhookId, WebhookRegistration,
};
use crate::engine::{
    DeliveryReport, ScanDiagnostics, ScanOrchestrator, ScanScheduler, ScanStorage, TriggerOutcome,
};
use crate::error::MonitorError;
use crate::persistence::{
    AlertLog, ScanHistory, SnapshotStore, StockHistory, StoreRepository, WebhookRepository,
};

/// History window used when a query gives no lower bound.
const DEFAULT_HISTORY_WINDOW_DAYS: i64 = 30;

/// Alerts per page when the caller gives no limit.
pub const DEFAULT_ALERT_PAGE: usize = 100;
/// Largest alert page.
pub const MAX_ALERT_PAGE: usize = 1_000;
/// Stock history window in days: default and accepted range.
pub const DEFAULT_STOCK_HISTORY_DAYS: u32 = 7;
const STOCK_HISTORY_DAYS: std::ops::RangeInclusive<u32> = 1..=90;
/// Most observations returned by one stock history query.
pub const STOCK_HISTORY_LIMIT: usize = 1_000;
/// Stock change window in hours: default and accepted range.
pub const DEFAULT_STOCK_CHANGE_HOURS: u32 = 24;
const STOCK_CHANGE_HOURS: std::ops::RangeInclusive<u32> = 1..=168;

/// Store defaults and limits applied by [`MonitorService`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonitorSettings {
    /// Whether stores get recurring timers.
    pub scheduler_enabled: bool,
    /// Interval for stores created without one.
    pub default_scan_interval_secs: u64,
    /// Smallest accepted interval.
    pub min_scan_interval_secs: u64,
    /// Threshold for stores created without one.
    pub default_low_stock_threshold: u64,
    /// Scan and stock history older than this is pruned. `0` keeps
    /// everything.
    pub history_retention_days: u64,
    /// Alerts resolved longer ago than this are pruned. `0` keeps them.
    pub resolved_alert_retention_days: u64,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            scheduler_enabled: true,
            default_scan_interval_secs: 3_600,
            min_scan_interval_secs: 300,
            default_low_stock_threshold: 10,
            history_retention_days: 30,
            resolved_alert_retention_days: 7,
        }
    }
}

impl From<&MonitorConfig> for MonitorSettings {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            scheduler_enabled: config.scheduler_enabled,
            default_scan_interval_secs: config.default_scan_interval_secs,
            min_scan_interval_secs: config.min_scan_interval_secs,
            default_low_stock_threshold: config.default_low_stock_threshold,
            history_retention_days: config.history_retention_days,
            resolved_alert_retention_days: config.resolved_alert_retention_days,
        }
    }
}

/// Input for [`MonitorService::create_store`].
#[derive(Debug, Clone, Default)]
pub struct NewStore {
    /// Display name.
    pub name: String,
    /// Storefront base URL.
    pub url: String,
    /// Scan interval; the configured default when `None`.
    pub scan_interval_secs: Option<u64>,
    /// Low-stock threshold; the configured default when `None`.
    pub low_stock_threshold: Option<u64>,
    /// Low-stock alerts on or off. Defaults to on.
    pub notify_low_stock: Option<bool>,
    /// Scheduled scans on or off. Defaults to on.
    pub enabled: Option<bool>,
}

/// Input for [`MonitorService::create_webhook`].
#[derive(Debug, Clone, Default)]
pub struct NewWebhook {
    /// Store scope; `None` subscribes to every store.
    pub store_id: Option<StoreId>,
    /// Target URL.
    pub url: String,
    /// Alert kinds to receive; low-stock and out-of-stock when `None`.
    pub events: Option<Vec<AlertKind>>,
    /// HMAC secret for payload signatures.
    pub secret: Option<String>,
}

/// Partial update of a webhook registration.
#[derive(Debug, Clone, Default)]
pub struct WebhookUpdate {
    /// New target URL.
    pub url: Option<String>,
    /// New alert kind filter.
    pub events: Option<Vec<AlertKind>>,
    /// Activate or deactivate.
    pub active: Option<bool>,
    /// Replace the secret. `Some(None)` removes it.
    pub secret: Option<Option<String>>,
}

/// Scheduling state of one store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanStatus {
    /// Store the status belongs to.
    pub store_id: StoreId,
    /// Whether a recurring timer is active.
    pub registered: bool,
    /// Whether a scan is in flight right now.
    pub scanning: bool,
    /// Scheduling counters.
    pub diagnostics: ScanDiagnostics,
}

/// One item at or below its low-stock threshold, still in stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LowStockItem {
    /// Store the item belongs to.
    pub store_id: StoreId,
    /// Store display name.
    pub store_name: String,
    /// SKU.
    pub sku: String,
    /// Product title.
    pub title: String,
    /// Storefront variant id.
    pub variant_id: String,
    /// Units in stock.
    pub quantity: u64,
    /// Threshold the item was compared against.
    pub threshold: u64,
}

/// Orchestration layer for store and webhook management.
///
/// Every mutation follows the same pattern: validate → persist → sync the
/// scheduler → log. Scans themselves are run by the [`ScanScheduler`],
/// which publishes their outcomes on the [`EventBus`].
#[derive(Debug)]
pub struct MonitorService {
    stores: Arc<dyn StoreRepository>,
    webhooks: Arc<dyn WebhookRepository>,
    history: Arc<dyn ScanHistory>,
    snapshots: Arc<dyn SnapshotStore>,
    alerts: Arc<dyn AlertLog>,
    stock: Arc<dyn StockHistory>,
    orchestrator: Arc<ScanOrchestrator>,
    scheduler: ScanScheduler,
    settings: MonitorSettings,
}

impl MonitorService {
    /// Creates a new `MonitorService`.
    #[must_use]
    pub fn new(
        storage: ScanStorage,
        orchestrator: Arc<ScanOrchestrator>,
        scheduler: ScanScheduler,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            stores: storage.stores,
            webhooks: storage.webhooks,
            history: storage.history,
            snapshots: storage.snapshots,
            alerts: storage.alerts,
            stock: storage.stock,
            orchestrator,
            scheduler,
            settings,
        }
    }

    /// Returns a reference to the [`EventBus`] scans publish to.
    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        self.orchestrator.events()
    }

    /// Follows the events of one store.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::StoreNotFound`].
    pub async fn store_events(&self, store_id: StoreId) -> Result<StoreEvents, MonitorError> {
        self.get_store(store_id).await?;
        Ok(self.event_bus().subscribe_store(store_id))
    }

    /// Returns the scheduler.
    #[must_use]
    pub fn scheduler(&self) -> &ScanScheduler {
        &self.scheduler
    }

    /// Returns the active settings.
    #[must_use]
    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    /// Registers every active store with the scheduler.
    ///
    /// Returns the number of stores that got a timer.
    ///
    /// # Errors
    ///
    /// Returns a [`MonitorError`] if the stores cannot be loaded.
    pub async fn start(&self) -> Result<usize, MonitorError> {
        if !self.settings.scheduler_enabled {
            tracing::info!("scheduler disabled; only manual scans will run");
            return Ok(0);
        }
        let stores = self.stores.list_active().await?;
        self.scheduler.reconcile(&stores).await;
        let registered = self.scheduler.registered().await.len();
        tracing::info!(stores = stores.len(), registered, "scheduler started");
        Ok(registered)
    }

    /// Stops every timer. In-flight scans finish on their own.
    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
    }

    // -- stores --------------------------------------------------------

    /// Adds a store to monitoring and schedules it.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::InvalidRequest`] for an empty name, a
    /// non-HTTP URL, an interval below the minimum, or a URL that is
    /// already monitored.
    pub async fn create_store(&self, request: NewStore) -> Result<MonitoredStore, MonitorError> {
        let name = validate_name(&request.name)?;
        validate_url(&request.url)?;
        let interval = request
            .scan_interval_secs
            .unwrap_or(self.settings.default_scan_interval_secs);
        self.validate_interval(interval)?;

        let threshold = request
            .low_stock_threshold
            .unwrap_or(self.settings.default_low_stock_threshold);
        let mut store = MonitoredStore::new(name, &request.url, interval, threshold);
        if let Some(notify) = request.notify_low_stock {
            store.notify_low_stock = notify;
        }
        if let Some(enabled) = request.enabled {
            store.enabled = enabled;
        }

        let existing = self.stores.list_active().await?;
        if existing.iter().any(|s| s.url == store.url) {
            return Err(MonitorError::InvalidRequest(format!(
                "store already monitored: {}",
                store.url
            )));
        }

        self.stores.insert(&store).await?;
        self.sync_schedule(&store).await;

        tracing::info!(store_id = %store.id, url = %store.url, "store created");
        Ok(store)
    }

    /// Returns a store that has not been deleted.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::StoreNotFound`] if the store does not exist
    /// or was deleted.
    pub async fn get_store(&self, store_id: StoreId) -> Result<MonitoredStore, MonitorError> {
        match self.stores.get(store_id).await? {
            Some(store) if !store.is_deleted() => Ok(store),
            _ => Err(MonitorError::StoreNotFound(store_id)),
        }
    }

    /// Lists every store that has not been deleted, oldest first.
    ///
    /// # Errors
    ///
    /// Returns a [`MonitorError`] on storage failure.
    pub async fn list_stores(&self) -> Result<Vec<MonitoredStore>, MonitorError> {
        Ok(self.stores.list_active().await?)
    }

    /// Applies `update` and re-syncs the store's timer.
    ///
    /// A changed interval restarts the timer; disabling the store removes
    /// it.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::StoreNotFound`] or
    /// [`MonitorError::InvalidRequest`].
    pub async fn update_store(
        &self,
        store_id: StoreId,
        update: StoreUpdate,
    ) -> Result<MonitoredStore, MonitorError> {
        if let Some(name) = &update.name {
            validate_name(name)?;
        }
        if let Some(interval) = update.scan_interval_secs {
            self.validate_interval(interval)?;
        }

        let mut store = self.get_store(store_id).await?;
        let update = StoreUpdate {
            name: update.name.map(|n| n.trim().to_string()),
            ..update
        };
        store.apply(&update);
        self.stores.update(&store).await?;
        self.sync_schedule(&store).await;

        tracing::info!(store_id = %store_id, "store updated");
        Ok(store)
    }

    /// Soft-deletes a store, cancels its scans and drops its snapshot.
    ///
    /// A scan in flight finishes but its snapshot is discarded. Scan and
    /// stock history age out through retention.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::StoreNotFound`] if the store does not exist
    /// or was already deleted.
    pub async fn delete_store(&self, store_id: StoreId) -> Result<(), MonitorError> {
        self.get_store(store_id).await?;
        if !self.stores.soft_delete(store_id, Utc::now()).await? {
            return Err(MonitorError::StoreNotFound(store_id));
        }
        self.scheduler.retire(store_id).await;
        if let Err(err) = self.snapshots.discard(store_id).await {
            tracing::warn!(store_id = %store_id, error = %err, "failed to discard snapshot");
        }

        tracing::info!(store_id = %store_id, "store deleted");
        Ok(())
    }

    // -- scans ---------------------------------------------------------

    /// Scans a store now and waits for the result.
    ///
    /// The returned result may itself be a failed scan.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::ScanBusy`] if a scan of the store is already
    /// running, or [`MonitorError::StoreNotFound`].
    pub async fn trigger_scan(&self, store_id: StoreId) -> Result<ScanResult, MonitorError> {
        let store = self.get_store(store_id).await?;
        match self.scheduler.trigger(&store).await {
            TriggerOutcome::Completed(result) => Ok(*result),
            TriggerOutcome::Busy => Err(MonitorError::ScanBusy(store_id)),
        }
    }

    /// Scan history of a store with `from <= started_at < to`.
    ///
    /// `to` defaults to now and `from` to thirty days before `to`.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::InvalidRequest`] if `from` is not before
    /// `to`, or [`MonitorError::StoreNotFound`].
    pub async fn scan_history(
        &self,
        store_id: StoreId,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<ScanRecord>, MonitorError> {
        let to = to.unwrap_or_else(Utc::now);
        let from = from.unwrap_or_else(|| {
            to.checked_sub_signed(chrono::Duration::days(DEFAULT_HISTORY_WINDOW_DAYS))
                .unwrap_or(DateTime::<Utc>::MIN_UTC)
        });
        if from >= to {
            return Err(MonitorError::InvalidRequest(
                "`from` must be earlier than `to`".to_string(),
            ));
        }
        self.get_store(store_id).await?;
        Ok(self.history.query(store_id, from, to).await?)
    }

    /// The store's current snapshot, or `None` before its first
    /// successful scan.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::StoreNotFound`] or a storage failure.
    pub async fn current_inventory(
        &self,
        store_id: StoreId,
    ) -> Result<Option<Arc<InventorySnapshot>>, MonitorError> {
        self.get_store(store_id).await?;
        Ok(self.snapshots.get_current(store_id).await?)
    }

    /// Scheduling state and counters of a store.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::StoreNotFound`].
    pub async fn scan_status(&self, store_id: StoreId) -> Result<ScanStatus, MonitorError> {
        self.get_store(store_id).await?;
        Ok(ScanStatus {
            store_id,
            registered: self.scheduler.registered().await.contains(&store_id),
            scanning: self.scheduler.is_scanning(store_id).await,
            diagnostics: self
                .scheduler
                .diagnostics(store_id)
                .await
                .unwrap_or_default(),
        })
    }

    /// Deletes scan and stock history older than the history retention
    /// window, and alerts resolved before the alert retention window.
    ///
    /// Returns the number of rows removed.
    ///
    /// # Errors
    ///
    /// Returns a [`MonitorError`] on storage failure.
    pub async fn prune_history(&self) -> Result<u64, MonitorError> {
        let mut removed = 0u64;
        if let Some(cutoff) = retention_cutoff(self.settings.history_retention_days) {
            let scans = self.history.prune_before(cutoff).await?;
            let observations = self.stock.prune_before(cutoff).await?;
            if scans > 0 || observations > 0 {
                tracing::info!(scans, observations, %cutoff, "pruned history");
            }
            removed = removed.saturating_add(scans).saturating_add(observations);
        }
        if let Some(cutoff) = retention_cutoff(self.settings.resolved_alert_retention_days) {
            let alerts = self.alerts.prune_resolved_before(cutoff).await?;
            if alerts > 0 {
                tracing::info!(alerts, %cutoff, "pruned resolved alerts");
            }
            removed = removed.saturating_add(alerts);
        }
        Ok(removed)
    }

    /// Spawns the retention sweep, running every `every`.
    ///
    /// The first sweep runs immediately. Abort the handle to stop it.
    pub fn spawn_retention(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every.max(Duration::from_secs(1)));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(err) = service.prune_history().await {
                    tracing::error!(error = %err, "history retention sweep failed");
                }
            }
        })
    }

    // -- alerts and stock ----------------------------------------------

    /// Logged alerts passing `filter`, newest first.
    ///
    /// `limit` defaults to [`DEFAULT_ALERT_PAGE`].
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::InvalidRequest`] for a limit outside
    /// `1..=MAX_ALERT_PAGE`, or a storage failure.
    pub async fn list_alerts(
        &self,
        filter: AlertFilter,
        offset: usize,
        limit: Option<usize>,
    ) -> Result<Vec<LoggedAlert>, MonitorError> {
        let limit = limit.unwrap_or(DEFAULT_ALERT_PAGE);
        if !(1..=MAX_ALERT_PAGE).contains(&limit) {
            return Err(MonitorError::InvalidRequest(format!(
                "limit must be between 1 and {MAX_ALERT_PAGE}"
            )));
        }
        Ok(self.alerts.list(&filter, offset, limit).await?)
    }

    /// Marks a logged alert resolved. Resolving twice keeps the first
    /// resolution time.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::AlertNotFound`].
    pub async fn resolve_alert(&self, id: AlertId) -> Result<LoggedAlert, MonitorError> {
        let resolved = self
            .alerts
            .resolve(id, Utc::now())
            .await?
            .ok_or(MonitorError::AlertNotFound(id))?;
        tracing::info!(alert_id = %id, "alert resolved");
        Ok(resolved)
    }

    /// In-stock items at or below a threshold across every active store's
    /// current snapshot, lowest quantity first.
    ///
    /// Each store is compared against `threshold` when given, otherwise
    /// against its own low-stock threshold.
    ///
    /// # Errors
    ///
    /// Returns a [`MonitorError`] on storage failure.
    pub async fn low_stock_items(
        &self,
        threshold: Option<u64>,
    ) -> Result<Vec<LowStockItem>, MonitorError> {
        let mut items = Vec::new();
        for store in self.stores.list_active().await? {
            let Some(snapshot) = self.snapshots.get_current(store.id).await? else {
                continue;
            };
            let limit = threshold.unwrap_or(store.low_stock_threshold);
            items.extend(
                snapshot
                    .products()
                    .iter()
                    .filter(|p| p.quantity > 0 && p.quantity <= limit)
                    .map(|p| LowStockItem {
                        store_id: store.id,
                        store_name: store.name.clone(),
                        sku: p.sku.clone(),
                        title: p.title.clone(),
                        variant_id: p.variant_id.clone(),
                        quantity: p.quantity,
                        threshold: limit,
                    }),
            );
        }
        items.sort_by(|a, b| {
            a.quantity
                .cmp(&b.quantity)
                .then_with(|| a.store_name.cmp(&b.store_name))
                .then_with(|| a.sku.cmp(&b.sku))
        });
        Ok(items)
    }

    /// Stock observations of a store over the last `days` days, newest
    /// first, at most [`STOCK_HISTORY_LIMIT`].
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::InvalidRequest`] for `days` outside `1..=90`,
    /// or [`MonitorError::StoreNotFound`].
    pub async fn inventory_history(
        &self,
        store_id: StoreId,
        filter: ObservationFilter,
        days: Option<u32>,
    ) -> Result<Vec<StockObservation>, MonitorError> {
        let days = days.unwrap_or(DEFAULT_STOCK_HISTORY_DAYS);
        if !STOCK_HISTORY_DAYS.contains(&days) {
            return Err(MonitorError::InvalidRequest(
                "days must be between 1 and 90".to_string(),
            ));
        }
        self.get_store(store_id).await?;
        let since = Utc::now() - chrono::Duration::days(i64::from(days));
        Ok(self
            .stock
            .query(store_id, &filter, since, STOCK_HISTORY_LIMIT)
            .await?)
    }

    /// Per-SKU stock movement of a store over the last `hours` hours,
    /// largest movement first. SKUs whose stock did not move are left out.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::InvalidRequest`] for `hours` outside
    /// `1..=168`, or [`MonitorError::StoreNotFound`].
    pub async fn stock_changes(
        &self,
        store_id: StoreId,
        hours: Option<u32>,
    ) -> Result<Vec<StockChange>, MonitorError> {
        let hours = hours.unwrap_or(DEFAULT_STOCK_CHANGE_HOURS);
        if !STOCK_CHANGE_HOURS.contains(&hours) {
            return Err(MonitorError::InvalidRequest(
                "hours must be between 1 and 168".to_string(),
            ));
        }
        self.get_store(store_id).await?;
        let since = Utc::now() - chrono::Duration::hours(i64::from(hours));
        Ok(self.stock.changes_since(store_id, since).await?)
    }

    // -- webhooks ------------------------------------------------------

    /// Registers a webhook endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::InvalidRequest`] for a non-HTTP URL or an
    /// empty event filter, or [`MonitorError::StoreNotFound`] for an
    /// unknown store scope.
    pub async fn create_webhook(
        &self,
        request: NewWebhook,
    ) -> Result<WebhookRegistration, MonitorError> {
        validate_url(&request.url)?;
        if let Some(store_id) = request.store_id {
            self.get_store(store_id).await?;
        }

        let mut webhook = WebhookRegistration::new(request.store_id, request.url.trim());
        if let Some(events) = request.events {
            webhook.events = validate_events(events)?;
        }
        webhook.secret = request.secret.filter(|s| !s.is_empty());

        self.webhooks.insert(&webhook).await?;
        tracing::info!(webhook_id = %webhook.id, url = %webhook.url, "webhook registered");
        Ok(webhook)
    }

    /// Returns a webhook registration.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::WebhookNotFound`].
    pub async fn get_webhook(&self, id: WebhookId) -> Result<WebhookRegistration, MonitorError> {
        self.webhooks
            .get(id)
            .await?
            .ok_or(MonitorError::WebhookNotFound(id))
    }

    /// Lists registrations. With a store id, only those that would receive
    /// that store's alerts (scoped plus global).
    ///
    /// # Errors
    ///
    /// Returns a [`MonitorError`] on storage failure.
    pub async fn list_webhooks(
        &self,
        store_id: Option<StoreId>,
    ) -> Result<Vec<WebhookRegistration>, MonitorError> {
        Ok(self.webhooks.list_for_store(store_id).await?)
    }

    /// Applies `update` to a registration.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::WebhookNotFound`] or
    /// [`MonitorError::InvalidRequest`].
    pub async fn update_webhook(
        &self,
        id: WebhookId,
        update: WebhookUpdate,
    ) -> Result<WebhookRegistration, MonitorError> {
        let mut webhook = self.get_webhook(id).await?;
        if let Some(url) = update.url {
            validate_url(&url)?;
            webhook.url = url.trim().to_string();
        }
        if let Some(events) = update.events {
            webhook.events = validate_events(events)?;
        }
        if let Some(active) = update.active {
            webhook.active = active;
        }
        if let Some(secret) = update.secret {
            webhook.secret = secret.filter(|s| !s.is_empty());
        }

        self.webhooks.update(&webhook).await?;
        tracing::info!(webhook_id = %id, "webhook updated");
        Ok(webhook)
    }

    /// Removes a registration.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::WebhookNotFound`].
    pub async fn delete_webhook(&self, id: WebhookId) -> Result<(), MonitorError> {
        if !self.webhooks.delete(id).await? {
            return Err(MonitorError::WebhookNotFound(id));
        }
        tracing::info!(webhook_id = %id, "webhook deleted");
        Ok(())
    }

    /// Sends one `test` event to a registration.
    ///
    /// Delivery stats are left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::WebhookNotFound`].
    pub async fn test_webhook(&self, id: WebhookId) -> Result<DeliveryReport, MonitorError> {
        let webhook = self.get_webhook(id).await?;
        Ok(self.orchestrator.dispatcher().send_test(&webhook).await)
    }

    // -- helpers -------------------------------------------------------

    async fn sync_schedule(&self, store: &MonitoredStore) {
        if self.settings.scheduler_enabled {
            self.scheduler.register(store.clone()).await;
        }
    }

    fn validate_interval(&self, interval_secs: u64) -> Result<(), MonitorError> {
        if interval_secs < self.settings.min_scan_interval_secs {
            return Err(MonitorError::InvalidRequest(format!(
                "scan interval must be at least {} seconds",
                self.settings.min_scan_interval_secs
            )));
        }
        Ok(())
    }
}

/// `now - days`, or `None` when retention is off.
fn retention_cutoff(days: u64) -> Option<DateTime<Utc>> {
    if days == 0 {
        return None;
    }
    i64::try_from(days)
        .ok()
        .and_then(chrono::Duration::try_days)
        .and_then(|window| Utc::now().checked_sub_signed(window))
}

fn validate_name(name: &str) -> Result<&str, MonitorError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(MonitorError::InvalidRequest(
            "name must not be empty".to_string(),
        ));
    }
    Ok(name)
}

/// Accepts absolute `http`/`https` URLs with a host.
fn validate_url(raw: &str) -> Result<(), MonitorError> {
    let parsed = url::Url::parse(raw.trim())
        .map_err(|e| MonitorError::InvalidRequest(format!("invalid url {raw:?}: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(MonitorError::InvalidRequest(format!(
            "url must be http(s): {raw:?}"
        )));
    }
    Ok(())
}

fn validate_events(mut events: Vec<AlertKind>) -> Result<Vec<AlertKind>, MonitorError> {
    events.sort_by_key(|k| k.as_str());
    events.dedup();
    if events.is_empty() {
        return Err(MonitorError::InvalidRequest(
            "events must not be empty".to_string(),
        ));
    }
    Ok(events)
}
