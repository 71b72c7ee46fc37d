//! Scan orchestrator: one scan end to end.
//!
//! `fetch (with retry) -> parse -> load current -> diff -> replace current
//! -> evaluate alerts -> log -> deliver -> record history`. Every failure
//! is folded into the returned [`ScanResult`]; nothing is propagated as an
//! `Err`. The snapshot is replaced only after the diff succeeded and only
//! if the scan was not cancelled, so a failed scan always leaves the
//! previous snapshot current. A cancellation that lands while the snapshot
//! is being written discards the store's snapshot entirely: cancellation
//! means the store is going away.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, warn};

use super::{NotificationDispatcher, RetryPolicy, alert_evaluator, differ};
use crate::domain::{
    Alert, AlertRule, EventBus, InventorySnapshot, MonitorEvent, MonitoredStore, ProductRecord,
    ScanId, ScanResult, ScanTrigger, StockObservation,
};
use crate::error::{FetchError, ScanError};
use crate::fetch::{Fetcher, parse_products_page, products_page_url};
use crate::persistence::{
    AlertLog, ScanHistory, SnapshotStore, StockHistory, StoreRepository, WebhookRepository,
};

/// Hard cap on catalog pages fetched per attempt.
pub const MAX_PAGES: u32 = 100;

/// Cooperative cancellation flag shared between the scheduler and a scan.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Creates an unset flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the flag. Scans observing it discard their result.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns `true` once [`CancelFlag::cancel`] was called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Persistence handles a scan reads and writes.
#[derive(Debug, Clone)]
pub struct ScanStorage {
    /// Current snapshot per store.
    pub snapshots: Arc<dyn SnapshotStore>,
    /// Scan history.
    pub history: Arc<dyn ScanHistory>,
    /// Store repository, for `last_scan_at`.
    pub stores: Arc<dyn StoreRepository>,
    /// Webhook registrations alerts are delivered to.
    pub webhooks: Arc<dyn WebhookRepository>,
    /// Log of every raised alert.
    pub alerts: Arc<dyn AlertLog>,
    /// Per-SKU stock observations.
    pub stock: Arc<dyn StockHistory>,
}

/// Fetch tuning for a scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanSettings {
    /// Retry and backoff for transient fetch failures.
    pub retry: RetryPolicy,
    /// Bound on every individual page fetch.
    pub fetch_timeout: Duration,
    /// Products requested per catalog page.
    pub page_limit: usize,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            fetch_timeout: Duration::from_secs(30),
            page_limit: 250,
        }
    }
}

/// Why one fetch attempt failed.
enum AttemptFailure {
    Fetch(FetchError),
    Parse(ScanError),
}

impl From<FetchError> for AttemptFailure {
    fn from(err: FetchError) -> Self {
        Self::Fetch(err)
    }
}

/// Runs scans. Holds no per-store state; callers provide exclusion.
#[derive(Debug)]
pub struct ScanOrchestrator {
    fetcher: Arc<dyn Fetcher>,
    storage: ScanStorage,
    dispatcher: NotificationDispatcher,
    events: EventBus,
    settings: ScanSettings,
}

impl ScanOrchestrator {
    /// Creates an orchestrator.
    #[must_use]
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        storage: ScanStorage,
        dispatcher: NotificationDispatcher,
        events: EventBus,
        settings: ScanSettings,
    ) -> Self {
        Self {
            fetcher,
            storage,
            dispatcher,
            events,
            settings,
        }
    }

    /// Returns the event bus scans publish to.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Returns the dispatcher used for alert delivery.
    #[must_use]
    pub fn dispatcher(&self) -> &NotificationDispatcher {
        &self.dispatcher
    }

    /// Runs one scan of `store`.
    ///
    /// The caller must guarantee that no other scan of the same store runs
    /// concurrently. If `cancel` is set before the snapshot is replaced,
    /// the result is discarded and the scan fails with
    /// [`ScanError::Cancelled`]. If it is set while the replacement is in
    /// flight, the store's snapshot is discarded afterwards and the scan
    /// fails the same way, raising no alerts.
    pub async fn run(
        &self,
        store: &MonitoredStore,
        trigger: ScanTrigger,
        cancel: &CancelFlag,
    ) -> ScanResult {
        let scan_id = ScanId::new();
        let started_at = Utc::now();
        let clock = tokio::time::Instant::now();
        info!(
            store_id = %store.id,
            scan_id = %scan_id,
            trigger = trigger.as_str(),
            "scan started"
        );

        let (fetched, attempts) = self.fetch_catalog(store).await;
        let mut result = ScanResult {
            scan_id,
            store_id: store.id,
            trigger,
            success: false,
            snapshot: None,
            change_events: Vec::new(),
            alerts: Vec::new(),
            error: None,
            attempts,
            started_at,
            duration: Duration::ZERO,
        };

        let committed = match fetched {
            Ok(records) => self.commit(store, records, cancel, &mut result).await,
            Err(err) => Err(err),
        };
        if let Err(err) = committed {
            result.error = Some(err);
        }

        result.duration = clock.elapsed();
        self.finish(store, &result).await;
        result
    }

    /// Diffs, replaces the snapshot, then raises and delivers alerts.
    async fn commit(
        &self,
        store: &MonitoredStore,
        records: Vec<ProductRecord>,
        cancel: &CancelFlag,
        result: &mut ScanResult,
    ) -> Result<(), ScanError> {
        let snapshot = Arc::new(InventorySnapshot::new(store.id, Utc::now(), records));
        let previous = self
            .storage
            .snapshots
            .get_current(store.id)
            .await
            .inspect_err(|e| error!(store_id = %store.id, error = %e, "failed to load snapshot"))?;
        let events = differ::diff(previous.as_deref(), &snapshot);

        if cancel.is_cancelled() {
            info!(store_id = %store.id, "store unregistered mid-scan; discarding result");
            return Err(ScanError::Cancelled);
        }

        self.storage
            .snapshots
            .replace_current(store.id, Arc::clone(&snapshot))
            .await
            .inspect_err(|e| {
                error!(
                    store_id = %store.id,
                    error = %e,
                    "failed to persist snapshot; previous snapshot retained"
                );
            })?;

        if cancel.is_cancelled() {
            info!(store_id = %store.id, "store unregistered during snapshot write; discarding");
            if let Err(err) = self.storage.snapshots.discard(store.id).await {
                error!(store_id = %store.id, error = %err, "failed to discard snapshot");
            }
            return Err(ScanError::Cancelled);
        }

        let rules = AlertRule::for_store(store);
        let alerts = alert_evaluator::evaluate(store.id, &events, &rules, snapshot.taken_at());

        self.record_observations(store, &snapshot, &alerts).await;

        result.success = true;
        result.snapshot = Some(snapshot);
        result.change_events = events;
        result.alerts = alerts;

        self.notify(store, &result.alerts).await;
        Ok(())
    }

    /// Appends to the alert log and stock history. Failures are logged
    /// only; the committed snapshot stands.
    async fn record_observations(
        &self,
        store: &MonitoredStore,
        snapshot: &InventorySnapshot,
        alerts: &[Alert],
    ) {
        if !alerts.is_empty() {
            if let Err(err) = self.storage.alerts.append(alerts).await {
                error!(store_id = %store.id, error = %err, "failed to log alerts");
            }
        }
        let observations = StockObservation::from_snapshot(snapshot);
        if let Err(err) = self.storage.stock.record(&observations).await {
            error!(store_id = %store.id, error = %err, "failed to record stock history");
        }
    }

    /// Publishes alerts, then delivers them as one batch.
    async fn notify(&self, store: &MonitoredStore, alerts: &[Alert]) {
        if alerts.is_empty() {
            return;
        }
        for alert in alerts {
            info!(
                store_id = %store.id,
                sku = %alert.sku,
                kind = alert.kind.as_str(),
                before = alert.before,
                after = alert.after,
                "alert raised"
            );
            let _ = self.events.publish(MonitorEvent::AlertRaised {
                alert: alert.clone(),
            });
        }

        let registrations = match self.storage.webhooks.list_for_store(Some(store.id)).await {
            Ok(registrations) => registrations,
            Err(err) => {
                error!(store_id = %store.id, error = %err, "failed to load webhook registrations");
                return;
            }
        };
        let reports = self.dispatcher.deliver_all(alerts, &registrations).await;
        let failed = reports.iter().filter(|r| !r.delivered).count();
        if failed > 0 {
            warn!(
                store_id = %store.id,
                failed,
                total = reports.len(),
                "some alert deliveries failed"
            );
        }
    }

    /// Records history, stamps the store and publishes the outcome.
    async fn finish(&self, store: &MonitoredStore, result: &ScanResult) {
        if let Err(err) = self.storage.history.record(&result.to_record()).await {
            error!(store_id = %store.id, error = %err, "failed to record scan history");
        }

        let duration_ms = u64::try_from(result.duration.as_millis()).unwrap_or(u64::MAX);
        let timestamp = Utc::now();

        match &result.error {
            None => {
                if let Err(err) = self
                    .storage
                    .stores
                    .mark_scanned(store.id, result.started_at)
                    .await
                {
                    warn!(store_id = %store.id, error = %err, "failed to update last scan time");
                }
                info!(
                    store_id = %store.id,
                    scan_id = %result.scan_id,
                    attempts = result.attempts,
                    events = result.change_events.len(),
                    alerts = result.alerts.len(),
                    duration_ms,
                    "scan finished"
                );
                let _ = self.events.publish(MonitorEvent::ScanCompleted {
                    store_id: store.id,
                    scan_id: result.scan_id,
                    trigger: result.trigger,
                    event_count: result.change_events.len(),
                    duration_ms,
                    timestamp,
                });
            }
            Some(err) => {
                warn!(
                    store_id = %store.id,
                    scan_id = %result.scan_id,
                    attempts = result.attempts,
                    duration_ms,
                    error = %err,
                    "scan failed"
                );
                let _ = self.events.publish(MonitorEvent::ScanFailed {
                    store_id: store.id,
                    scan_id: result.scan_id,
                    trigger: result.trigger,
                    error: err.to_string(),
                    timestamp,
                });
            }
        }
    }

    /// Fetches the full catalog, retrying transient failures.
    ///
    /// Returns the outcome and the number of attempts made.
    async fn fetch_catalog(
        &self,
        store: &MonitoredStore,
    ) -> (Result<Vec<ProductRecord>, ScanError>, u32) {
        let retry = &self.settings.retry;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let failure = match self.fetch_pages(store).await {
                Ok(records) => return (Ok(records), attempt),
                Err(failure) => failure,
            };
            match failure {
                AttemptFailure::Fetch(FetchError::Transient(message)) => {
                    if !retry.allows_another(attempt) {
                        return (
                            Err(ScanError::TransientFetch {
                                attempts: attempt,
                                message,
                            }),
                            attempt,
                        );
                    }
                    let delay = retry.delay_after(attempt);
                    warn!(
                        store_id = %store.id,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %message,
                        "transient fetch failure; retry scheduled"
                    );
                    tokio::time::sleep(delay).await;
                }
                AttemptFailure::Fetch(FetchError::Permanent(message)) => {
                    return (Err(ScanError::PermanentFetch(message)), attempt);
                }
                AttemptFailure::Parse(err) => return (Err(err), attempt),
            }
        }
    }

    /// One attempt: every catalog page until a short page.
    async fn fetch_pages(
        &self,
        store: &MonitoredStore,
    ) -> Result<Vec<ProductRecord>, AttemptFailure> {
        let limit = self.settings.page_limit.max(1);
        let timeout = self.settings.fetch_timeout;
        let mut records = Vec::new();

        for page in 1..=MAX_PAGES {
            let url = products_page_url(&store.url, limit, page);
            let response = match tokio::time::timeout(timeout, self.fetcher.fetch(&url)).await {
                Ok(response) => response?,
                Err(_) => {
                    return Err(AttemptFailure::Fetch(FetchError::Transient(format!(
                        "fetch timed out after {}s",
                        timeout.as_secs_f64()
                    ))));
                }
            };
            let parsed = parse_products_page(&response.body).map_err(AttemptFailure::Parse)?;
            records.extend(parsed.records);
            if parsed.product_count < limit {
                break;
            }
        }
        Ok(records)
    }
}
