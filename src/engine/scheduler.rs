//! Scan scheduler: one recurring timer per store and at most one scan in
//! flight per store.
//!
//! # Locking
//!
//! Every store known to the scheduler owns a slot, created on first use.
//! A slot is removed only when its store is retired and its gate is free,
//! so the gate is never replaced while a scan holds it: retiring a store
//! mid-scan leaves the removal to the scan task. The slot map is guarded by
//! an outer `RwLock` that is only held long enough to look up, insert or
//! remove a slot; scans for different stores never contend.
//!
//! The gate is a `tokio::sync::Mutex<()>` that is only ever *tried*
//! (`try_lock_owned`), never awaited. A scheduled tick or manual trigger
//! that loses the race is dropped, never queued. The owned guard moves
//! into the spawned scan task and is released when the scan finishes,
//! whatever happens to the timer that started it.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::{CancelFlag, ScanOrchestrator};
use crate::domain::{
    MonitorEvent, MonitoredStore, ScanId, ScanResult, ScanTrigger, SkipReason, StoreId,
};
use crate::error::ScanError;

/// Per-store scheduling counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanDiagnostics {
    /// Scans started, scheduled or manual.
    pub scans_started: u64,
    /// Scheduled ticks dropped because a scan was still running.
    pub scans_skipped_overlap: u64,
    /// Manual triggers rejected because a scan was running.
    pub manual_rejected_busy: u64,
    /// Outcome of the most recent finished scan.
    pub last_outcome: Option<LastOutcome>,
}

/// Summary of the most recent finished scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LastOutcome {
    /// Scan identifier.
    pub scan_id: ScanId,
    /// What started the scan.
    pub trigger: ScanTrigger,
    /// Whether the snapshot was replaced.
    pub success: bool,
    /// When the scan started.
    pub started_at: DateTime<Utc>,
    /// Failure description.
    pub error: Option<String>,
}

impl From<&ScanResult> for LastOutcome {
    fn from(result: &ScanResult) -> Self {
        Self {
            scan_id: result.scan_id,
            trigger: result.trigger,
            success: result.success,
            started_at: result.started_at,
            error: result.error.as_ref().map(ToString::to_string),
        }
    }
}

/// Result of a manual trigger.
#[derive(Debug)]
pub enum TriggerOutcome {
    /// The scan ran; its result may still be a failure.
    Completed(Box<ScanResult>),
    /// A scan for the store was already in flight. Nothing was queued.
    Busy,
}

#[derive(Debug)]
struct SlotState {
    /// Latest registered copy of the store, `None` when unregistered.
    store: Option<MonitoredStore>,
    timer: Option<JoinHandle<()>>,
    /// Flag handed to scans started under the current registration.
    cancel: CancelFlag,
    /// Set by `retire`; the slot is dropped once no scan holds it.
    retired: bool,
    diagnostics: ScanDiagnostics,
}

#[derive(Debug)]
struct StoreSlot {
    gate: Arc<Mutex<()>>,
    state: Mutex<SlotState>,
}

impl StoreSlot {
    fn new() -> Self {
        Self {
            gate: Arc::new(Mutex::new(())),
            state: Mutex::new(SlotState {
                store: None,
                timer: None,
                cancel: CancelFlag::new(),
                retired: false,
                diagnostics: ScanDiagnostics::default(),
            }),
        }
    }

    fn try_acquire(&self) -> Option<OwnedMutexGuard<()>> {
        Arc::clone(&self.gate).try_lock_owned().ok()
    }
}

#[derive(Debug)]
struct SchedulerInner {
    orchestrator: Arc<ScanOrchestrator>,
    slots: RwLock<HashMap<StoreId, Arc<StoreSlot>>>,
}

impl SchedulerInner {
    async fn slot(&self, store_id: StoreId) -> Arc<StoreSlot> {
        if let Some(slot) = self.slots.read().await.get(&store_id) {
            return Arc::clone(slot);
        }
        let mut slots = self.slots.write().await;
        Arc::clone(
            slots
                .entry(store_id)
                .or_insert_with(|| Arc::new(StoreSlot::new())),
        )
    }

    async fn existing_slot(&self, store_id: StoreId) -> Option<Arc<StoreSlot>> {
        self.slots.read().await.get(&store_id).map(Arc::clone)
    }

    /// Removes `slot` from the map unless it was already replaced.
    async fn remove_slot(&self, store_id: StoreId, slot: &Arc<StoreSlot>) {
        let mut slots = self.slots.write().await;
        if slots.get(&store_id).is_some_and(|s| Arc::ptr_eq(s, slot)) {
            slots.remove(&store_id);
            debug!(store_id = %store_id, "scheduler slot released");
        }
    }

    /// Handles one timer tick: start a scan or record an overlap skip.
    async fn on_tick(self: &Arc<Self>, store_id: StoreId) {
        let Some(slot) = self.existing_slot(store_id).await else {
            return;
        };

        let mut state = slot.state.lock().await;
        let Some(store) = state.store.clone() else {
            return;
        };
        let Some(guard) = slot.try_acquire() else {
            state.diagnostics.scans_skipped_overlap += 1;
            drop(state);
            warn!(store_id = %store_id, "scan skipped: previous scan still running");
            let _ = self.orchestrator.events().publish(MonitorEvent::ScanSkipped {
                store_id,
                reason: SkipReason::Overlap,
                timestamp: Utc::now(),
            });
            return;
        };
        state.diagnostics.scans_started += 1;
        let cancel = state.cancel.clone();
        drop(state);

        let _scan = self.spawn_scan(slot, guard, store, ScanTrigger::Scheduled, cancel);
    }

    /// Runs a scan in its own task, holding `guard` until it finishes.
    fn spawn_scan(
        self: &Arc<Self>,
        slot: Arc<StoreSlot>,
        guard: OwnedMutexGuard<()>,
        store: MonitoredStore,
        trigger: ScanTrigger,
        cancel: CancelFlag,
    ) -> JoinHandle<ScanResult> {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let _guard = guard;
            let result = inner.orchestrator.run(&store, trigger, &cancel).await;
            let mut state = slot.state.lock().await;
            state.diagnostics.last_outcome = Some(LastOutcome::from(&result));
            if state.retired {
                inner.remove_slot(store.id, &slot).await;
            }
            drop(state);
            result
        })
    }
}

/// Owns the per-store timers and the in-flight exclusion.
///
/// Cheap to clone; clones share the same timers.
#[derive(Debug, Clone)]
pub struct ScanScheduler {
    inner: Arc<SchedulerInner>,
}

impl ScanScheduler {
    /// Creates a scheduler with no registered stores.
    #[must_use]
    pub fn new(orchestrator: Arc<ScanOrchestrator>) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                orchestrator,
                slots: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Adds or refreshes the timer for `store`.
    ///
    /// The first tick fires immediately. Re-registering with the same
    /// interval keeps the running timer and only refreshes the settings
    /// later scans use; a changed interval restarts the timer. A store that
    /// is disabled or deleted is unregistered instead.
    pub async fn register(&self, store: MonitoredStore) {
        if !store.is_schedulable() {
            self.unregister(store.id).await;
            return;
        }

        let store_id = store.id;
        let interval = store.scan_interval();
        let slot = self.inner.slot(store_id).await;
        let mut state = slot.state.lock().await;

        let timer_alive = state.timer.as_ref().is_some_and(|t| !t.is_finished());
        let same_interval = state
            .store
            .as_ref()
            .is_some_and(|s| s.scan_interval() == interval);
        state.store = Some(store);
        if timer_alive && same_interval {
            debug!(store_id = %store_id, "store settings refreshed");
            return;
        }

        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        state.timer = Some(spawn_timer(Arc::downgrade(&self.inner), store_id, interval));
        info!(
            store_id = %store_id,
            interval_secs = interval.as_secs(),
            "store registered"
        );
    }

    /// Stops the timer for `store_id`. Returns `false` if it was not
    /// registered.
    ///
    /// An in-flight scan is left to finish and its result is kept.
    pub async fn unregister(&self, store_id: StoreId) -> bool {
        let Some(slot) = self.inner.existing_slot(store_id).await else {
            return false;
        };
        let mut state = slot.state.lock().await;
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        let was_registered = state.store.take().is_some();
        if was_registered {
            info!(store_id = %store_id, "store unregistered");
        }
        was_registered
    }

    /// Unregisters `store_id`, cancels its in-flight scan, if any, and
    /// forgets the store.
    ///
    /// The scan runs to completion but its result is discarded. The slot
    /// and its diagnostics are dropped now if the store is idle, otherwise
    /// when the scan finishes. Used when a store is deleted.
    pub async fn retire(&self, store_id: StoreId) -> bool {
        let was_registered = self.unregister(store_id).await;
        let Some(slot) = self.inner.existing_slot(store_id).await else {
            return was_registered;
        };
        let mut state = slot.state.lock().await;
        state.cancel.cancel();
        state.retired = true;
        // Gates are only acquired under the state lock, so a free gate
        // stays free until the slot is gone.
        if slot.gate.try_lock().is_ok() {
            self.inner.remove_slot(store_id, &slot).await;
        }
        drop(state);
        was_registered
    }

    /// Runs a scan of `store` now, outside its timer.
    ///
    /// Works for unregistered stores too. If a scan of the store is already
    /// in flight the request is rejected with [`TriggerOutcome::Busy`]; the
    /// running scan is unaffected.
    pub async fn trigger(&self, store: &MonitoredStore) -> TriggerOutcome {
        let slot = self.inner.slot(store.id).await;
        let mut state = slot.state.lock().await;
        let Some(guard) = slot.try_acquire() else {
            state.diagnostics.manual_rejected_busy += 1;
            drop(state);
            info!(store_id = %store.id, "manual scan rejected: scan in flight");
            let _ = self
                .inner
                .orchestrator
                .events()
                .publish(MonitorEvent::ScanSkipped {
                    store_id: store.id,
                    reason: SkipReason::Busy,
                    timestamp: Utc::now(),
                });
            return TriggerOutcome::Busy;
        };
        state.diagnostics.scans_started += 1;
        let cancel = state.cancel.clone();
        drop(state);

        let started_at = Utc::now();
        let handle = self.inner.spawn_scan(
            Arc::clone(&slot),
            guard,
            store.clone(),
            ScanTrigger::Manual,
            cancel,
        );
        match handle.await {
            Ok(result) => TriggerOutcome::Completed(Box::new(result)),
            Err(err) => {
                warn!(store_id = %store.id, error = %err, "manual scan task ended abnormally");
                TriggerOutcome::Completed(Box::new(ScanResult::failure(
                    store.id,
                    ScanTrigger::Manual,
                    started_at,
                    0,
                    ScanError::Aborted(err.to_string()),
                )))
            }
        }
    }

    /// Makes the registered set match `stores`.
    ///
    /// Every schedulable store is registered (or refreshed); every
    /// registered store that is absent or no longer schedulable is
    /// unregistered.
    pub async fn reconcile(&self, stores: &[MonitoredStore]) {
        let mut wanted = Vec::with_capacity(stores.len());
        for store in stores {
            if store.is_schedulable() {
                wanted.push(store.id);
            }
            self.register(store.clone()).await;
        }
        for store_id in self.registered().await {
            if !wanted.contains(&store_id) {
                self.unregister(store_id).await;
            }
        }
    }

    /// Ids of the stores that currently have a timer, sorted.
    pub async fn registered(&self) -> Vec<StoreId> {
        let slots: Vec<(StoreId, Arc<StoreSlot>)> = self
            .inner
            .slots
            .read()
            .await
            .iter()
            .map(|(id, slot)| (*id, Arc::clone(slot)))
            .collect();
        let mut ids = Vec::new();
        for (id, slot) in slots {
            if slot.state.lock().await.store.is_some() {
                ids.push(id);
            }
        }
        ids.sort();
        ids
    }

    /// Returns `true` if a scan of `store_id` is in flight.
    pub async fn is_scanning(&self, store_id: StoreId) -> bool {
        match self.inner.existing_slot(store_id).await {
            Some(slot) => slot.gate.try_lock().is_err(),
            None => false,
        }
    }

    /// Scheduling counters for `store_id`, if the scheduler has seen it.
    pub async fn diagnostics(&self, store_id: StoreId) -> Option<ScanDiagnostics> {
        let slot = self.inner.existing_slot(store_id).await?;
        let state = slot.state.lock().await;
        Some(state.diagnostics.clone())
    }

    /// Aborts every timer. In-flight scans finish in their own tasks.
    pub async fn shutdown(&self) {
        let slots: Vec<Arc<StoreSlot>> =
            self.inner.slots.read().await.values().map(Arc::clone).collect();
        for slot in slots {
            let mut state = slot.state.lock().await;
            if let Some(timer) = state.timer.take() {
                timer.abort();
            }
            state.store = None;
        }
        info!("scheduler stopped");
    }
}

/// Spawns the recurring timer for one store.
///
/// The timer holds only a weak reference so that dropping the scheduler
/// ends it.
fn spawn_timer(
    inner: Weak<SchedulerInner>,
    store_id: StoreId,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let Some(inner) = inner.upgrade() else {
                break;
            };
            inner.on_tick(store_id).await;
        }
    })
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::engine::test_support::{Harness, ScriptedFetcher, catalog_body, ok_response};

    fn store(interval_secs: u64) -> MonitoredStore {
        MonitoredStore::new("Shop", "https://shop.example.com", interval_secs, 3)
    }

    fn slow_harness(scan_time: Duration) -> Harness {
        let h = Harness::new(ScriptedFetcher::new().with_delay(scan_time));
        h.fetcher
            .set_fallback(ok_response(catalog_body(&[("A", 5, "1.00")])));
        h
    }

    /// Lets spawned tasks run without advancing the paused clock.
    async fn settle() {
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_manual_triggers_are_rejected_busy() {
        let h = slow_harness(Duration::from_secs(5));
        let scheduler = ScanScheduler::new(Arc::clone(&h.orchestrator));
        let store = store(600);

        let running = {
            let scheduler = scheduler.clone();
            let store = store.clone();
            tokio::spawn(async move { scheduler.trigger(&store).await })
        };
        settle().await;
        assert!(scheduler.is_scanning(store.id).await);

        for _ in 0..3 {
            assert!(matches!(scheduler.trigger(&store).await, TriggerOutcome::Busy));
        }

        let Ok(TriggerOutcome::Completed(result)) = running.await else {
            panic!("first trigger should complete");
        };
        assert!(result.success, "running scan affected: {:?}", result.error);
        assert_eq!(h.fetcher.calls(), 1);

        let Some(diag) = scheduler.diagnostics(store.id).await else {
            panic!("diagnostics missing");
        };
        assert_eq!(diag.scans_started, 1);
        assert_eq!(diag.manual_rejected_busy, 3);
        assert!(diag.last_outcome.is_some_and(|o| o.success));
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_ticks_are_dropped_not_queued() {
        // Scans take 25s on a 10s interval.
        let h = slow_harness(Duration::from_secs(25));
        let scheduler = ScanScheduler::new(Arc::clone(&h.orchestrator));
        let store = store(10);
        let mut rx = h.events.subscribe();

        scheduler.register(store.clone()).await;
        // Ticks at 0, 10, 20, 30, 40: scans start at 0 and 30.
        tokio::time::sleep(Duration::from_secs(41)).await;
        settle().await;

        let Some(diag) = scheduler.diagnostics(store.id).await else {
            panic!("diagnostics missing");
        };
        assert_eq!(diag.scans_started, 2);
        assert_eq!(diag.scans_skipped_overlap, 3);
        assert_eq!(h.fetcher.calls(), 2);

        let mut skipped = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(
                event,
                MonitorEvent::ScanSkipped {
                    reason: SkipReason::Overlap,
                    ..
                }
            ) {
                skipped += 1;
            }
        }
        assert_eq!(skipped, 3);
        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stores_scan_independently() {
        let h = slow_harness(Duration::from_secs(5));
        let scheduler = ScanScheduler::new(Arc::clone(&h.orchestrator));
        let a = store(600);
        let b = MonitoredStore::new("Other", "https://other.example.com", 600, 3);

        scheduler.register(a.clone()).await;
        scheduler.register(b.clone()).await;
        settle().await;

        assert!(scheduler.is_scanning(a.id).await);
        assert!(scheduler.is_scanning(b.id).await);
        assert_eq!(scheduler.registered().await.len(), 2);
        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn unregister_stops_future_ticks_but_keeps_running_scan() {
        let h = slow_harness(Duration::from_secs(5));
        let scheduler = ScanScheduler::new(Arc::clone(&h.orchestrator));
        let store = store(10);

        scheduler.register(store.clone()).await;
        settle().await;
        assert!(scheduler.unregister(store.id).await);
        assert!(!scheduler.unregister(store.id).await);

        tokio::time::sleep(Duration::from_secs(60)).await;
        settle().await;

        assert_eq!(h.fetcher.calls(), 1);
        let Ok(current) = h.snapshots.get_current(store.id).await else {
            panic!("get_current failed");
        };
        assert!(current.is_some(), "in-flight scan result should be kept");
    }

    #[tokio::test(start_paused = true)]
    async fn retire_discards_in_flight_result() {
        let h = slow_harness(Duration::from_secs(5));
        let scheduler = ScanScheduler::new(Arc::clone(&h.orchestrator));
        let store = store(600);
        let mut events = h.events.subscribe_store(store.id);

        scheduler.register(store.clone()).await;
        settle().await;
        assert!(scheduler.is_scanning(store.id).await);
        assert!(scheduler.retire(store.id).await);
        // Still held by the running scan.
        assert!(scheduler.diagnostics(store.id).await.is_some());

        tokio::time::sleep(Duration::from_secs(10)).await;
        settle().await;

        let Ok(current) = h.snapshots.get_current(store.id).await else {
            panic!("get_current failed");
        };
        assert!(current.is_none());
        let Some(MonitorEvent::ScanFailed { error, .. }) = events.recv().await else {
            panic!("expected the retired scan to fail");
        };
        assert!(error.contains("cancelled"), "unexpected error: {error}");
        assert!(scheduler.diagnostics(store.id).await.is_none());
        assert!(!scheduler.is_scanning(store.id).await);
    }

    #[tokio::test(start_paused = true)]
    async fn retire_releases_idle_slot() {
        let h = slow_harness(Duration::ZERO);
        let scheduler = ScanScheduler::new(Arc::clone(&h.orchestrator));
        let store = store(600);

        scheduler.register(store.clone()).await;
        settle().await;
        assert_eq!(h.fetcher.calls(), 1);
        assert!(scheduler.diagnostics(store.id).await.is_some());

        assert!(scheduler.retire(store.id).await);
        assert!(scheduler.diagnostics(store.id).await.is_none());
        assert!(scheduler.inner.slots.read().await.is_empty());
        assert!(!scheduler.retire(store.id).await);
    }

    #[tokio::test(start_paused = true)]
    async fn interval_change_restarts_timer() {
        let h = slow_harness(Duration::ZERO);
        let scheduler = ScanScheduler::new(Arc::clone(&h.orchestrator));
        let mut store = store(100);

        scheduler.register(store.clone()).await;
        settle().await;
        assert_eq!(h.fetcher.calls(), 1);

        // Same interval: no restart, so no immediate extra tick.
        store.name = "Renamed".to_string();
        scheduler.register(store.clone()).await;
        settle().await;
        assert_eq!(h.fetcher.calls(), 1);

        store.scan_interval_secs = 50;
        scheduler.register(store.clone()).await;
        settle().await;
        assert_eq!(h.fetcher.calls(), 2);

        tokio::time::sleep(Duration::from_secs(51)).await;
        settle().await;
        assert_eq!(h.fetcher.calls(), 3);
        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn reconcile_drops_disabled_and_missing_stores() {
        let h = slow_harness(Duration::ZERO);
        let scheduler = ScanScheduler::new(Arc::clone(&h.orchestrator));
        let keep = store(600);
        let mut disable = MonitoredStore::new("B", "https://b.example.com", 600, 3);
        let gone = MonitoredStore::new("C", "https://c.example.com", 600, 3);

        scheduler
            .reconcile(&[keep.clone(), disable.clone(), gone.clone()])
            .await;
        assert_eq!(scheduler.registered().await.len(), 3);

        disable.enabled = false;
        scheduler.reconcile(&[keep.clone(), disable.clone()]).await;
        assert_eq!(scheduler.registered().await, vec![keep.id]);
        scheduler.shutdown().await;
        assert!(scheduler.registered().await.is_empty());
    }
}
