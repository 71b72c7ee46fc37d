//! Test doubles for the fetch and webhook boundaries, plus an engine
//! harness wired to in-memory persistence.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::{
    DeliveryPolicy, NotificationDispatcher, RetryPolicy, ScanOrchestrator, ScanScheduler,
    ScanSettings, ScanStorage,
};
use crate::domain::EventBus;
use crate::error::{DeliveryError, FetchError};
use crate::fetch::{FetchResponse, Fetcher};
use crate::notify::{WebhookRequest, WebhookSender};
use crate::persistence::{
    AlertLog, MemoryAlertLog, MemoryScanHistory, MemorySnapshotStore, MemoryStockHistory,
    MemoryStoreRepository, MemoryWebhookRepository, ScanHistory, SnapshotStore, StockHistory,
    StoreRepository, WebhookRepository,
};
use crate::service::{MonitorService, MonitorSettings};

/// Builds a `/products.json` body with one single-variant product per
/// `(sku, quantity, price)` entry.
pub(crate) fn catalog_body(items: &[(&str, i64, &str)]) -> Vec<u8> {
    let products: Vec<serde_json::Value> = items
        .iter()
        .enumerate()
        .map(|(i, (sku, qty, price))| {
            serde_json::json!({
                "id": i + 1,
                "title": format!("Product {sku}"),
                "variants": [{
                    "id": 1000 + i,
                    "title": "Default Title",
                    "sku": sku,
                    "price": price,
                    "available": *qty > 0,
                    "inventory_quantity": qty,
                }],
            })
        })
        .collect();
    serde_json::json!({ "products": products })
        .to_string()
        .into_bytes()
}

/// Successful response carrying `body`.
pub(crate) fn ok_response(body: Vec<u8>) -> Result<FetchResponse, FetchError> {
    Ok(FetchResponse { status: 200, body })
}

/// Fetcher replaying a script of responses, then a fallback.
#[derive(Debug)]
pub(crate) struct ScriptedFetcher {
    script: Mutex<VecDeque<Result<FetchResponse, FetchError>>>,
    fallback: Mutex<Result<FetchResponse, FetchError>>,
    delay: Duration,
    calls: AtomicU32,
    urls: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub(crate) fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(Err(FetchError::Permanent("no scripted response".to_string()))),
            delay: Duration::ZERO,
            calls: AtomicU32::new(0),
            urls: Mutex::new(Vec::new()),
        }
    }

    /// Every fetch sleeps for `delay` before answering.
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn push(&self, response: Result<FetchResponse, FetchError>) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(response);
        }
    }

    /// Answer given once the script runs out.
    pub(crate) fn set_fallback(&self, response: Result<FetchResponse, FetchError>) {
        if let Ok(mut fallback) = self.fallback.lock() {
            *fallback = response;
        }
    }

    pub(crate) fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn urls(&self) -> Vec<String> {
        self.urls.lock().map(|u| u.clone()).unwrap_or_default()
    }

    fn next_response(&self) -> Result<FetchResponse, FetchError> {
        let scripted = self.script.lock().ok().and_then(|mut s| s.pop_front());
        scripted.unwrap_or_else(|| {
            self.fallback
                .lock()
                .map(|f| f.clone())
                .unwrap_or_else(|_| Err(FetchError::Permanent("poisoned".to_string())))
        })
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut urls) = self.urls.lock() {
            urls.push(url.to_string());
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.next_response()
    }
}

/// Webhook sender recording every request, with per-URL failures.
#[derive(Debug, Default)]
pub(crate) struct RecordingSender {
    requests: Mutex<Vec<WebhookRequest>>,
    /// Remaining failures per URL; `u32::MAX` fails forever.
    failures: Mutex<HashMap<String, u32>>,
}

impl RecordingSender {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn fail_url(&self, url: &str) {
        self.fail_times(url, u32::MAX);
    }

    pub(crate) fn fail_times(&self, url: &str, times: u32) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.insert(url.to_string(), times);
        }
    }

    pub(crate) fn requests(&self) -> Vec<WebhookRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub(crate) fn requests_to(&self, url: &str) -> Vec<WebhookRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.url == url)
            .collect()
    }
}

#[async_trait]
impl WebhookSender for RecordingSender {
    async fn send(&self, request: &WebhookRequest) -> Result<(), DeliveryError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        let Ok(mut failures) = self.failures.lock() else {
            return Ok(());
        };
        match failures.get_mut(&request.url) {
            Some(remaining) if *remaining > 0 => {
                if *remaining != u32::MAX {
                    *remaining -= 1;
                }
                Err(DeliveryError::Status(500))
            }
            _ => Ok(()),
        }
    }
}

/// Orchestrator wired to test doubles and in-memory persistence.
#[derive(Debug)]
pub(crate) struct Harness {
    pub(crate) fetcher: Arc<ScriptedFetcher>,
    pub(crate) sender: Arc<RecordingSender>,
    pub(crate) snapshots: Arc<dyn SnapshotStore>,
    pub(crate) history: Arc<MemoryScanHistory>,
    pub(crate) stores: Arc<MemoryStoreRepository>,
    pub(crate) webhooks: Arc<MemoryWebhookRepository>,
    pub(crate) alerts: Arc<MemoryAlertLog>,
    pub(crate) stock: Arc<MemoryStockHistory>,
    pub(crate) events: EventBus,
    pub(crate) orchestrator: Arc<ScanOrchestrator>,
}

impl Harness {
    pub(crate) fn new(fetcher: ScriptedFetcher) -> Self {
        Self::with_snapshots(fetcher, Arc::new(MemorySnapshotStore::new()))
    }

    pub(crate) fn with_snapshots(
        fetcher: ScriptedFetcher,
        snapshots: Arc<dyn SnapshotStore>,
    ) -> Self {
        let fetcher = Arc::new(fetcher);
        let sender = Arc::new(RecordingSender::new());
        let history = Arc::new(MemoryScanHistory::new());
        let stores = Arc::new(MemoryStoreRepository::new());
        let webhooks = Arc::new(MemoryWebhookRepository::new());
        let alerts = Arc::new(MemoryAlertLog::new());
        let stock = Arc::new(MemoryStockHistory::new());
        let events = EventBus::new(256);

        let dispatcher = NotificationDispatcher::new(
            Arc::clone(&sender) as Arc<dyn WebhookSender>,
            Arc::clone(&webhooks) as Arc<dyn WebhookRepository>,
            DeliveryPolicy::default(),
        );
        let storage = ScanStorage {
            snapshots: Arc::clone(&snapshots),
            history: Arc::clone(&history) as Arc<dyn ScanHistory>,
            stores: Arc::clone(&stores) as Arc<dyn StoreRepository>,
            webhooks: Arc::clone(&webhooks) as Arc<dyn WebhookRepository>,
            alerts: Arc::clone(&alerts) as Arc<dyn AlertLog>,
            stock: Arc::clone(&stock) as Arc<dyn StockHistory>,
        };
        let settings = ScanSettings {
            retry: RetryPolicy {
                jitter: 0.0,
                ..RetryPolicy::default()
            },
            fetch_timeout: Duration::from_secs(30),
            page_limit: 250,
        };
        let orchestrator = Arc::new(ScanOrchestrator::new(
            Arc::clone(&fetcher) as Arc<dyn Fetcher>,
            storage,
            dispatcher,
            events.clone(),
            settings,
        ));

        Self {
            fetcher,
            sender,
            snapshots,
            history,
            stores,
            webhooks,
            alerts,
            stock,
            events,
            orchestrator,
        }
    }

    /// Monitor service over this harness's storage, with a fresh scheduler.
    pub(crate) fn service(&self, settings: MonitorSettings) -> MonitorService {
        let storage = ScanStorage {
            snapshots: Arc::clone(&self.snapshots),
            history: Arc::clone(&self.history) as Arc<dyn ScanHistory>,
            stores: Arc::clone(&self.stores) as Arc<dyn StoreRepository>,
            webhooks: Arc::clone(&self.webhooks) as Arc<dyn WebhookRepository>,
            alerts: Arc::clone(&self.alerts) as Arc<dyn AlertLog>,
            stock: Arc::clone(&self.stock) as Arc<dyn StockHistory>,
        };
        let scheduler = ScanScheduler::new(Arc::clone(&self.orchestrator));
        MonitorService::new(storage, Arc::clone(&self.orchestrator), scheduler, settings)
    }
}
