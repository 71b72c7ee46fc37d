//! Full scan pipeline over HTTP: a stub storefront serves a paginated
//! catalog, the monitor scans it through the real fetcher, and alerts land
//! on a stub webhook receiver with verifiable signatures.

#![allow(clippy::panic)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};

use stockwatch::domain::{AlertKind, DeliveryStatus, EventBus, MonitorEvent};
use stockwatch::engine::{
    DeliveryPolicy, NotificationDispatcher, RetryPolicy, ScanOrchestrator, ScanScheduler,
    ScanSettings, ScanStorage,
};
use stockwatch::fetch::{Fetcher, HttpFetcher};
use stockwatch::notify::{HttpWebhookSender, SIGNATURE_HEADER, WebhookSender, sign_payload};
use stockwatch::persistence::{
    AlertLog, MemoryAlertLog, MemoryScanHistory, MemorySnapshotStore, MemoryStockHistory,
    MemoryStoreRepository, MemoryWebhookRepository, ScanHistory, SnapshotStore, StockHistory,
    StoreRepository, WebhookRepository,
};
use stockwatch::service::{MonitorService, MonitorSettings, NewStore, NewWebhook};

/// `(sku, quantity, price)` rows the stub storefront currently serves.
type Catalog = Arc<Mutex<Vec<(String, i64, String)>>>;

async fn catalog_page(
    State(catalog): State<Catalog>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    let limit: usize = params
        .get("limit")
        .and_then(|v| v.parse().ok())
        .unwrap_or(250);
    let page: usize = params
        .get("page")
        .and_then(|v| v.parse().ok())
        .unwrap_or(1);
    let rows = catalog.lock().map(|c| c.clone()).unwrap_or_default();
    let products: Vec<Value> = rows
        .iter()
        .enumerate()
        .skip(page.saturating_sub(1) * limit)
        .take(limit)
        .map(|(i, (sku, qty, price))| {
            json!({
                "id": i + 1,
                "title": format!("Product {sku}"),
                "variants": [{
                    "id": 100 + i,
                    "title": "Default Title",
                    "sku": sku,
                    "price": price,
                    "available": *qty > 0,
                    "inventory_quantity": qty,
                }],
            })
        })
        .collect();
    Json(json!({ "products": products }))
}

type Received = Arc<Mutex<Vec<(HeaderMap, Bytes)>>>;

async fn receive(State(received): State<Received>, headers: HeaderMap, body: Bytes) -> StatusCode {
    if let Ok(mut received) = received.lock() {
        received.push((headers, body));
    }
    StatusCode::OK
}

async fn serve(app: Router) -> SocketAddr {
    let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
        panic!("bind failed");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("no local addr");
    };
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

fn set_catalog(catalog: &Catalog, rows: &[(&str, i64, &str)]) {
    if let Ok(mut c) = catalog.lock() {
        *c = rows
            .iter()
            .map(|(sku, qty, price)| (sku.to_string(), *qty, price.to_string()))
            .collect();
    }
}

fn monitor() -> MonitorService {
    let Ok(fetcher) = HttpFetcher::new(Duration::from_secs(5), "stockwatch-test") else {
        panic!("client should build");
    };
    let Ok(sender) = HttpWebhookSender::new(Duration::from_secs(5)) else {
        panic!("client should build");
    };
    let storage = ScanStorage {
        snapshots: Arc::new(MemorySnapshotStore::new()) as Arc<dyn SnapshotStore>,
        history: Arc::new(MemoryScanHistory::new()) as Arc<dyn ScanHistory>,
        stores: Arc::new(MemoryStoreRepository::new()) as Arc<dyn StoreRepository>,
        webhooks: Arc::new(MemoryWebhookRepository::new()) as Arc<dyn WebhookRepository>,
        alerts: Arc::new(MemoryAlertLog::new()) as Arc<dyn AlertLog>,
        stock: Arc::new(MemoryStockHistory::new()) as Arc<dyn StockHistory>,
    };
    let dispatcher = NotificationDispatcher::new(
        Arc::new(sender) as Arc<dyn WebhookSender>,
        Arc::clone(&storage.webhooks),
        DeliveryPolicy {
            max_retries: 0,
            spacing: Duration::ZERO,
        },
    );
    let orchestrator = Arc::new(ScanOrchestrator::new(
        Arc::new(fetcher) as Arc<dyn Fetcher>,
        storage.clone(),
        dispatcher,
        EventBus::new(64),
        ScanSettings {
            retry: RetryPolicy {
                max_attempts: 1,
                ..RetryPolicy::default()
            },
            fetch_timeout: Duration::from_secs(5),
            page_limit: 2,
        },
    ));
    let scheduler = ScanScheduler::new(Arc::clone(&orchestrator));
    MonitorService::new(
        storage,
        orchestrator,
        scheduler,
        MonitorSettings {
            scheduler_enabled: false,
            ..MonitorSettings::default()
        },
    )
}

#[tokio::test]
async fn scan_detects_changes_and_delivers_signed_alerts() {
    let catalog: Catalog = Arc::default();
    set_catalog(
        &catalog,
        &[
            ("SKU-A", 10, "19.99"),
            ("SKU-B", 5, "5.00"),
            ("SKU-C", 1, "7.50"),
        ],
    );
    let shop = serve(
        Router::new()
            .route("/products.json", get(catalog_page))
            .with_state(Arc::clone(&catalog)),
    )
    .await;
    let received: Received = Arc::default();
    let hooks = serve(
        Router::new()
            .route("/hook", post(receive))
            .with_state(Arc::clone(&received)),
    )
    .await;

    let monitor = monitor();
    let mut events = monitor.event_bus().subscribe();
    let Ok(store) = monitor
        .create_store(NewStore {
            name: "Stub shop".to_string(),
            url: format!("http://{shop}"),
            low_stock_threshold: Some(3),
            ..NewStore::default()
        })
        .await
    else {
        panic!("store should be created");
    };
    let Ok(webhook) = monitor
        .create_webhook(NewWebhook {
            store_id: Some(store.id),
            url: format!("http://{hooks}/hook"),
            events: Some(vec![AlertKind::LowStock, AlertKind::OutOfStock]),
            secret: Some("s3cret".to_string()),
        })
        .await
    else {
        panic!("webhook should be created");
    };

    // Baseline: three products across two pages, no alerts.
    let Ok(first) = monitor.trigger_scan(store.id).await else {
        panic!("scan should run");
    };
    assert!(first.success, "{:?}", first.error);
    assert_eq!(first.snapshot.as_ref().map(|s| s.len()), Some(3));
    assert!(first.alerts.is_empty());

    set_catalog(
        &catalog,
        &[
            ("SKU-A", 2, "19.99"),
            ("SKU-B", 0, "5.00"),
            ("SKU-C", 1, "8.00"),
        ],
    );
    let Ok(second) = monitor.trigger_scan(store.id).await else {
        panic!("scan should run");
    };
    assert!(second.success, "{:?}", second.error);
    assert_eq!(second.change_events.len(), 3);
    let kinds: Vec<AlertKind> = second.alerts.iter().map(|a| a.kind).collect();
    assert_eq!(kinds, vec![AlertKind::LowStock, AlertKind::OutOfStock]);

    let Ok(received) = received.lock().map(|r| r.clone()) else {
        panic!("poisoned");
    };
    assert_eq!(received.len(), 2);
    for (headers, body) in &received {
        let Ok(expected) = sign_payload("s3cret", body) else {
            panic!("signing failed");
        };
        assert_eq!(
            headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()),
            Some(expected.as_str())
        );
        let Ok(payload) = serde_json::from_slice::<Value>(body) else {
            panic!("body should be JSON");
        };
        assert_eq!(payload["store_id"], json!(store.id));
    }

    let Ok(webhook) = monitor.get_webhook(webhook.id).await else {
        panic!("webhook should exist");
    };
    assert_eq!(webhook.status, DeliveryStatus::Healthy);
    assert_eq!(webhook.trigger_count, 2);

    let Ok(history) = monitor.scan_history(store.id, None, None).await else {
        panic!("history should load");
    };
    assert_eq!(history.len(), 2);

    let mut completed = 0;
    let mut alerts = 0;
    while let Ok(event) = events.try_recv() {
        match event {
            MonitorEvent::ScanCompleted { .. } => completed += 1,
            MonitorEvent::AlertRaised { .. } => alerts += 1,
            _ => {}
        }
    }
    assert_eq!(completed, 2);
    assert_eq!(alerts, 2);
}

#[tokio::test]
async fn storefront_failure_keeps_previous_snapshot() {
    let catalog: Catalog = Arc::default();
    set_catalog(&catalog, &[("SKU-A", 4, "1.00")]);
    let healthy = Arc::new(std::sync::atomic::AtomicBool::new(true));
    let shop = {
        let healthy = Arc::clone(&healthy);
        let catalog = Arc::clone(&catalog);
        serve(Router::new().route(
            "/products.json",
            get(move |query: Query<HashMap<String, String>>| {
                let healthy = Arc::clone(&healthy);
                let catalog = Arc::clone(&catalog);
                async move {
                    if healthy.load(std::sync::atomic::Ordering::SeqCst) {
                        Ok(catalog_page(State(catalog), query).await)
                    } else {
                        Err(StatusCode::NOT_FOUND)
                    }
                }
            }),
        ))
        .await
    };

    let monitor = monitor();
    let Ok(store) = monitor
        .create_store(NewStore {
            name: "Flaky".to_string(),
            url: format!("http://{shop}"),
            ..NewStore::default()
        })
        .await
    else {
        panic!("store should be created");
    };

    let Ok(first) = monitor.trigger_scan(store.id).await else {
        panic!("scan should run");
    };
    assert!(first.success);

    healthy.store(false, std::sync::atomic::Ordering::SeqCst);
    let Ok(failed) = monitor.trigger_scan(store.id).await else {
        panic!("scan should run");
    };
    assert!(!failed.success);
    assert_eq!(failed.attempts, 1);

    let Ok(Some(current)) = monitor.current_inventory(store.id).await else {
        panic!("previous snapshot should remain");
    };
    assert_eq!(current.get("SKU-A").map(|p| p.quantity), Some(4));
}
