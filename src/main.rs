//! stockwatch server entry point.
//!
//! Wires storage, the scanning engine and the operator API, then serves
//! until Ctrl+C.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use stockwatch::api;
use stockwatch::app_state::AppState;
use stockwatch::config::MonitorConfig;
use stockwatch::domain::EventBus;
use stockwatch::engine::{
    NotificationDispatcher, ScanOrchestrator, ScanScheduler, ScanSettings, ScanStorage,
};
use stockwatch::fetch::{Fetcher, HttpFetcher};
use stockwatch::notify::{HttpWebhookSender, WebhookSender};
use stockwatch::persistence::{
    AlertLog, MemoryAlertLog, MemoryScanHistory, MemorySnapshotStore, MemoryStockHistory,
    MemoryStoreRepository, MemoryWebhookRepository, PostgresPersistence, ScanHistory,
    SnapshotStore, StockHistory, StoreRepository, WebhookRepository,
};
use stockwatch::service::{MonitorService, MonitorSettings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = MonitorConfig::from_env()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    tracing::info!(addr = %config.listen_addr, "starting stockwatch");

    // Build persistence layer
    let storage = build_storage(&config).await?;

    // Build engine
    let event_bus = EventBus::new(config.event_bus_capacity);
    let fetcher = HttpFetcher::new(config.fetch_timeout, &config.fetch_user_agent)
        .context("failed to build storefront client")?;
    let sender =
        HttpWebhookSender::new(config.webhook_timeout).context("failed to build webhook client")?;
    let dispatcher = NotificationDispatcher::new(
        Arc::new(sender) as Arc<dyn WebhookSender>,
        Arc::clone(&storage.webhooks),
        config.delivery.clone(),
    );
    let orchestrator = Arc::new(ScanOrchestrator::new(
        Arc::new(fetcher) as Arc<dyn Fetcher>,
        storage.clone(),
        dispatcher,
        event_bus,
        ScanSettings {
            retry: config.retry.clone(),
            fetch_timeout: config.fetch_timeout,
            page_limit: config.fetch_page_limit,
        },
    ));
    let scheduler = ScanScheduler::new(Arc::clone(&orchestrator));

    // Build service layer
    let monitor = Arc::new(MonitorService::new(
        storage,
        orchestrator,
        scheduler,
        MonitorSettings::from(&config),
    ));
    monitor
        .start()
        .await
        .context("failed to load stores for scheduling")?;
    let retention = monitor.spawn_retention(Duration::from_secs(config.cleanup_interval_secs));

    // Build router
    let app = Router::new()
        .merge(api::build_router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(AppState::new(Arc::clone(&monitor)));

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shutting down");
    retention.abort();
    monitor.shutdown().await;
    Ok(())
}

/// PostgreSQL when `DATABASE_URL` is set, in-memory otherwise.
async fn build_storage(config: &MonitorConfig) -> anyhow::Result<ScanStorage> {
    let Some(url) = config.database_url.as_deref() else {
        tracing::warn!("DATABASE_URL not set; state is kept in memory only");
        return Ok(ScanStorage {
            snapshots: Arc::new(MemorySnapshotStore::new()) as Arc<dyn SnapshotStore>,
            history: Arc::new(MemoryScanHistory::new()) as Arc<dyn ScanHistory>,
            stores: Arc::new(MemoryStoreRepository::new()) as Arc<dyn StoreRepository>,
            webhooks: Arc::new(MemoryWebhookRepository::new()) as Arc<dyn WebhookRepository>,
            alerts: Arc::new(MemoryAlertLog::new()) as Arc<dyn AlertLog>,
            stock: Arc::new(MemoryStockHistory::new()) as Arc<dyn StockHistory>,
        });
    };

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
        .connect(url)
        .await
        .context("failed to connect to PostgreSQL")?;
    let pg = Arc::new(PostgresPersistence::new(pool));
    pg.migrate().await.context("failed to run migrations")?;
    tracing::info!("connected to PostgreSQL");

    Ok(ScanStorage {
        snapshots: Arc::clone(&pg) as Arc<dyn SnapshotStore>,
        history: Arc::clone(&pg) as Arc<dyn ScanHistory>,
        stores: Arc::clone(&pg) as Arc<dyn StoreRepository>,
        webhooks: Arc::clone(&pg) as Arc<dyn WebhookRepository>,
        alerts: Arc::clone(&pg) as Arc<dyn AlertLog>,
        stock: pg as Arc<dyn StockHistory>,
    })
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for Ctrl+C");
    }
}
