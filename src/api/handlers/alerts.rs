//! Alert log and stock report handlers.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, patch};
use axum::{Json, Router};

use crate::api::dto::{
    AlertListParams, AlertListResponse, LowStockParams, LowStockResponse, StockChangeParams,
    StockChangeResponse, StockHistoryParams, StockHistoryResponse,
};
use crate::app_state::AppState;
use crate::domain::{AlertId, StoreId};
use crate::error::MonitorError;
use crate::service::monitor_service::{DEFAULT_STOCK_CHANGE_HOURS, DEFAULT_STOCK_HISTORY_DAYS};

/// `GET /alerts?store_id=&kind=&resolved=&offset=&limit=` — Logged alerts,
/// newest first.
///
/// # Errors
///
/// Returns [`MonitorError::InvalidRequest`] for a limit above 1000.
pub async fn list_alerts(
    State(state): State<AppState>,
    Query(params): Query<AlertListParams>,
) -> Result<impl IntoResponse, MonitorError> {
    let data = state
        .monitor
        .list_alerts(params.filter(), params.offset, params.limit)
        .await?;
    Ok(Json(AlertListResponse {
        data,
        offset: params.offset,
    }))
}

/// `PATCH /alerts/{id}/resolve`
///
/// # Errors
///
/// Returns [`MonitorError::AlertNotFound`].
pub async fn resolve_alert(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, MonitorError> {
    let alert = state.monitor.resolve_alert(AlertId::from_uuid(id)).await?;
    Ok(Json(alert))
}

/// `GET /low-stock?threshold=` — In-stock items at or below threshold
/// across all stores.
///
/// # Errors
///
/// Returns [`MonitorError`] on storage failure.
pub async fn low_stock(
    State(state): State<AppState>,
    Query(params): Query<LowStockParams>,
) -> Result<impl IntoResponse, MonitorError> {
    let data = state.monitor.low_stock_items(params.threshold).await?;
    Ok(Json(LowStockResponse {
        threshold: params.threshold,
        data,
    }))
}

/// `GET /stores/{id}/stock-history?sku=&variant_id=&days=`
///
/// # Errors
///
/// Returns [`MonitorError::InvalidRequest`] for `days` outside 1..=90, or
/// [`MonitorError::StoreNotFound`].
pub async fn stock_history(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    Query(params): Query<StockHistoryParams>,
) -> Result<impl IntoResponse, MonitorError> {
    let store_id = StoreId::from_uuid(id);
    let data = state
        .monitor
        .inventory_history(store_id, params.filter(), params.days)
        .await?;
    Ok(Json(StockHistoryResponse {
        store_id,
        days: params.days.unwrap_or(DEFAULT_STOCK_HISTORY_DAYS),
        data,
    }))
}

/// `GET /stores/{id}/stock-changes?hours=`
///
/// # Errors
///
/// Returns [`MonitorError::InvalidRequest`] for `hours` outside 1..=168,
/// or [`MonitorError::StoreNotFound`].
pub async fn stock_changes(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    Query(params): Query<StockChangeParams>,
) -> Result<impl IntoResponse, MonitorError> {
    let store_id = StoreId::from_uuid(id);
    let data = state.monitor.stock_changes(store_id, params.hours).await?;
    Ok(Json(StockChangeResponse {
        store_id,
        hours: params.hours.unwrap_or(DEFAULT_STOCK_CHANGE_HOURS),
        data,
    }))
}

/// Alert and stock report routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/alerts", get(list_alerts))
        .route("/alerts/{id}/resolve", patch(resolve_alert))
        .route("/low-stock", get(low_stock))
        .route("/stores/{id}/stock-history", get(stock_history))
        .route("/stores/{id}/stock-changes", get(stock_changes))
}
