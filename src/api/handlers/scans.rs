//! Manual scan trigger and scan history handlers.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{ScanHistoryParams, ScanHistoryResponse, ScanResponse};
use crate::app_state::AppState;
use crate::domain::StoreId;
use crate::error::MonitorError;

/// `POST /stores/{id}/scan` — Scan now and wait for the result.
///
/// # Errors
///
/// Returns [`MonitorError::ScanBusy`] (409) while a scan of the store is
/// running, or [`MonitorError::StoreNotFound`].
pub async fn trigger_scan(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, MonitorError> {
    let result = state.monitor.trigger_scan(StoreId::from_uuid(id)).await?;
    Ok(Json(ScanResponse::from(result)))
}

/// `GET /stores/{id}/scans?from=&to=` — Scan history in a time range.
///
/// # Errors
///
/// Returns [`MonitorError::InvalidRequest`] for an inverted range, or
/// [`MonitorError::StoreNotFound`].
pub async fn scan_history(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    Query(params): Query<ScanHistoryParams>,
) -> Result<impl IntoResponse, MonitorError> {
    let store_id = StoreId::from_uuid(id);
    let data = state
        .monitor
        .scan_history(store_id, params.from, params.to)
        .await?;
    Ok(Json(ScanHistoryResponse { store_id, data }))
}

/// Scan routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/stores/{id}/scan", post(trigger_scan))
        .route("/stores/{id}/scans", get(scan_history))
}
