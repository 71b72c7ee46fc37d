//! Store CRUD handlers plus inventory and scheduling status.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{
    CreateStoreRequest, InventoryResponse, PaginationParams, StoreDto, StoreListResponse,
};
use crate::app_state::AppState;
use crate::domain::{StoreId, StoreUpdate};
use crate::error::MonitorError;

/// `POST /stores` — Start monitoring a storefront.
///
/// # Errors
///
/// Returns [`MonitorError::InvalidRequest`] on invalid input.
pub async fn create_store(
    State(state): State<AppState>,
    Json(req): Json<CreateStoreRequest>,
) -> Result<impl IntoResponse, MonitorError> {
    let store = state.monitor.create_store(req.into()).await?;
    Ok((StatusCode::CREATED, Json(StoreDto::from(store))))
}

/// `GET /stores` — List monitored stores, oldest first.
///
/// # Errors
///
/// Returns [`MonitorError`] on storage failure.
pub async fn list_stores(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> Result<impl IntoResponse, MonitorError> {
    let stores = state.monitor.list_stores().await?;
    let (page, pagination) = params.paginate(stores);
    Ok(Json(StoreListResponse {
        data: page.into_iter().map(StoreDto::from).collect(),
        pagination,
    }))
}

/// `GET /stores/{id}` — Get one store.
///
/// # Errors
///
/// Returns [`MonitorError::StoreNotFound`] if the store does not exist.
pub async fn get_store(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, MonitorError> {
    let store = state.monitor.get_store(StoreId::from_uuid(id)).await?;
    Ok(Json(StoreDto::from(store)))
}

/// `PATCH /stores/{id}` — Change a store's settings.
///
/// # Errors
///
/// Returns [`MonitorError::StoreNotFound`] or
/// [`MonitorError::InvalidRequest`].
pub async fn update_store(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    Json(update): Json<StoreUpdate>,
) -> Result<impl IntoResponse, MonitorError> {
    let store = state
        .monitor
        .update_store(StoreId::from_uuid(id), update)
        .await?;
    Ok(Json(StoreDto::from(store)))
}

/// `DELETE /stores/{id}` — Stop monitoring a store.
///
/// # Errors
///
/// Returns [`MonitorError::StoreNotFound`] if the store does not exist.
pub async fn delete_store(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, MonitorError> {
    state.monitor.delete_store(StoreId::from_uuid(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /stores/{id}/inventory` — Current snapshot.
///
/// # Errors
///
/// Returns [`MonitorError::StoreNotFound`] if the store does not exist.
pub async fn get_inventory(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, MonitorError> {
    let store_id = StoreId::from_uuid(id);
    let snapshot = state.monitor.current_inventory(store_id).await?;
    Ok(Json(InventoryResponse::new(store_id, snapshot.as_deref())))
}

/// `GET /stores/{id}/status` — Timer state and scan counters.
///
/// # Errors
///
/// Returns [`MonitorError::StoreNotFound`] if the store does not exist.
pub async fn get_status(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, MonitorError> {
    let status = state.monitor.scan_status(StoreId::from_uuid(id)).await?;
    Ok(Json(status))
}

/// Store management routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/stores", post(create_store).get(list_stores))
        .route(
            "/stores/{id}",
            get(get_store).patch(update_store).delete(delete_store),
        )
        .route("/stores/{id}/inventory", get(get_inventory))
        .route("/stores/{id}/status", get(get_status))
}
