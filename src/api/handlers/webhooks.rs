//! Webhook registration handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{
    CreateWebhookRequest, UpdateWebhookRequest, WebhookDto, WebhookListParams,
    WebhookListResponse,
};
use crate::app_state::AppState;
use crate::domain::WebhookId;
use crate::error::MonitorError;

/// `POST /webhooks` — Register an endpoint.
///
/// # Errors
///
/// Returns [`MonitorError::InvalidRequest`] or
/// [`MonitorError::StoreNotFound`] for an unknown scope.
pub async fn create_webhook(
    State(state): State<AppState>,
    Json(req): Json<CreateWebhookRequest>,
) -> Result<impl IntoResponse, MonitorError> {
    let webhook = state.monitor.create_webhook(req.into()).await?;
    Ok((StatusCode::CREATED, Json(WebhookDto::from(webhook))))
}

/// `GET /webhooks?store_id=` — List registrations.
///
/// # Errors
///
/// Returns [`MonitorError`] on storage failure.
pub async fn list_webhooks(
    State(state): State<AppState>,
    Query(params): Query<WebhookListParams>,
) -> Result<impl IntoResponse, MonitorError> {
    let webhooks = state.monitor.list_webhooks(params.store_id).await?;
    Ok(Json(WebhookListResponse {
        data: webhooks.into_iter().map(WebhookDto::from).collect(),
    }))
}

/// `GET /webhooks/{id}`
///
/// # Errors
///
/// Returns [`MonitorError::WebhookNotFound`].
pub async fn get_webhook(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, MonitorError> {
    let webhook = state.monitor.get_webhook(WebhookId::from_uuid(id)).await?;
    Ok(Json(WebhookDto::from(webhook)))
}

/// `PATCH /webhooks/{id}`
///
/// # Errors
///
/// Returns [`MonitorError::WebhookNotFound`] or
/// [`MonitorError::InvalidRequest`].
pub async fn update_webhook(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    Json(req): Json<UpdateWebhookRequest>,
) -> Result<impl IntoResponse, MonitorError> {
    let webhook = state
        .monitor
        .update_webhook(WebhookId::from_uuid(id), req.into())
        .await?;
    Ok(Json(WebhookDto::from(webhook)))
}

/// `DELETE /webhooks/{id}`
///
/// # Errors
///
/// Returns [`MonitorError::WebhookNotFound`].
pub async fn delete_webhook(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, MonitorError> {
    state
        .monitor
        .delete_webhook(WebhookId::from_uuid(id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /webhooks/{id}/test` — Send a single `test` event.
///
/// # Errors
///
/// Returns [`MonitorError::WebhookNotFound`].
pub async fn test_webhook(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, MonitorError> {
    let report = state.monitor.test_webhook(WebhookId::from_uuid(id)).await?;
    Ok(Json(report))
}

/// Webhook routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/webhooks", post(create_webhook).get(list_webhooks))
        .route(
            "/webhooks/{id}",
            get(get_webhook)
                .patch(update_webhook)
                .delete(delete_webhook),
        )
        .route("/webhooks/{id}/test", post(test_webhook))
}
