//! Webhook DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{AlertKind, DeliveryStatus, StoreId, WebhookId, WebhookRegistration};
use crate::service::{NewWebhook, WebhookUpdate};

/// Request body for `POST /webhooks`.
#[derive(Debug, Deserialize)]
pub struct CreateWebhookRequest {
    /// Store scope; omit for a global registration.
    #[serde(default)]
    pub store_id: Option<StoreId>,
    /// Target URL.
    pub url: String,
    /// Alert kinds to receive.
    #[serde(default)]
    pub events: Option<Vec<AlertKind>>,
    /// HMAC secret.
    #[serde(default)]
    pub secret: Option<String>,
}

impl From<CreateWebhookRequest> for NewWebhook {
    fn from(req: CreateWebhookRequest) -> Self {
        Self {
            store_id: req.store_id,
            url: req.url,
            events: req.events,
            secret: req.secret,
        }
    }
}

/// Request body for `PATCH /webhooks/{id}`.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateWebhookRequest {
    /// New target URL.
    #[serde(default)]
    pub url: Option<String>,
    /// New alert kind filter.
    #[serde(default)]
    pub events: Option<Vec<AlertKind>>,
    /// Activate or deactivate.
    #[serde(default)]
    pub active: Option<bool>,
    /// New secret; an empty string removes it.
    #[serde(default)]
    pub secret: Option<String>,
}

impl From<UpdateWebhookRequest> for WebhookUpdate {
    fn from(req: UpdateWebhookRequest) -> Self {
        Self {
            url: req.url,
            events: req.events,
            active: req.active,
            secret: req.secret.map(|s| Some(s).filter(|s| !s.is_empty())),
        }
    }
}

/// Query parameters for `GET /webhooks`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookListParams {
    /// Only registrations receiving this store's alerts.
    #[serde(default)]
    pub store_id: Option<StoreId>,
}

/// A registration as returned by the API. The secret is never echoed.
#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookDto {
    /// Registration identifier.
    pub webhook_id: WebhookId,
    /// Store scope.
    pub store_id: Option<StoreId>,
    /// Target URL.
    pub url: String,
    /// Alert kinds received.
    pub events: Vec<AlertKind>,
    /// Whether deliveries are made.
    pub active: bool,
    /// Whether payloads are signed.
    pub signed: bool,
    /// Outcome of the last delivery.
    pub status: DeliveryStatus,
    /// Successful deliveries.
    pub trigger_count: u64,
    /// Last delivery attempt.
    pub last_triggered_at: Option<DateTime<Utc>>,
    /// Last delivery error.
    pub last_error: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl From<WebhookRegistration> for WebhookDto {
    fn from(webhook: WebhookRegistration) -> Self {
        Self {
            webhook_id: webhook.id,
            store_id: webhook.store_id,
            url: webhook.url,
            events: webhook.events,
            active: webhook.active,
            signed: webhook.secret.is_some(),
            status: webhook.status,
            trigger_count: webhook.trigger_count,
            last_triggered_at: webhook.last_triggered_at,
            last_error: webhook.last_error,
            created_at: webhook.created_at,
        }
    }
}

/// List response for `GET /webhooks`.
#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookListResponse {
    /// Registrations.
    pub data: Vec<WebhookDto>,
}
