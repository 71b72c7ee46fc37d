//! Notification dispatcher: delivers alerts to webhook registrations.
//!
//! Each matching registration is delivered to independently and in
//! parallel. Within one registration the alerts of a scan go out in order.
//! Every alert gets up to `1 + max_retries` attempts spaced by a fixed
//! interval; once they are exhausted the registration is marked failing
//! and the rest of the scan's alerts are reported as not attempted for it.
//! A dead endpoint therefore costs a scan at most one retry budget, and
//! never delays its siblings.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::Serialize;
use tracing::{debug, error, warn};

use super::DeliveryPolicy;
use crate::domain::{
    Alert, AlertId, AlertKind, DeliveryOutcome, StoreId, WebhookId, WebhookRegistration,
};
use crate::error::DeliveryError;
use crate::notify::{WebhookRequest, WebhookSender};
use crate::persistence::WebhookRepository;

/// Event name used for test deliveries.
pub const TEST_EVENT: &str = "test";

/// Report error for alerts skipped after their endpoint exhausted its
/// retries earlier in the same batch.
pub const NOT_ATTEMPTED: &str = "not attempted: endpoint failed earlier in this batch";

/// Final outcome of delivering one alert to one registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    /// Target registration.
    pub webhook_id: WebhookId,
    /// Delivered alert; `None` for test deliveries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert_id: Option<AlertId>,
    /// Whether some attempt succeeded.
    pub delivered: bool,
    /// Attempts made.
    pub attempts: u32,
    /// Error of the last failed attempt, when not delivered.
    pub error: Option<String>,
}

/// Fans alerts out to webhook registrations.
#[derive(Debug, Clone)]
pub struct NotificationDispatcher {
    sender: Arc<dyn WebhookSender>,
    webhooks: Arc<dyn WebhookRepository>,
    policy: DeliveryPolicy,
}

impl NotificationDispatcher {
    /// Creates a dispatcher writing delivery stats back to `webhooks`.
    #[must_use]
    pub fn new(
        sender: Arc<dyn WebhookSender>,
        webhooks: Arc<dyn WebhookRepository>,
        policy: DeliveryPolicy,
    ) -> Self {
        Self {
            sender,
            webhooks,
            policy,
        }
    }

    /// Delivers `alert` to every registration in `registrations` that
    /// accepts it, returning one report per targeted registration.
    ///
    /// Registrations that are inactive, scoped to another store or not
    /// subscribed to the alert kind are skipped and get no report.
    pub async fn deliver(
        &self,
        alert: &Alert,
        registrations: &[WebhookRegistration],
    ) -> Vec<DeliveryReport> {
        self.deliver_all(std::slice::from_ref(alert), registrations)
            .await
    }

    /// Delivers a batch of alerts, one lane per registration.
    ///
    /// Lanes run in parallel; each sends the alerts it accepts in batch
    /// order. Once a lane exhausts its retries on one alert, its remaining
    /// alerts are reported with zero attempts and [`NOT_ATTEMPTED`].
    /// Reports are grouped by registration, in registration order, then
    /// by alert.
    pub async fn deliver_all(
        &self,
        alerts: &[Alert],
        registrations: &[WebhookRegistration],
    ) -> Vec<DeliveryReport> {
        let bodies: Vec<Result<Vec<u8>, DeliveryError>> = alerts.iter().map(alert_body).collect();
        let lanes = registrations
            .iter()
            .filter(|r| alerts.iter().any(|a| r.accepts(a.store_id, a.kind)))
            .map(|registration| self.deliver_lane(registration, alerts, &bodies));
        join_all(lanes).await.into_iter().flatten().collect()
    }

    async fn deliver_lane(
        &self,
        registration: &WebhookRegistration,
        alerts: &[Alert],
        bodies: &[Result<Vec<u8>, DeliveryError>],
    ) -> Vec<DeliveryReport> {
        let mut reports = Vec::new();
        let mut exhausted = false;
        let mut skipped = 0usize;

        for (alert, body) in alerts.iter().zip(bodies) {
            if !registration.accepts(alert.store_id, alert.kind) {
                continue;
            }
            if exhausted {
                skipped += 1;
                reports.push(DeliveryReport {
                    webhook_id: registration.id,
                    alert_id: Some(alert.id),
                    delivered: false,
                    attempts: 0,
                    error: Some(NOT_ATTEMPTED.to_string()),
                });
                continue;
            }
            let body = match body {
                Ok(body) => body.clone(),
                Err(err) => {
                    error!(alert_id = %alert.id, error = %err, "failed to encode alert payload");
                    reports.push(DeliveryReport {
                        webhook_id: registration.id,
                        alert_id: Some(alert.id),
                        delivered: false,
                        attempts: 0,
                        error: Some(err.to_string()),
                    });
                    continue;
                }
            };
            let request = WebhookRequest {
                url: registration.url.clone(),
                event: alert.kind.as_str().to_string(),
                idempotency_key: alert.dedup_key(),
                body,
                secret: registration.secret.clone(),
            };
            let report = self
                .deliver_with_retry(registration.id, Some(alert.id), request)
                .await;
            exhausted = !report.delivered;
            reports.push(report);
        }

        if skipped > 0 {
            warn!(
                webhook_id = %registration.id,
                skipped,
                "endpoint exhausted its retries; remaining alerts not attempted"
            );
        }
        reports
    }

    /// Sends a single `test` event to `registration`, without retries and
    /// without touching its delivery stats.
    pub async fn send_test(&self, registration: &WebhookRegistration) -> DeliveryReport {
        let body = serde_json::json!({
            "event": TEST_EVENT,
            "webhook_id": registration.id,
            "store_id": registration.store_id,
            "message": "stockwatch test delivery",
            "delivered_at": Utc::now(),
        });
        let request = WebhookRequest {
            url: registration.url.clone(),
            event: TEST_EVENT.to_string(),
            idempotency_key: format!(
                "{}:{TEST_EVENT}:{}",
                registration.id,
                Utc::now().timestamp_millis()
            ),
            body: body.to_string().into_bytes(),
            secret: registration.secret.clone(),
        };
        let result = self.sender.send(&request).await;
        DeliveryReport {
            webhook_id: registration.id,
            alert_id: None,
            delivered: result.is_ok(),
            attempts: 1,
            error: result.err().map(|e| e.to_string()),
        }
    }

    async fn deliver_with_retry(
        &self,
        webhook_id: WebhookId,
        alert_id: Option<AlertId>,
        request: WebhookRequest,
    ) -> DeliveryReport {
        let max_attempts = self.policy.max_attempts();
        let mut attempts = 0;
        let mut last_error: Option<DeliveryError> = None;

        while attempts < max_attempts {
            if attempts > 0 {
                tokio::time::sleep(self.policy.spacing).await;
            }
            attempts += 1;
            match self.sender.send(&request).await {
                Ok(()) => {
                    debug!(webhook_id = %webhook_id, attempts, "webhook delivered");
                    last_error = None;
                    break;
                }
                Err(err) => {
                    warn!(
                        webhook_id = %webhook_id,
                        attempt = attempts,
                        max_attempts,
                        error = %err,
                        "webhook delivery attempt failed"
                    );
                    last_error = Some(err);
                }
            }
        }

        let error = last_error.map(|e| e.to_string());
        if let Some(err) = &error {
            error!(
                webhook_id = %webhook_id,
                attempts,
                error = %err,
                "webhook retries exhausted; registration marked failing"
            );
        }

        let outcome = DeliveryOutcome {
            at: Utc::now(),
            attempts,
            error: error.clone(),
        };
        if let Err(err) = self.webhooks.record_delivery(webhook_id, &outcome).await {
            error!(webhook_id = %webhook_id, error = %err, "failed to record webhook delivery");
        }

        DeliveryReport {
            webhook_id,
            alert_id,
            delivered: error.is_none(),
            attempts,
            error,
        }
    }
}

/// JSON body sent for an alert.
#[derive(Debug, Serialize)]
struct AlertPayload<'a> {
    event: AlertKind,
    alert: &'a Alert,
    store_id: StoreId,
    delivered_at: DateTime<Utc>,
}

fn alert_body(alert: &Alert) -> Result<Vec<u8>, DeliveryError> {
    let payload = AlertPayload {
        event: alert.kind,
        alert,
        store_id: alert.store_id,
        delivered_at: Utc::now(),
    };
    serde_json::to_vec(&payload).map_err(|e| DeliveryError::Encoding(e.to_string()))
}
