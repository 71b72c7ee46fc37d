//! Webhook registrations and their delivery state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AlertKind, StoreId, WebhookId};

/// Health of a registration, derived from its last delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Nothing has been sent yet.
    NeverDelivered,
    /// The last delivery succeeded.
    Healthy,
    /// The last delivery exhausted its retries.
    Failing,
}

impl DeliveryStatus {
    /// Returns the status as a static string slice.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NeverDelivered => "never_delivered",
            Self::Healthy => "healthy",
            Self::Failing => "failing",
        }
    }

    /// Parses the storage representation, defaulting to `NeverDelivered`.
    #[must_use]
    pub fn from_str_lossy(value: &str) -> Self {
        match value {
            "healthy" => Self::Healthy,
            "failing" => Self::Failing,
            _ => Self::NeverDelivered,
        }
    }
}

/// A webhook endpoint subscribed to alerts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookRegistration {
    /// Registration identifier.
    pub id: WebhookId,
    /// Store scope. `None` receives alerts from every store.
    pub store_id: Option<StoreId>,
    /// Target URL receiving `POST` requests.
    pub url: String,
    /// Alert kinds this endpoint wants.
    pub events: Vec<AlertKind>,
    /// Inactive registrations are skipped.
    pub active: bool,
    /// Shared secret for the `X-Webhook-Signature` header.
    #[serde(skip_serializing)]
    pub secret: Option<String>,
    /// Outcome of the last delivery.
    pub status: DeliveryStatus,
    /// Number of successful deliveries.
    pub trigger_count: u64,
    /// Time of the last delivery attempt.
    pub last_triggered_at: Option<DateTime<Utc>>,
    /// Error of the last failed delivery.
    pub last_error: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl WebhookRegistration {
    /// Creates an active registration listening for low-stock and
    /// out-of-stock alerts.
    #[must_use]
    pub fn new(store_id: Option<StoreId>, url: impl Into<String>) -> Self {
        Self {
            id: WebhookId::new(),
            store_id,
            url: url.into(),
            events: default_events(),
            active: true,
            secret: None,
            status: DeliveryStatus::NeverDelivered,
            trigger_count: 0,
            last_triggered_at: None,
            last_error: None,
            created_at: Utc::now(),
        }
    }

    /// Returns `true` if this registration should receive `kind` alerts
    /// raised for `store_id`.
    #[must_use]
    pub fn accepts(&self, store_id: StoreId, kind: AlertKind) -> bool {
        self.active
            && self.store_id.is_none_or(|scope| scope == store_id)
            && self.events.contains(&kind)
    }

    /// Folds a delivery outcome into the registration's stats.
    pub fn record_outcome(&mut self, outcome: &DeliveryOutcome) {
        self.last_triggered_at = Some(outcome.at);
        match &outcome.error {
            None => {
                self.status = DeliveryStatus::Healthy;
                self.trigger_count = self.trigger_count.saturating_add(1);
                self.last_error = None;
            }
            Some(err) => {
                self.status = DeliveryStatus::Failing;
                self.last_error = Some(err.clone());
            }
        }
    }
}

/// Final outcome of delivering one alert to one registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryOutcome {
    /// When the last attempt finished.
    pub at: DateTime<Utc>,
    /// Attempts made, including the first.
    pub attempts: u32,
    /// Last error, `None` on success.
    pub error: Option<String>,
}

/// Default alert kinds for a new registration.
#[must_use]
pub fn default_events() -> Vec<AlertKind> {
    vec![AlertKind::LowStock, AlertKind::OutOfStock]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_respects_scope_events_and_active() {
        let store = StoreId::new();
        let mut hook = WebhookRegistration::new(Some(store), "https://hooks.example.com");
        assert!(hook.accepts(store, AlertKind::LowStock));
        assert!(!hook.accepts(store, AlertKind::BackInStock));
        assert!(!hook.accepts(StoreId::new(), AlertKind::LowStock));

        hook.active = false;
        assert!(!hook.accepts(store, AlertKind::LowStock));
    }

    #[test]
    fn global_registration_accepts_any_store() {
        let hook = WebhookRegistration::new(None, "https://hooks.example.com");
        assert!(hook.accepts(StoreId::new(), AlertKind::OutOfStock));
    }

    #[test]
    fn record_outcome_tracks_health() {
        let mut hook = WebhookRegistration::new(None, "https://hooks.example.com");
        assert_eq!(hook.status, DeliveryStatus::NeverDelivered);

        hook.record_outcome(&DeliveryOutcome {
            at: Utc::now(),
            attempts: 3,
            error: Some("HTTP 500".to_string()),
        });
        assert_eq!(hook.status, DeliveryStatus::Failing);
        assert_eq!(hook.trigger_count, 0);
        assert_eq!(hook.last_error.as_deref(), Some("HTTP 500"));

        hook.record_outcome(&DeliveryOutcome {
            at: Utc::now(),
            attempts: 1,
            error: None,
        });
        assert_eq!(hook.status, DeliveryStatus::Healthy);
        assert_eq!(hook.trigger_count, 1);
        assert!(hook.last_error.is_none());
    }

    #[test]
    fn status_round_trips_through_storage_strings() {
        for status in [
            DeliveryStatus::NeverDelivered,
            DeliveryStatus::Healthy,
            DeliveryStatus::Failing,
        ] {
            assert_eq!(DeliveryStatus::from_str_lossy(status.as_str()), status);
        }
    }
}
