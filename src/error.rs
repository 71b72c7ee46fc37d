//! Error types for every boundary of the monitor.
//!
//! Engine-internal errors ([`FetchError`], [`ScanError`], [`DeliveryError`],
//! [`PersistenceError`]) never cross a component boundary as an `Err`: the
//! orchestrator folds them into a failed `ScanResult` and the dispatcher into
//! per-registration reports. [`MonitorError`] is the service-level error and
//! maps to an HTTP status code and structured JSON error response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::domain::{AlertId, StoreId, WebhookId};

/// Fetch failure, classified by whether retrying can help.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Network timeout, 5xx, rate limiting. Worth retrying.
    #[error("transient fetch error: {0}")]
    Transient(String),

    /// 404, malformed URL, explicit block. Never retried.
    #[error("permanent fetch error: {0}")]
    Permanent(String),
}

impl FetchError {
    /// Returns `true` if the failure may succeed on retry.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Storage failure reported by a repository.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("persistence error: {0}")]
pub struct PersistenceError(pub String);

impl From<sqlx::Error> for PersistenceError {
    fn from(err: sqlx::Error) -> Self {
        Self(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for PersistenceError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Self(err.to_string())
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(err: serde_json::Error) -> Self {
        Self(err.to_string())
    }
}

/// Terminal failure of one scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ScanError {
    /// Transient fetch failures exhausted every attempt.
    #[error("transient fetch error after {attempts} attempts: {message}")]
    TransientFetch {
        /// Attempts made.
        attempts: u32,
        /// Last failure.
        message: String,
    },

    /// The fetch failed in a way retrying cannot fix.
    #[error("permanent fetch error: {0}")]
    PermanentFetch(String),

    /// The storefront payload could not be turned into a snapshot.
    #[error("parse error: {0}")]
    Parse(String),

    /// Loading or replacing the snapshot failed. The prior snapshot is kept.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// The store was unregistered while the scan ran; the result was
    /// discarded.
    #[error("scan cancelled: store unregistered")]
    Cancelled,

    /// The scan task ended abnormally.
    #[error("scan aborted: {0}")]
    Aborted(String),
}

impl From<PersistenceError> for ScanError {
    fn from(err: PersistenceError) -> Self {
        Self::Persistence(err.0)
    }
}

/// Failure delivering one webhook request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// Connection, timeout or TLS failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The endpoint answered with a non-success status.
    #[error("endpoint returned HTTP {0}")]
    Status(u16),

    /// The payload could not be signed.
    #[error("signing error: {0}")]
    Signing(String),

    /// The payload could not be encoded.
    #[error("encoding error: {0}")]
    Encoding(String),
}

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2001,
///     "message": "store not found: 3f1c...",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub details: Option<String>,
}

/// Service-level error with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category        | HTTP Status                  |
/// |-----------|-----------------|------------------------------|
/// | 1000–1999 | Validation      | 400 Bad Request              |
/// | 2000–2999 | State/Not Found | 404 Not Found / 409 Conflict |
/// | 3000–3999 | Server          | 500 Internal Server Error    |
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// Store with the given ID was not found (or was deleted).
    #[error("store not found: {0}")]
    StoreNotFound(StoreId),

    /// Webhook registration with the given ID was not found.
    #[error("webhook not found: {0}")]
    WebhookNotFound(WebhookId),

    /// Logged alert with the given ID was not found.
    #[error("alert not found: {0}")]
    AlertNotFound(AlertId),

    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A scan for the store is already in flight.
    #[error("scan already running for store {0}")]
    ScanBusy(StoreId),

    /// Persistence layer failure.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl MonitorError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::StoreNotFound(_) => 2001,
            Self::WebhookNotFound(_) => 2002,
            Self::ScanBusy(_) => 2003,
            Self::AlertNotFound(_) => 2004,
            Self::Internal(_) => 3000,
            Self::Persistence(_) => 3001,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::StoreNotFound(_) | Self::WebhookNotFound(_) | Self::AlertNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            Self::ScanBusy(_) => StatusCode::CONFLICT,
            Self::Persistence(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for MonitorError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
