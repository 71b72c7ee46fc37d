//! Webhook transport.
//!
//! [`WebhookSender`] performs exactly one delivery attempt. Retry spacing and
//! registration bookkeeping live in the engine's dispatcher.

pub mod http;

use std::fmt::Debug;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::DeliveryError;

pub use http::HttpWebhookSender;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the hex HMAC-SHA256 of the body.
pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";
/// Header carrying the alert kind (or `test`).
pub const EVENT_HEADER: &str = "X-Webhook-Event";
/// Header carrying the alert dedup key.
pub const IDEMPOTENCY_HEADER: &str = "X-Idempotency-Key";

/// One webhook request, ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookRequest {
    /// Target URL.
    pub url: String,
    /// Event name sent in [`EVENT_HEADER`].
    pub event: String,
    /// Dedup key sent in [`IDEMPOTENCY_HEADER`].
    pub idempotency_key: String,
    /// JSON body.
    pub body: Vec<u8>,
    /// Signing secret, if the registration has one.
    pub secret: Option<String>,
}

/// Single-attempt webhook transport.
#[async_trait]
pub trait WebhookSender: Send + Sync + Debug {
    /// Sends `request` once.
    ///
    /// # Errors
    ///
    /// Returns a [`DeliveryError`] on transport failure, a non-2xx status,
    /// or a signing failure.
    async fn send(&self, request: &WebhookRequest) -> Result<(), DeliveryError>;
}

/// Hex-encoded HMAC-SHA256 of `body` under `secret`.
///
/// # Errors
///
/// Returns [`DeliveryError::Signing`] if the key is rejected by the MAC.
pub fn sign_payload(secret: &str, body: &[u8]) -> Result<String, DeliveryError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| DeliveryError::Signing(e.to_string()))?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn signature_matches_known_vector() {
        // RFC 4231 test case 2.
        let Ok(sig) = sign_payload("Jefe", b"what do ya want for nothing?") else {
            panic!("signing failed");
        };
        assert_eq!(
            sig,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn signature_depends_on_secret() {
        let Ok(a) = sign_payload("one", b"{}") else {
            panic!("signing failed");
        };
        let Ok(b) = sign_payload("two", b"{}") else {
            panic!("signing failed");
        };
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
    }
}
