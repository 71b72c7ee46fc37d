//! `reqwest`-backed [`WebhookSender`].

use std::time::Duration;

use async_trait::async_trait;

use super::{
    EVENT_HEADER, IDEMPOTENCY_HEADER, SIGNATURE_HEADER, WebhookRequest, WebhookSender,
    sign_payload,
};
use crate::error::DeliveryError;

/// Posts JSON bodies, signing them when a secret is configured.
#[derive(Debug, Clone)]
pub struct HttpWebhookSender {
    client: reqwest::Client,
}

impl HttpWebhookSender {
    /// Builds a sender with the given per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`reqwest::Error`] if the client cannot be
    /// constructed.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl WebhookSender for HttpWebhookSender {
    async fn send(&self, request: &WebhookRequest) -> Result<(), DeliveryError> {
        let mut builder = self
            .client
            .post(&request.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(EVENT_HEADER, &request.event)
            .header(IDEMPOTENCY_HEADER, &request.idempotency_key);

        if let Some(secret) = request.secret.as_deref().filter(|s| !s.is_empty()) {
            builder = builder.header(SIGNATURE_HEADER, sign_payload(secret, &request.body)?);
        }

        let response = builder
            .body(request.body.clone())
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(DeliveryError::Status(status.as_u16()))
        }
    }
}
