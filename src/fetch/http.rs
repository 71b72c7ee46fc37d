//! `reqwest`-backed [`Fetcher`].

use std::time::Duration;

use async_trait::async_trait;

use super::{FetchResponse, Fetcher, classify_status};
use crate::error::FetchError;

/// Plain HTTP fetcher with a per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Builds a fetcher with the given timeout and `User-Agent`.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`reqwest::Error`] if the client cannot be
    /// constructed (e.g. TLS backend initialization failure).
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    /// Wraps an existing client.
    #[must_use]
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError> {
        let parsed = url::Url::parse(url)
            .map_err(|e| FetchError::Permanent(format!("malformed URL {url}: {e}")))?;

        let response = self
            .client
            .get(parsed)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(classify_transport)?;
        Ok(FetchResponse {
            status: status.as_u16(),
            body: body.to_vec(),
        })
    }
}

/// Classifies a transport-level `reqwest` failure.
fn classify_transport(err: reqwest::Error) -> FetchError {
    if err.is_builder() {
        FetchError::Permanent(err.to_string())
    } else if let Some(status) = err.status() {
        classify_status(status.as_u16())
    } else {
        // Timeouts, connect failures, interrupted bodies.
        FetchError::Transient(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn malformed_url_is_permanent() {
        let Ok(fetcher) = HttpFetcher::new(Duration::from_secs(1), "test") else {
            return;
        };
        let result = fetcher.fetch("not a url").await;
        assert!(matches!(result, Err(FetchError::Permanent(_))));
    }

    #[tokio::test]
    async fn connection_refused_is_transient() {
        let Ok(fetcher) = HttpFetcher::new(Duration::from_secs(1), "test") else {
            return;
        };
        let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
            return;
        };
        let Ok(addr) = listener.local_addr() else {
            return;
        };
        drop(listener);

        let result = fetcher.fetch(&format!("http://{addr}/products.json")).await;
        assert!(matches!(result, Err(FetchError::Transient(_))));
    }
}
