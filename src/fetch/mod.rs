//! Storefront fetching.
//!
//! [`Fetcher`] is the boundary to the raw HTTP capability. It returns the
//! payload bytes of a successful response or a [`FetchError`] classified as
//! transient or permanent; retry policy lives in the orchestrator, not here.

pub mod http;
pub mod storefront;

use std::fmt::Debug;

use async_trait::async_trait;

use crate::error::FetchError;

pub use http::HttpFetcher;
pub use storefront::{PageParse, parse_products_page, products_page_url};

/// Successful fetch result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    /// HTTP status code of the response (always 2xx).
    pub status: u16,
    /// Raw response body.
    pub body: Vec<u8>,
}

/// Raw storefront fetch capability.
#[async_trait]
pub trait Fetcher: Send + Sync + Debug {
    /// Fetches `url`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Transient`] for failures worth retrying and
    /// [`FetchError::Permanent`] otherwise.
    async fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError>;
}

/// Classifies a non-success HTTP status.
///
/// Timeouts (408), too-early (425), rate limiting (429) and server errors
/// are transient; every other client error is permanent.
#[must_use]
pub fn classify_status(status: u16) -> FetchError {
    let message = format!("HTTP {status}");
    match status {
        408 | 425 | 429 | 500..=599 => FetchError::Transient(message),
        _ => FetchError::Permanent(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert!(classify_status(503).is_retryable());
        assert!(classify_status(500).is_retryable());
        assert!(classify_status(429).is_retryable());
        assert!(classify_status(408).is_retryable());
        assert!(!classify_status(404).is_retryable());
        assert!(!classify_status(403).is_retryable());
        assert!(!classify_status(401).is_retryable());
    }
}
