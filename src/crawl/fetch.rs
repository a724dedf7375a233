// src/crawl/fetch.rs
// =============================================================================
// Downloads page bodies.
//
// The crawl core only sees the PageFetcher trait, so tests can hand it a
// canned set of pages. HttpFetcher is the real implementation on reqwest:
// - one shared Client (connection pooling)
// - a per-request timeout
// - at most 5 redirects followed
//
// Any failure is returned as-is; retrying is the queue's business.
// =============================================================================

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::FetchError;

/// Something that can turn a URL into page text
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// reqwest-backed fetcher
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Builds a fetcher whose requests give up after `timeout`
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| categorize_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|e| categorize_error(url, e))
    }
}

// Sorts reqwest errors into the cases worth telling apart in logs
fn categorize_error(url: &str, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout(url.to_string())
    } else if error.is_connect() {
        FetchError::Connect(url.to_string())
    } else {
        FetchError::Http(error)
    }
}
