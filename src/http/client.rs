//! HTTP client wrapper with request tracking

use crate::error::Result;
use crate::models::ScanOptions;
use reqwest::header::HeaderMap;
use reqwest::{Client, Response, StatusCode};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// A fully read response
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

/// HTTP client wrapper shared by every analyzer of one scan.
///
/// Redirects are never followed and requests are never retried: a failed
/// request is reported to the caller as-is.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    request_count: Arc<AtomicU64>,
}

impl HttpClient {
    /// Creates a new HttpClient from scan options
    pub fn from_options(options: &ScanOptions) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(options.request_timeout_secs))
            .user_agent(&options.user_agent)
            .redirect(reqwest::redirect::Policy::none())
            .danger_accept_invalid_certs(options.accept_invalid_certs)
            .build()?;

        Ok(Self {
            client,
            request_count: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Sends a HEAD request
    pub async fn head(&self, url: &str) -> Result<Response> {
        self.count();
        let response = self.client.head(url).send().await?;
        debug!("HEAD {url} -> {}", response.status());
        Ok(response)
    }

    /// Sends a GET request
    pub async fn get(&self, url: &str) -> Result<Response> {
        self.count();
        let response = self.client.get(url).send().await?;
        debug!("GET {url} -> {}", response.status());
        Ok(response)
    }

    /// Sends a GET request and reads the whole body
    pub async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let response = self.get(url).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await?;
        Ok(FetchedPage {
            status,
            headers,
            body,
        })
    }

    /// Returns the total number of requests made
    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    fn count(&self) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
    }
}
