//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests the crawler makes:
//! - Building HTTP clients with proper user agent strings
//! - GET requests for pages, with status and Content-Type checks
//! - GET requests for plain text resources (robots.txt, sitemaps)
//! - HEAD probes for conventional sitemap locations
//! - Error classification into [`ErrorKind`]

use crate::config::UserAgentConfig;
use crate::ErrorKind;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, Response, StatusCode};
use std::fmt;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// A page returned by a successful fetch
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// The URL that was requested
    pub url: Url,
    /// URL after redirects
    pub final_url: Url,
    pub status: u16,
    pub content_type: String,
    pub html: String,
    pub fetched_at: DateTime<Utc>,
}

/// A typed fetch failure
///
/// Fetch failures are values, not panics or crate errors: the orchestrator
/// turns each one into a Skipped or Error result for the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    pub kind: ErrorKind,
    /// HTTP status, when the server answered
    pub status: Option<u16>,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
        }
    }

    /// A non-success HTTP status
    ///
    /// 429 is classified as [`ErrorKind::RateLimit`] so the dispatcher retries it.
    pub fn http_status(status: u16, message: impl Into<String>) -> Self {
        let kind = if status == StatusCode::TOO_MANY_REQUESTS.as_u16() {
            ErrorKind::RateLimit
        } else {
            ErrorKind::HttpStatus
        };
        Self {
            kind,
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn content_type(content_type: &str) -> Self {
        Self::new(
            ErrorKind::ContentType,
            format!("Expected HTML, got '{}'", content_type),
        )
    }

    /// Classifies a transport error from reqwest
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::new(ErrorKind::Timeout, "Request timeout")
        } else if err.is_connect() {
            Self::new(ErrorKind::Network, format!("Connection failed: {}", err))
        } else if let Some(status) = err.status() {
            Self::http_status(status.as_u16(), err.to_string())
        } else {
            Self::new(ErrorKind::Network, err.to_string())
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} (HTTP {}): {}", self.kind, status, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for FetchError {}

/// Retrieves resources from the crawled site
///
/// The orchestrator, the sitemap resolver and the link discoverer all go
/// through this trait, so tests can substitute an in-memory site.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches an HTML page
    ///
    /// Non-success statuses and non-HTML bodies are errors.
    async fn fetch_page(&self, url: &Url) -> Result<FetchedPage, FetchError>;

    /// Fetches any successful response body as text
    async fn fetch_text(&self, url: &Url) -> Result<String, FetchError>;

    /// Returns true if a HEAD request for the URL succeeds
    async fn probe(&self, url: &Url) -> bool;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout` - Whole-request timeout
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use sitewalk::config::UserAgentConfig;
/// use sitewalk::crawler::build_http_client;
///
/// let config = UserAgentConfig {
///     crawler_name: "sitewalk".to_string(),
///     crawler_version: "0.1".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, Duration::from_secs(10)).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .gzip(true)
        .brotli(true)
        .build()
}

/// [`Fetcher`] backed by a reqwest client
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds the client from user agent settings and a timeout
    pub fn from_config(
        user_agent: &UserAgentConfig,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self::new(build_http_client(user_agent, timeout)?))
    }

    async fn get(&self, url: &Url) -> Result<Response, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(&e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        Err(status_error(response).await)
    }
}

/// Builds the error for a non-success response
///
/// For 429 the body and any `Retry-After` header are folded into the message
/// so the retry policy can honor the server's requested wait.
async fn status_error(response: Response) -> FetchError {
    let status = response.status();
    if status != StatusCode::TOO_MANY_REQUESTS {
        return FetchError::http_status(status.as_u16(), format!("HTTP {}", status.as_u16()));
    }

    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    let body = response.text().await.unwrap_or_default();

    let message = match retry_after {
        Some(secs) => format!("HTTP 429 Too Many Requests: please retry in {}s", secs),
        None if body.is_empty() => "HTTP 429 Too Many Requests".to_string(),
        None => format!("HTTP 429 Too Many Requests: {}", body.trim()),
    };
    FetchError::http_status(429, message)
}

fn is_html(content_type: &str) -> bool {
    let lowered = content_type.to_ascii_lowercase();
    lowered.contains("text/html") || lowered.contains("application/xhtml+xml")
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch_page(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        let response = self.get(url).await?;
        let status = response.status().as_u16();
        let final_url = response.url().clone();

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if !is_html(&content_type) {
            return Err(FetchError::content_type(&content_type));
        }

        let html = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(&e))?;

        debug!("Fetched {} ({} bytes)", final_url, html.len());

        Ok(FetchedPage {
            url: url.clone(),
            final_url,
            status,
            content_type,
            html,
            fetched_at: Utc::now(),
        })
    }

    async fn fetch_text(&self, url: &Url) -> Result<String, FetchError> {
        let response = self.get(url).await?;
        response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(&e))
    }

    async fn probe(&self, url: &Url) -> bool {
        match self.client.head(url.clone()).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("HEAD {} failed: {}", url, e);
                false
            }
        }
    }
}
