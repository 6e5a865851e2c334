//! HTTP client for the cache revalidation endpoint

use crate::config::RevalidateConfig;
use crate::SitewalkError;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use url::Url;

/// Errors from a revalidation call
///
/// None of these fail a crawl run; they are logged and stored with the run.
#[derive(Debug, Error)]
pub enum RevalidateError {
    #[error("revalidation endpoint or secret not configured")]
    NotConfigured,

    #[error("no paths, keys or prefix to revalidate")]
    EmptyRequest,

    #[error("unauthorized")]
    Unauthorized,

    #[error("HTTP {0}")]
    Status(u16),

    #[error("timeout")]
    Timeout,

    #[error("request failed: {0}")]
    Transport(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Body of a revalidation request; empty members are omitted
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RevalidateRequest {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
}

impl RevalidateRequest {
    pub fn paths(paths: Vec<String>) -> Self {
        Self {
            paths,
            ..Self::default()
        }
    }

    pub fn keys(keys: Vec<String>) -> Self {
        Self {
            keys,
            ..Self::default()
        }
    }

    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
            && self.keys.is_empty()
            && self.prefix.as_deref().map_or(true, str::is_empty)
    }
}

/// What the endpoint reports back
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevalidateResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub revalidated_paths: Vec<String>,
    #[serde(default)]
    pub invalidated_keys: Vec<String>,
    #[serde(default)]
    pub invalidated_by_prefix: u64,
}

/// Client for `POST <revalidate-url>` with bearer authentication
#[derive(Debug, Clone)]
pub struct RevalidateClient {
    client: Client,
    url: Url,
    secret: String,
}

impl RevalidateClient {
    pub fn new(client: Client, url: Url, secret: impl Into<String>) -> Self {
        Self {
            client,
            url,
            secret: secret.into(),
        }
    }

    /// Builds a client from configuration and environment
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - URL or secret is missing
    /// * `Ok(Some(RevalidateClient))` - Ready to use
    /// * `Err(SitewalkError)` - The URL is malformed or the client failed to build
    pub fn from_config(config: &RevalidateConfig) -> Result<Option<Self>, SitewalkError> {
        let (Some(url), Some(secret)) = (config.resolved_url(), config.resolved_secret()) else {
            return Ok(None);
        };
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .build()?;
        Ok(Some(Self::new(client, Url::parse(&url)?, secret)))
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Revalidates URL paths
    pub async fn revalidate_paths(
        &self,
        paths: Vec<String>,
    ) -> Result<RevalidateResponse, RevalidateError> {
        self.revalidate(&RevalidateRequest::paths(paths)).await
    }

    /// Invalidates artifact keys
    pub async fn invalidate_keys(
        &self,
        keys: Vec<String>,
    ) -> Result<RevalidateResponse, RevalidateError> {
        self.revalidate(&RevalidateRequest::keys(keys)).await
    }

    /// Invalidates every cached entry under a prefix
    pub async fn invalidate_prefix(
        &self,
        prefix: &str,
    ) -> Result<RevalidateResponse, RevalidateError> {
        self.revalidate(&RevalidateRequest::prefix(prefix)).await
    }

    /// Sends a revalidation request
    pub async fn revalidate(
        &self,
        request: &RevalidateRequest,
    ) -> Result<RevalidateResponse, RevalidateError> {
        if request.is_empty() {
            return Err(RevalidateError::EmptyRequest);
        }

        let response = self
            .client
            .post(self.url.clone())
            .header(AUTHORIZATION, format!("Bearer {}", self.secret))
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RevalidateError::Timeout
                } else {
                    RevalidateError::Transport(e.to_string())
                }
            })?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::UNAUTHORIZED => {
                error!("Revalidation failed: unauthorized");
                return Err(RevalidateError::Unauthorized);
            }
            status => {
                error!("Revalidation failed: HTTP {}", status.as_u16());
                return Err(RevalidateError::Status(status.as_u16()));
            }
        }

        let body = response
            .text()
            .await
            .map_err(|e| RevalidateError::Transport(e.to_string()))?;
        let parsed: RevalidateResponse = serde_json::from_str(&body)
            .map_err(|e| RevalidateError::InvalidResponse(e.to_string()))?;

        info!(
            "Revalidation completed: {} paths, {} keys, {} by prefix",
            parsed.revalidated_paths.len(),
            parsed.invalidated_keys.len(),
            parsed.invalidated_by_prefix
        );
        Ok(parsed)
    }
}
