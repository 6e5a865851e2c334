//! Sitewalk: a polite same-site crawl orchestrator
//!
//! This crate discovers the pages of one website (from its sitemaps and by following
//! links), fetches them under a requests-per-minute budget with retry on throttling,
//! records one result per page, and notifies a downstream cache once a run finishes.

pub mod config;
pub mod crawler;
pub mod discovery;
pub mod dispatch;
pub mod output;
pub mod revalidate;
pub mod robots;
pub mod state;
pub mod storage;
pub mod url;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Main error type for Sitewalk operations
///
/// Page-level failures never surface here; they are folded into
/// [`crawler::CrawlResult`] values. This enum covers the failures that stop a
/// run from starting or finishing.
#[derive(Debug, Error)]
pub enum SitewalkError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid exclude pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

/// Failure taxonomy carried inside crawl and dispatch results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Connection failure, DNS failure, or reset
    Network,
    /// The request did not complete within its timeout
    Timeout,
    /// The server answered with a non-success status
    HttpStatus,
    /// The response was not HTML
    ContentType,
    /// A sitemap or response body could not be decoded
    Parse,
    /// The server signalled throttling and retries ran out
    RateLimit,
    /// The server rejected our credentials
    Auth,
    /// The page was fetched but the processing collaborator failed
    Processing,
}

impl ErrorKind {
    /// Returns the string used to persist this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Network => "network",
            ErrorKind::Timeout => "timeout",
            ErrorKind::HttpStatus => "http_status",
            ErrorKind::ContentType => "content_type",
            ErrorKind::Parse => "parse",
            ErrorKind::RateLimit => "rate_limit",
            ErrorKind::Auth => "auth",
            ErrorKind::Processing => "processing",
        }
    }

    /// Parses a persisted kind string
    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "network" => Some(ErrorKind::Network),
            "timeout" => Some(ErrorKind::Timeout),
            "http_status" => Some(ErrorKind::HttpStatus),
            "content_type" => Some(ErrorKind::ContentType),
            "parse" => Some(ErrorKind::Parse),
            "rate_limit" => Some(ErrorKind::RateLimit),
            "auth" => Some(ErrorKind::Auth),
            "processing" => Some(ErrorKind::Processing),
            _ => None,
        }
    }

    /// Returns true if a page failing with this kind is skipped rather than errored
    ///
    /// The server answered but the page is not something we crawl.
    pub fn is_skip(&self) -> bool {
        matches!(self, ErrorKind::HttpStatus | ErrorKind::ContentType)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result type alias for Sitewalk operations
pub type Result<T> = std::result::Result<T, SitewalkError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Coordinator, CrawlReport, CrawlResult};
pub use state::UrlState;
pub use url::{canonicalize, is_same_domain, CanonicalUrl};
