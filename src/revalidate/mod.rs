//! Cache invalidation after a crawl
//!
//! When a run produced at least one successful page, the downstream cache is
//! told which paths changed. Up to `prefix-threshold` paths are revalidated
//! individually; above that the whole namespace (or host) prefix is
//! invalidated in one call. Failures are reported, never raised.

mod client;

pub use client::{RevalidateClient, RevalidateError, RevalidateRequest, RevalidateResponse};

use crate::config::RevalidateConfig;
use crate::crawler::CrawlResult;
use crate::url::canonicalize;
use std::fmt;
use tracing::{info, warn};

/// Paths of the successful pages, in result order without duplicates
///
/// With a namespace, each path becomes `/<namespace><path>`.
pub fn changed_paths(results: &[CrawlResult], namespace: Option<&str>) -> Vec<String> {
    let mut paths: Vec<String> = Vec::new();
    for result in results.iter().filter(|r| r.is_success()) {
        let Ok(url) = canonicalize(&result.url) else {
            continue;
        };
        let path = match namespace {
            Some(ns) => format!("/{}{}", ns.trim_matches('/'), url.path()),
            None => url.path().to_string(),
        };
        if !paths.contains(&path) {
            paths.push(path);
        }
    }
    paths
}

/// Chooses per-path or prefix invalidation
///
/// More than `threshold` paths switches to a prefix: `<namespace>/` when a
/// namespace is set, otherwise `<host>/`.
pub fn plan_request(
    paths: Vec<String>,
    namespace: Option<&str>,
    host: &str,
    threshold: usize,
) -> RevalidateRequest {
    if paths.len() > threshold {
        let scope = namespace.map(|ns| ns.trim_matches('/')).unwrap_or(host);
        RevalidateRequest::prefix(format!("{}/", scope))
    } else {
        RevalidateRequest::paths(paths)
    }
}

/// How the post-run invalidation went; stored on the run record
#[derive(Debug)]
pub enum InvalidationStatus {
    /// Nothing was sent
    Skipped(&'static str),
    Revalidated {
        request: RevalidateRequest,
        response: RevalidateResponse,
    },
    Failed(RevalidateError),
}

impl InvalidationStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl fmt::Display for InvalidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skipped(reason) => write!(f, "skipped: {}", reason),
            Self::Revalidated { request, response } => match &request.prefix {
                Some(prefix) => write!(
                    f,
                    "invalidated prefix {} ({} entries)",
                    prefix, response.invalidated_by_prefix
                ),
                None => write!(
                    f,
                    "revalidated {} of {} paths",
                    response.revalidated_paths.len(),
                    request.paths.len()
                ),
            },
            Self::Failed(error) => write!(f, "failed: {}", error),
        }
    }
}

/// Sends the post-run invalidation
pub struct Notifier {
    client: Option<RevalidateClient>,
    namespace: Option<String>,
    prefix_threshold: usize,
}

impl Notifier {
    pub fn new(
        client: Option<RevalidateClient>,
        namespace: Option<String>,
        prefix_threshold: usize,
    ) -> Self {
        Self {
            client,
            namespace,
            prefix_threshold,
        }
    }

    /// A notifier that never sends anything
    pub fn disabled() -> Self {
        Self::new(None, None, usize::MAX)
    }

    /// Wraps an already built client with the configured planning options
    pub fn from_config(client: Option<RevalidateClient>, config: &RevalidateConfig) -> Self {
        Self::new(client, config.namespace.clone(), config.prefix_threshold)
    }

    pub fn is_configured(&self) -> bool {
        self.client.is_some()
    }

    /// Notifies the cache about the successful pages of a run
    pub async fn notify(&self, host: &str, results: &[CrawlResult]) -> InvalidationStatus {
        if !results.iter().any(|r| r.is_success()) {
            return InvalidationStatus::Skipped("no successful pages");
        }
        let Some(client) = &self.client else {
            info!("Revalidation skipped: not configured");
            return InvalidationStatus::Failed(RevalidateError::NotConfigured);
        };

        let namespace = self.namespace.as_deref();
        let paths = changed_paths(results, namespace);
        let request = plan_request(paths, namespace, host, self.prefix_threshold);

        match client.revalidate(&request).await {
            Ok(response) => InvalidationStatus::Revalidated { request, response },
            Err(e) => {
                warn!("Cache invalidation failed: {}", e);
                InvalidationStatus::Failed(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    fn results() -> Vec<CrawlResult> {
        vec![
            CrawlResult::success("https://example.com/", 0, None, 10, 0),
            CrawlResult::success("https://example.com/about/", 1, None, 10, 0),
            CrawlResult::failure("https://example.com/gone/", 1, ErrorKind::HttpStatus, "404"),
            CrawlResult::success("https://example.com/about/", 1, None, 10, 0),
        ]
    }

    #[test]
    fn test_changed_paths() {
        assert_eq!(changed_paths(&results(), None), vec!["/", "/about/"]);
        assert_eq!(
            changed_paths(&results(), Some("tokyo-shibuya")),
            vec!["/tokyo-shibuya/", "/tokyo-shibuya/about/"]
        );
    }

    #[test]
    fn test_plan_threshold() {
        let paths: Vec<String> = (0..10).map(|i| format!("/p{}/", i)).collect();
        let request = plan_request(paths.clone(), None, "example.com", 10);
        assert_eq!(request.paths.len(), 10);
        assert!(request.prefix.is_none());

        let mut more = paths;
        more.push("/p10/".to_string());
        let request = plan_request(more.clone(), None, "example.com", 10);
        assert_eq!(request.prefix.as_deref(), Some("example.com/"));
        assert!(request.paths.is_empty());

        let request = plan_request(more, Some("tokyo-shibuya"), "example.com", 10);
        assert_eq!(request.prefix.as_deref(), Some("tokyo-shibuya/"));
    }

    #[tokio::test]
    async fn test_notify_without_success_is_skipped() {
        let failed = vec![CrawlResult::failure(
            "https://example.com/",
            0,
            ErrorKind::Timeout,
            "timeout",
        )];
        let status = Notifier::disabled().notify("example.com", &failed).await;
        assert!(matches!(status, InvalidationStatus::Skipped(_)));
    }

    #[tokio::test]
    async fn test_notify_unconfigured() {
        let status = Notifier::disabled().notify("example.com", &results()).await;
        assert!(matches!(
            status,
            InvalidationStatus::Failed(RevalidateError::NotConfigured)
        ));
        assert_eq!(
            status.to_string(),
            "failed: revalidation endpoint or secret not configured"
        );
    }
}
