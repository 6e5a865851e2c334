//! URL handling module for Sitewalk
//!
//! This module provides URL canonicalization, domain extraction, link
//! resolution, exclude-pattern matching and the cheap pre-filters applied to
//! every discovered link.

mod domain;
mod matcher;
mod normalize;

// Re-export main functions
pub use domain::{domain_of, is_same_domain, SiteDomain};
pub use matcher::{ExcludeMatcher, DEFAULT_EXCLUDE_PATTERNS};
pub use normalize::{canonicalize, resolve_link, CanonicalUrl};

use url::Url;

/// Link prefixes that never point at a crawlable page
const SKIPPABLE_PREFIXES: &[&str] = &["mailto:", "tel:", "javascript:", "data:", "file:"];

/// Returns true for link targets that are never crawled
///
/// The check is a case-insensitive prefix match on the raw link text, so it
/// can run before any URL parsing.
///
/// # Examples
///
/// ```
/// use sitewalk::url::is_skippable;
///
/// assert!(is_skippable("mailto:office@example.com"));
/// assert!(is_skippable("JavaScript:void(0)"));
/// assert!(!is_skippable("/contact/"));
/// ```
pub fn is_skippable(raw: &str) -> bool {
    let trimmed = raw.trim_start();
    SKIPPABLE_PREFIXES.iter().any(|prefix| {
        trimmed
            .get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
    })
}

/// Returns true when the string parses as an http(s) URL with a non-empty host
pub fn is_valid_http_url(raw: &str) -> bool {
    match Url::parse(raw.trim()) {
        Ok(url) => {
            matches!(url.scheme(), "http" | "https")
                && url.host_str().is_some_and(|h| !h.is_empty())
        }
        Err(_) => false,
    }
}
