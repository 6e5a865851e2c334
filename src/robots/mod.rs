//! Robots.txt handling module
//!
//! Fetches and parses a site's robots.txt. The parsed file answers two
//! questions: which sitemaps the site declares, and whether a page may be
//! fetched.

mod parser;

pub use parser::ParsedRobots;

use crate::crawler::Fetcher;
use tracing::debug;
use url::Url;

/// Fetches robots.txt for a site
///
/// A missing or unreadable file yields [`ParsedRobots::allow_all`].
///
/// # Arguments
///
/// * `fetcher` - Fetcher used for the request
/// * `base` - Any URL on the site
pub async fn fetch_robots(fetcher: &dyn Fetcher, base: &Url) -> ParsedRobots {
    let robots_url = match base.join("/robots.txt") {
        Ok(url) => url,
        Err(_) => return ParsedRobots::allow_all(),
    };

    match fetcher.fetch_text(&robots_url).await {
        Ok(content) => ParsedRobots::from_content(&content),
        Err(e) => {
            debug!("No robots.txt at {}: {}", robots_url, e);
            ParsedRobots::allow_all()
        }
    }
}
