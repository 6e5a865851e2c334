//! Link-following discovery
//!
//! A planning crawl that only enumerates URLs. It keeps its own frontier,
//! separate from the orchestrator's, and records no results.

use crate::crawler::{links_in, DiscoverySource, Fetcher, Frontier};
use crate::discovery::UrlRecord;
use crate::url::{CanonicalUrl, ExcludeMatcher};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Enumerates same-site URLs by following anchors
pub struct LinkDiscoverer {
    fetcher: Arc<dyn Fetcher>,
    exclude: ExcludeMatcher,
    delay: Duration,
}

impl LinkDiscoverer {
    /// Creates a discoverer
    ///
    /// # Arguments
    ///
    /// * `fetcher` - Used to fetch the pages whose links are expanded
    /// * `exclude` - Links matching any pattern are neither returned nor expanded
    /// * `delay` - Pause between consecutive fetches
    pub fn new(fetcher: Arc<dyn Fetcher>, exclude: ExcludeMatcher, delay: Duration) -> Self {
        Self {
            fetcher,
            exclude,
            delay,
        }
    }

    /// Crawls from `seeds` and returns up to `max_urls` new URLs
    ///
    /// URLs in `already_seen` are still expanded but are neither returned
    /// nor counted against `max_urls`. Every seed must be on the first seed's
    /// site; others are ignored.
    pub async fn discover(
        &self,
        seeds: &[CanonicalUrl],
        max_depth: u32,
        max_urls: usize,
        already_seen: &HashSet<CanonicalUrl>,
    ) -> Vec<UrlRecord> {
        let mut found = Vec::new();
        let Some(first) = seeds.first() else {
            return found;
        };
        if max_urls == 0 {
            return found;
        }

        let mut frontier = match Frontier::new(first.as_str(), Some(max_depth)) {
            Ok(frontier) => frontier,
            Err(e) => {
                debug!("Cannot start link discovery at {}: {}", first, e);
                return found;
            }
        };
        for seed in &seeds[1..] {
            frontier.enqueue_canonical(seed.clone(), 0, DiscoverySource::Seed);
        }

        let mut fetched = 0usize;
        while let Some(entry) = frontier.next_visit() {
            if !already_seen.contains(&entry.url) {
                found.push(UrlRecord::discovered(entry.url.clone(), entry.source));
                if found.len() >= max_urls {
                    break;
                }
            }

            // Links found at the depth cap could never be enqueued
            if entry.depth >= max_depth {
                continue;
            }

            if fetched > 0 && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            fetched += 1;

            let page = match self.fetcher.fetch_page(entry.url.as_url()).await {
                Ok(page) => page,
                Err(e) => {
                    debug!("Link discovery could not fetch {}: {}", entry.url, e);
                    continue;
                }
            };

            for link in links_in(&page.html, &page.final_url) {
                if self.exclude.is_excluded(link.as_str()) {
                    continue;
                }
                frontier.enqueue(link.as_str(), entry.depth + 1, DiscoverySource::Link);
            }
        }

        info!(
            "Link discovery found {} new URLs after {} fetches",
            found.len(),
            fetched
        );
        found
    }
}
