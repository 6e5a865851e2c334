//! Frontier for breadth-first traversal of a single site
//!
//! This module handles:
//! - The FIFO queue of URLs waiting to be fetched
//! - The visited set, so each canonical URL is fetched at most once
//! - Domain scoping: only URLs on the seed's scheme and host are accepted
//! - An optional depth cap

use crate::url::{
    canonicalize, domain_of, is_skippable, is_valid_http_url, CanonicalUrl, SiteDomain,
};
use crate::UrlError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use tracing::trace;

/// Where a URL was first seen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoverySource {
    Seed,
    Link,
    Sitemap,
}

/// A URL waiting in (or taken from) the frontier
#[derive(Debug, Clone)]
pub struct FrontierEntry {
    pub url: CanonicalUrl,

    /// Link distance from the seed
    pub depth: u32,

    pub discovered_at: DateTime<Utc>,

    pub source: DiscoverySource,
}

/// What happened to a candidate handed to [`Frontier::enqueue`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Queued,
    /// mailto:, tel:, javascript: and similar
    Skippable,
    /// Not an http(s) URL with a host
    InvalidUrl,
    OffDomain,
    AlreadyVisited,
    AlreadyQueued,
    DepthExceeded,
}

impl EnqueueOutcome {
    pub fn is_queued(&self) -> bool {
        matches!(self, Self::Queued)
    }
}

/// Breadth-first frontier scoped to one domain
///
/// Entries are dequeued in the order they were enqueued. Because the
/// orchestrator only feeds back links after a page is processed, every
/// depth-d URL is dequeued before any depth-(d+1) URL.
#[derive(Debug)]
pub struct Frontier {
    domain: SiteDomain,
    queue: VecDeque<FrontierEntry>,
    /// Canonical forms currently in `queue`
    queued: HashSet<CanonicalUrl>,
    visited: HashSet<CanonicalUrl>,
    max_depth: Option<u32>,
}

impl Frontier {
    /// Creates a frontier holding only the seed at depth 0
    ///
    /// # Arguments
    ///
    /// * `seed` - Absolute http(s) URL; its scheme and host become the crawl scope
    /// * `max_depth` - Deepest link distance accepted, or `None` for unbounded
    ///
    /// # Returns
    ///
    /// * `Ok(Frontier)` - Ready for traversal
    /// * `Err(UrlError)` - The seed is not a valid http(s) URL
    pub fn new(seed: &str, max_depth: Option<u32>) -> Result<Self, UrlError> {
        let seed = canonicalize(seed)?;
        let domain = domain_of(seed.as_url()).ok_or(UrlError::MissingDomain)?;

        let mut frontier = Self {
            domain,
            queue: VecDeque::new(),
            queued: HashSet::new(),
            visited: HashSet::new(),
            max_depth,
        };
        frontier.push(seed, 0, DiscoverySource::Seed);
        Ok(frontier)
    }

    /// The scheme and host every accepted URL shares
    pub fn domain(&self) -> &SiteDomain {
        &self.domain
    }

    /// Offers a raw candidate URL to the frontier
    ///
    /// The candidate is filtered in order: skippable prefix, http(s) validity,
    /// canonicalization, domain scope, depth cap, visited set, queued set.
    /// Only a candidate passing every check is appended.
    pub fn enqueue(
        &mut self,
        candidate: &str,
        depth: u32,
        source: DiscoverySource,
    ) -> EnqueueOutcome {
        if is_skippable(candidate) {
            return EnqueueOutcome::Skippable;
        }
        if !is_valid_http_url(candidate) {
            return EnqueueOutcome::InvalidUrl;
        }
        let Ok(url) = canonicalize(candidate) else {
            return EnqueueOutcome::InvalidUrl;
        };
        self.enqueue_canonical(url, depth, source)
    }

    /// Offers an already canonical URL to the frontier
    pub fn enqueue_canonical(
        &mut self,
        url: CanonicalUrl,
        depth: u32,
        source: DiscoverySource,
    ) -> EnqueueOutcome {
        if domain_of(url.as_url()).as_ref() != Some(&self.domain) {
            return EnqueueOutcome::OffDomain;
        }
        if self.max_depth.is_some_and(|max| depth > max) {
            return EnqueueOutcome::DepthExceeded;
        }
        if self.visited.contains(&url) {
            return EnqueueOutcome::AlreadyVisited;
        }
        if self.queued.contains(&url) {
            return EnqueueOutcome::AlreadyQueued;
        }

        trace!("Enqueued {} at depth {}", url, depth);
        self.push(url, depth, source);
        EnqueueOutcome::Queued
    }

    fn push(&mut self, url: CanonicalUrl, depth: u32, source: DiscoverySource) {
        self.queued.insert(url.clone());
        self.queue.push_back(FrontierEntry {
            url,
            depth,
            discovered_at: Utc::now(),
            source,
        });
    }

    /// Takes the oldest entry and marks it visited in the same step
    ///
    /// A URL taken here can never be enqueued again.
    pub fn next_visit(&mut self) -> Option<FrontierEntry> {
        let entry = self.queue.pop_front()?;
        self.queued.remove(&entry.url);
        self.visited.insert(entry.url.clone());
        Some(entry)
    }

    /// Takes up to `n` entries in FIFO order, marking each visited
    pub fn next_batch(&mut self, n: usize) -> Vec<FrontierEntry> {
        let mut batch = Vec::with_capacity(n.min(self.queue.len()));
        while batch.len() < n {
            match self.next_visit() {
                Some(entry) => batch.push(entry),
                None => break,
            }
        }
        batch
    }

    /// Records a URL as visited without it passing through the queue
    ///
    /// Returns false if it was already visited.
    pub fn mark_visited(&mut self, url: &CanonicalUrl) -> bool {
        if self.queued.remove(url) {
            self.queue.retain(|entry| &entry.url != url);
        }
        self.visited.insert(url.clone())
    }

    pub fn is_visited(&self, url: &CanonicalUrl) -> bool {
        self.visited.contains(url)
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    /// Number of entries waiting
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
