//! Sitemap resolution
//!
//! This module handles:
//! - Locating sitemaps through robots.txt and conventional paths
//! - Parsing `<urlset>` and `<sitemapindex>` documents
//! - Descending index documents iteratively under a record budget

use crate::crawler::{DiscoverySource, Fetcher};
use crate::discovery::UrlRecord;
use crate::robots::fetch_robots;
use crate::url::{canonicalize, domain_of, CanonicalUrl, SiteDomain};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

/// Errors for a single sitemap document
///
/// A failing sitemap is logged and skipped; it never aborts discovery.
#[derive(Debug, Error)]
pub enum SitemapError {
    #[error("Malformed sitemap XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Unexpected root element <{0}>")]
    UnexpectedRoot(String),

    #[error("Document has no root element")]
    Empty,

    #[error("Document ends before its root element is closed")]
    Truncated,
}

/// One `<url>` entry as written in the document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SitemapEntry {
    pub loc: String,
    pub lastmod: Option<String>,
    pub changefreq: Option<String>,
    pub priority: Option<f32>,
}

/// A parsed sitemap document
#[derive(Debug, Clone, PartialEq)]
pub enum SitemapDocument {
    /// `<sitemapindex>`: locations of child sitemaps
    Index(Vec<String>),
    /// `<urlset>`: page entries
    UrlSet(Vec<SitemapEntry>),
}

#[derive(Clone, Copy, PartialEq)]
enum Field {
    Loc,
    Lastmod,
    Changefreq,
    Priority,
}

/// Parses a sitemap or sitemap index
///
/// Element names are matched by local name, so namespaced and prefixed
/// documents parse the same way. Only direct children of `<url>` and
/// `<sitemap>` are read; extension elements such as `<image:image>` and
/// everything inside them are ignored. Entries without a `<loc>` are dropped,
/// as are unparsable `<priority>` values. A document that ends before its
/// root element is closed is rejected.
pub fn parse_document(xml: &str) -> Result<SitemapDocument, SitemapError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut is_index: Option<bool> = None;
    let mut children = Vec::new();
    let mut entries = Vec::new();
    let mut current: Option<SitemapEntry> = None;
    let mut field: Option<Field> = None;
    // 1 = root, 2 = entry, 3 = entry field
    let mut depth = 0usize;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                depth += 1;
                let name = e.local_name();
                let name = name.as_ref();
                match depth {
                    1 => {
                        is_index = match name {
                            b"sitemapindex" => Some(true),
                            b"urlset" => Some(false),
                            other => {
                                return Err(SitemapError::UnexpectedRoot(
                                    String::from_utf8_lossy(other).into_owned(),
                                ))
                            }
                        };
                    }
                    2 => {
                        field = None;
                        current = match name {
                            b"url" | b"sitemap" => Some(SitemapEntry::default()),
                            _ => None,
                        };
                    }
                    3 => {
                        field = match name {
                            b"loc" => Some(Field::Loc),
                            b"lastmod" => Some(Field::Lastmod),
                            b"changefreq" => Some(Field::Changefreq),
                            b"priority" => Some(Field::Priority),
                            _ => None,
                        };
                    }
                    _ => field = None,
                }
            }
            Event::Text(t) => {
                let value = t.unescape()?;
                fill(&mut current, field, value.trim());
            }
            Event::CData(c) => {
                let raw = c.into_inner();
                let value = String::from_utf8_lossy(&raw);
                fill(&mut current, field, value.trim());
            }
            Event::End(_) => {
                field = None;
                if depth == 2 {
                    if let Some(entry) = current.take().filter(|e| !e.loc.is_empty()) {
                        if is_index == Some(true) {
                            children.push(entry.loc);
                        } else {
                            entries.push(entry);
                        }
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Event::Empty(e) if is_index.is_none() => {
                return match e.local_name().as_ref() {
                    b"sitemapindex" => Ok(SitemapDocument::Index(Vec::new())),
                    b"urlset" => Ok(SitemapDocument::UrlSet(Vec::new())),
                    other => Err(SitemapError::UnexpectedRoot(
                        String::from_utf8_lossy(other).into_owned(),
                    )),
                };
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if depth > 0 {
        return Err(SitemapError::Truncated);
    }
    match is_index {
        Some(true) => Ok(SitemapDocument::Index(children)),
        Some(false) => Ok(SitemapDocument::UrlSet(entries)),
        None => Err(SitemapError::Empty),
    }
}

fn fill(current: &mut Option<SitemapEntry>, field: Option<Field>, value: &str) {
    let (Some(entry), Some(field)) = (current.as_mut(), field) else {
        return;
    };
    if value.is_empty() {
        return;
    }
    match field {
        Field::Loc => entry.loc = value.to_string(),
        Field::Lastmod => entry.lastmod = Some(value.to_string()),
        Field::Changefreq => entry.changefreq = Some(value.to_string()),
        Field::Priority => entry.priority = value.parse().ok(),
    }
}

/// Finds and walks a site's sitemaps
pub struct SitemapResolver {
    fetcher: Arc<dyn Fetcher>,
    probe_paths: Vec<String>,
}

impl SitemapResolver {
    /// Creates a resolver
    ///
    /// # Arguments
    ///
    /// * `fetcher` - Used for robots.txt, HEAD probes and sitemap bodies
    /// * `probe_paths` - Conventional sitemap paths tried on the site root
    pub fn new(fetcher: Arc<dyn Fetcher>, probe_paths: Vec<String>) -> Self {
        Self {
            fetcher,
            probe_paths,
        }
    }

    /// Lists candidate sitemap URLs for a site
    ///
    /// `Sitemap:` lines from robots.txt come first, then every conventional
    /// path that answers a HEAD probe. Duplicates are removed.
    pub async fn find_sitemap_indexes(&self, base: &Url) -> Vec<Url> {
        let mut found: Vec<Url> = Vec::new();

        let robots = fetch_robots(self.fetcher.as_ref(), base).await;
        for raw in robots.sitemaps() {
            match base.join(raw) {
                Ok(url) if !found.contains(&url) => found.push(url),
                Ok(_) => {}
                Err(e) => debug!("Ignoring robots.txt sitemap '{}': {}", raw, e),
            }
        }

        for path in &self.probe_paths {
            let Ok(url) = base.join(path) else {
                continue;
            };
            if found.contains(&url) {
                continue;
            }
            if self.fetcher.probe(&url).await {
                debug!("Found sitemap at {}", url);
                found.push(url);
            }
        }

        found
    }

    /// Collects page records from the given sitemaps
    ///
    /// Index documents are descended depth-first with an explicit stack.
    /// Only records on `domain` count, each canonical URL once, and descent
    /// stops as soon as `budget` records are held even if sitemaps remain.
    pub async fn resolve(
        &self,
        roots: &[Url],
        domain: &SiteDomain,
        budget: usize,
    ) -> Vec<UrlRecord> {
        let mut records = Vec::new();
        if budget == 0 {
            return records;
        }

        let mut seen: HashSet<CanonicalUrl> = HashSet::new();
        let mut opened: HashSet<String> = HashSet::new();
        let mut stack: Vec<Url> = roots.iter().rev().cloned().collect();

        while let Some(sitemap_url) = stack.pop() {
            if !opened.insert(sitemap_url.to_string()) {
                continue;
            }

            let body = match self.fetcher.fetch_text(&sitemap_url).await {
                Ok(body) => body,
                Err(e) => {
                    warn!("Skipping sitemap {}: {}", sitemap_url, e);
                    continue;
                }
            };

            match parse_document(&body) {
                Ok(SitemapDocument::Index(children)) => {
                    debug!("Sitemap index {} lists {} sitemaps", sitemap_url, children.len());
                    let resolved: Vec<Url> = children
                        .iter()
                        .filter_map(|loc| sitemap_url.join(loc).ok())
                        .collect();
                    stack.extend(resolved.into_iter().rev());
                }
                Ok(SitemapDocument::UrlSet(entries)) => {
                    for entry in entries {
                        let Ok(url) = canonicalize(&entry.loc) else {
                            continue;
                        };
                        if domain_of(url.as_url()).as_ref() != Some(domain) {
                            continue;
                        }
                        if !seen.insert(url.clone()) {
                            continue;
                        }
                        records.push(UrlRecord {
                            url,
                            lastmod: entry.lastmod,
                            changefreq: entry.changefreq,
                            priority: entry.priority,
                            source: DiscoverySource::Sitemap,
                        });
                        if records.len() >= budget {
                            info!("Sitemap budget of {} reached", budget);
                            return records;
                        }
                    }
                }
                Err(e) => warn!("Skipping sitemap {}: {}", sitemap_url, e),
            }
        }

        records
    }

    /// Finds the site's sitemaps and collects up to `budget` records
    pub async fn discover(&self, base: &CanonicalUrl, budget: usize) -> Vec<UrlRecord> {
        let Some(domain) = domain_of(base.as_url()) else {
            return Vec::new();
        };
        let roots = self.find_sitemap_indexes(base.as_url()).await;
        if roots.is_empty() {
            info!("No sitemap found for {}", domain);
            return Vec::new();
        }
        self.resolve(&roots, &domain, budget).await
    }
}
