//! URL discovery for page-list crawls
//!
//! This module combines two strategies under one budget:
//! - Sitemap descent ([`SitemapResolver`])
//! - Link-following ([`LinkDiscoverer`])
//!
//! Sitemap records are taken as authoritative; link discovery only fills
//! whatever budget the sitemaps leave.

mod links;
mod sitemap;

pub use links::LinkDiscoverer;
pub use sitemap::{parse_document, SitemapDocument, SitemapEntry, SitemapError, SitemapResolver};

use crate::config::Config;
use crate::crawler::{DiscoverySource, Fetcher};
use crate::url::{canonicalize, CanonicalUrl, ExcludeMatcher};
use crate::{ConfigError, UrlResult};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

/// A discovered page URL with any sitemap metadata
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlRecord {
    pub url: CanonicalUrl,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lastmod: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changefreq: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<f32>,
    pub source: DiscoverySource,
}

impl UrlRecord {
    /// A record without sitemap metadata
    pub fn discovered(url: CanonicalUrl, source: DiscoverySource) -> Self {
        Self {
            url,
            lastmod: None,
            changefreq: None,
            priority: None,
            source,
        }
    }
}

/// Runs sitemap and link discovery for one site
pub struct UrlDiscovery {
    sitemaps: SitemapResolver,
    links: LinkDiscoverer,
}

impl UrlDiscovery {
    pub fn new(sitemaps: SitemapResolver, links: LinkDiscoverer) -> Self {
        Self { sitemaps, links }
    }

    /// Builds both strategies from the configuration
    ///
    /// # Returns
    ///
    /// * `Err(ConfigError)` - An exclude pattern does not compile
    pub fn from_config(fetcher: Arc<dyn Fetcher>, config: &Config) -> Result<Self, ConfigError> {
        let exclude = ExcludeMatcher::new(config.discovery.exclude_patterns.as_slice())?;
        Ok(Self::new(
            SitemapResolver::new(fetcher.clone(), config.discovery.sitemap_paths.clone()),
            LinkDiscoverer::new(fetcher, exclude, config.crawler.politeness_delay()),
        ))
    }

    /// Discovers up to `max_urls` same-site URLs
    ///
    /// With `prefer_sitemap`, sitemap records come first and link discovery
    /// runs only if they fall short of `max_urls`, skipping URLs the sitemaps
    /// already produced. Without it, only link discovery runs.
    ///
    /// # Returns
    ///
    /// * `Err(UrlError)` - `base_url` is not a valid http(s) URL
    pub async fn discover_all(
        &self,
        base_url: &str,
        max_urls: usize,
        max_depth: u32,
        prefer_sitemap: bool,
    ) -> UrlResult<Vec<UrlRecord>> {
        let base = canonicalize(base_url)?;

        let mut records = if prefer_sitemap {
            self.sitemaps.discover(&base, max_urls).await
        } else {
            Vec::new()
        };
        info!("Sitemaps yielded {} URLs", records.len());

        if records.len() < max_urls {
            let seen: HashSet<CanonicalUrl> = records.iter().map(|r| r.url.clone()).collect();
            let remaining = max_urls - records.len();
            let extra = self
                .links
                .discover(std::slice::from_ref(&base), max_depth, remaining, &seen)
                .await;
            info!("Link discovery added {} URLs", extra.len());
            records.extend(extra);
        }

        records.truncate(max_urls);
        Ok(records)
    }
}
