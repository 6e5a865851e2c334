//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching behind the [`Fetcher`] trait
//! - HTML parsing and link extraction
//! - The breadth-first [`Frontier`]
//! - Page processing and per-URL results
//! - Overall crawl coordination

mod coordinator;
mod fetcher;
mod frontier;
mod parser;
mod processor;
mod result;

pub use coordinator::{Coordinator, CrawlReport};
pub use fetcher::{build_http_client, FetchError, FetchedPage, Fetcher, HttpFetcher};
pub use frontier::{DiscoverySource, EnqueueOutcome, Frontier, FrontierEntry};
pub use parser::{extract_links, links_in, parse_html, ParsedPage};
pub use processor::{HtmlProcessor, PageProcessor, ProcessError, ProcessedPage};
pub use result::CrawlResult;

#[cfg(test)]
pub(crate) use fetcher::fake;
