//! Page processing collaborator
//!
//! The orchestrator hands every successfully fetched page to a
//! [`PageProcessor`]. The default [`HtmlProcessor`] extracts title, text and
//! images and optionally stores a JSON artifact per page.

use crate::crawler::fetcher::FetchedPage;
use crate::crawler::parser::parse_html;
use crate::output::{ArtifactStore, ImageRef, PageArtifact};
use crate::url::{is_same_domain, CanonicalUrl};
use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

/// Summary of a processed page
#[derive(Debug, Clone, Default)]
pub struct ProcessedPage {
    pub title: Option<String>,
    pub text_length: usize,
    pub image_count: usize,
    /// Where the artifact was written, if artifacts are enabled
    pub artifact_path: Option<PathBuf>,
}

/// A processing failure; the page is recorded as an error
#[derive(Debug, Error)]
#[error("processing failed: {0}")]
pub struct ProcessError(pub String);

impl From<crate::SitewalkError> for ProcessError {
    fn from(err: crate::SitewalkError) -> Self {
        ProcessError(err.to_string())
    }
}

/// Turns a fetched page into stored content
#[async_trait]
pub trait PageProcessor: Send + Sync {
    /// Processes one page
    ///
    /// # Arguments
    ///
    /// * `url` - Canonical URL the page was fetched under
    /// * `page` - The raw fetched page
    async fn process(
        &self,
        url: &CanonicalUrl,
        page: &FetchedPage,
    ) -> Result<ProcessedPage, ProcessError>;
}

/// Default processor: parses the HTML and writes an artifact when configured
#[derive(Debug, Clone, Default)]
pub struct HtmlProcessor {
    artifacts: Option<ArtifactStore>,
}

impl HtmlProcessor {
    pub fn new(artifacts: Option<ArtifactStore>) -> Self {
        Self { artifacts }
    }
}

#[async_trait]
impl PageProcessor for HtmlProcessor {
    async fn process(
        &self,
        url: &CanonicalUrl,
        page: &FetchedPage,
    ) -> Result<ProcessedPage, ProcessError> {
        let parsed = parse_html(&page.html, &page.final_url);

        let mut processed = ProcessedPage {
            title: parsed.title.clone(),
            text_length: parsed.text.chars().count(),
            image_count: parsed.images.len(),
            artifact_path: None,
        };

        if let Some(store) = &self.artifacts {
            let links = parsed
                .links
                .iter()
                .filter(|link| is_same_domain(link, url.as_url()))
                .filter_map(|link| CanonicalUrl::from_url(link).ok())
                .map(|link| link.to_string())
                .collect();

            let artifact = PageArtifact {
                url: url.to_string(),
                title: parsed.title,
                text: parsed.text,
                links,
                images: parsed.images.iter().map(|src| ImageRef::new(src.as_str())).collect(),
                scraped_at: page.fetched_at,
            };
            processed.artifact_path = Some(store.write(&artifact)?);
        }

        Ok(processed)
    }
}
