use crate::state::UrlState;
use crate::ErrorKind;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// The per-URL outcome of a crawl
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlResult {
    pub url: String,
    pub title: Option<String>,
    /// Terminal state: Success, Skipped or Error
    pub state: UrlState,
    pub depth: u32,
    pub text_length: usize,
    pub image_count: usize,
    pub error_kind: Option<ErrorKind>,
    pub error_message: Option<String>,
    pub scraped_at: DateTime<Utc>,
}

impl CrawlResult {
    /// A processed page
    pub fn success(
        url: impl Into<String>,
        depth: u32,
        title: Option<String>,
        text_length: usize,
        image_count: usize,
    ) -> Self {
        Self {
            url: url.into(),
            title,
            state: UrlState::Success,
            depth,
            text_length,
            image_count,
            error_kind: None,
            error_message: None,
            scraped_at: Utc::now(),
        }
    }

    /// A page that failed; the kind decides between Skipped and Error
    pub fn failure(
        url: impl Into<String>,
        depth: u32,
        kind: ErrorKind,
        message: impl Into<String>,
    ) -> Self {
        let state = if kind.is_skip() {
            UrlState::Skipped
        } else {
            UrlState::Error
        };
        Self {
            url: url.into(),
            title: None,
            state,
            depth,
            text_length: 0,
            image_count: 0,
            error_kind: Some(kind),
            error_message: Some(message.into()),
            scraped_at: Utc::now(),
        }
    }

    /// A page that was never fetched, e.g. because robots.txt disallows it
    pub fn skipped(url: impl Into<String>, depth: u32, reason: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: None,
            state: UrlState::Skipped,
            depth,
            text_length: 0,
            image_count: 0,
            error_kind: None,
            error_message: Some(reason.into()),
            scraped_at: Utc::now(),
        }
    }

    /// True only for processed pages
    pub fn is_success(&self) -> bool {
        self.state.is_success()
    }

    pub fn is_skipped(&self) -> bool {
        self.state == UrlState::Skipped
    }
}
