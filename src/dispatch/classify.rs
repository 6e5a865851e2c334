//! Batch page classification
//!
//! Pages are sent to a classifier service in chunks of at most
//! `max-batch-size` items. Every chunk is a dispatched call, so chunks share
//! the classifier's requests-per-minute budget and throttling retries. The
//! output always has one record per input page, in input order.

use crate::config::ClassifierConfig;
use crate::dispatch::{CallError, DispatchRun, DispatchSettings, Operation};
use crate::output::{ArtifactStore, PageArtifact};
use crate::{ErrorKind, SitewalkError};
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

/// Page type used when the service gave no answer for a page
pub const FALLBACK_PAGE_TYPE: &str = "other";

/// Page text sent to the classifier is cut to this many characters
const MAX_TEXT_CHARS: usize = 4000;

/// File written by [`classify_artifacts`]
pub const CLASSIFICATIONS_FILE: &str = "classifications.json";

/// One page to classify
#[derive(Debug, Clone, Serialize)]
pub struct ClassifyItem {
    pub url: String,
    pub title: Option<String>,
    pub text: String,
}

impl From<&PageArtifact> for ClassifyItem {
    fn from(artifact: &PageArtifact) -> Self {
        Self {
            url: artifact.url.clone(),
            title: artifact.title.clone(),
            text: artifact.text.chars().take(MAX_TEXT_CHARS).collect(),
        }
    }
}

/// The classification of one page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationRecord {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    pub page_type: String,
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ClassificationRecord {
    /// Stand-in for a page the service did not return
    pub fn missing(item: &ClassifyItem) -> Self {
        Self {
            url: item.url.clone(),
            title: item.title.clone(),
            page_type: FALLBACK_PAGE_TYPE.to_string(),
            confidence: 0.0,
            reasoning: "No classification returned for this page".to_string(),
            error: None,
        }
    }

    /// Stand-in for a page whose chunk failed
    pub fn failed(item: &ClassifyItem, error: &str) -> Self {
        Self {
            reasoning: "Classification request failed".to_string(),
            error: Some(error.to_string()),
            ..Self::missing(item)
        }
    }
}

/// A page classification service
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classifies a batch; the service may return fewer records than items
    async fn classify_batch(
        &self,
        items: &[ClassifyItem],
    ) -> Result<Vec<ClassificationRecord>, CallError>;
}

struct ClassifyChunk {
    classifier: Arc<dyn Classifier>,
}

#[async_trait]
impl Operation for ClassifyChunk {
    type Item = Vec<ClassifyItem>;
    type Output = Vec<ClassificationRecord>;

    async fn call(&self, item: &Vec<ClassifyItem>) -> Result<Self::Output, CallError> {
        self.classifier.classify_batch(item).await
    }
}

/// Lines up returned records with the chunk's items
///
/// Records are matched by URL first. A record whose URL names no item in the
/// chunk (often an empty one) is matched to the item at its own position.
/// Items left without a record get [`ClassificationRecord::missing`].
fn align(items: &[ClassifyItem], returned: Vec<ClassificationRecord>) -> Vec<ClassificationRecord> {
    let known: HashSet<&str> = items.iter().map(|item| item.url.as_str()).collect();
    let mut by_url: HashMap<String, ClassificationRecord> = HashMap::new();
    let mut by_position: Vec<Option<ClassificationRecord>> = Vec::with_capacity(returned.len());
    for record in returned {
        if known.contains(record.url.as_str()) {
            by_position.push(None);
            by_url.entry(record.url.clone()).or_insert(record);
        } else {
            by_position.push(Some(record));
        }
    }

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let found = by_url
                .remove(&item.url)
                .or_else(|| by_position.get_mut(i).and_then(Option::take));
            match found {
                Some(mut record) => {
                    record.url = item.url.clone();
                    if record.title.is_none() {
                        record.title = item.title.clone();
                    }
                    record
                }
                None => ClassificationRecord::missing(item),
            }
        })
        .collect()
}

/// Classifies every item, one dispatched call per chunk
///
/// The result has exactly one record per item, in item order.
pub async fn classify_all(
    classifier: Arc<dyn Classifier>,
    items: Vec<ClassifyItem>,
    max_batch_size: usize,
    settings: &DispatchSettings,
) -> Vec<ClassificationRecord> {
    let chunks: Vec<Vec<ClassifyItem>> = items
        .chunks(max_batch_size.max(1))
        .map(|chunk| chunk.to_vec())
        .collect();
    info!(
        "Classifying {} pages in {} batches",
        items.len(),
        chunks.len()
    );

    let mut run = DispatchRun::new(ClassifyChunk { classifier }, settings);
    let mut records = Vec::with_capacity(items.len());

    for outcome in run.dispatch(chunks).await {
        match outcome.result {
            Ok(returned) => {
                if returned.len() < outcome.item.len() {
                    warn!(
                        "Classifier returned {} of {} records; filling the rest",
                        returned.len(),
                        outcome.item.len()
                    );
                }
                records.extend(align(&outcome.item, returned));
            }
            Err(failure) => {
                warn!("Classification batch failed: {}", failure);
                let message = failure.to_string();
                records.extend(
                    outcome
                        .item
                        .iter()
                        .map(|item| ClassificationRecord::failed(item, &message)),
                );
            }
        }
    }

    records
}

/// Classifies every artifact in `store` and writes the records next to them
///
/// # Returns
///
/// * `Ok(PathBuf)` - Path of the written classifications file
/// * `Err(SitewalkError)` - Artifacts could not be read or the file written
pub async fn classify_artifacts(
    store: &ArtifactStore,
    classifier: Arc<dyn Classifier>,
    max_batch_size: usize,
    settings: &DispatchSettings,
) -> Result<PathBuf, SitewalkError> {
    let items: Vec<ClassifyItem> = store.load_all()?.iter().map(ClassifyItem::from).collect();
    let records = classify_all(classifier, items, max_batch_size, settings).await;

    let path = store.dir().join(CLASSIFICATIONS_FILE);
    std::fs::write(&path, serde_json::to_string_pretty(&records)?)?;
    info!("Wrote {} classifications to {}", records.len(), path.display());
    Ok(path)
}

#[derive(Serialize)]
struct ClassifyRequest<'a> {
    items: &'a [ClassifyItem],
}

#[derive(Deserialize)]
struct ClassifyResponse {
    #[serde(default)]
    results: Vec<ClassificationRecord>,
}

/// [`Classifier`] backed by an HTTP endpoint
///
/// Sends `POST {"items": [...]}` and expects `{"results": [...]}`.
pub struct HttpClassifier {
    client: Client,
    endpoint: Url,
    api_key: Option<String>,
}

impl HttpClassifier {
    pub fn new(client: Client, endpoint: Url, api_key: Option<String>) -> Self {
        Self {
            client,
            endpoint,
            api_key,
        }
    }

    /// Builds the classifier from configuration
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - No endpoint is configured
    /// * `Ok(Some(HttpClassifier))` - Ready to use
    /// * `Err(SitewalkError)` - The endpoint is not a URL or the client failed to build
    pub fn from_config(
        config: &ClassifierConfig,
        timeout: Duration,
    ) -> Result<Option<Self>, SitewalkError> {
        let Some(endpoint) = &config.endpoint else {
            return Ok(None);
        };
        let endpoint = Url::parse(endpoint)?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Some(Self::new(client, endpoint, config.resolved_api_key())))
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn classify_batch(
        &self,
        items: &[ClassifyItem],
    ) -> Result<Vec<ClassificationRecord>, CallError> {
        let mut request = self
            .client
            .post(self.endpoint.clone())
            .json(&ClassifyRequest { items });
        if let Some(key) = &self.api_key {
            request = request.header(AUTHORIZATION, format!("Bearer {}", key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| CallError::from(crate::crawler::FetchError::from_reqwest(&e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let kind = match status {
                StatusCode::TOO_MANY_REQUESTS => ErrorKind::RateLimit,
                StatusCode::UNAUTHORIZED => ErrorKind::Auth,
                _ => ErrorKind::HttpStatus,
            };
            let message = format!("HTTP {}: {}", status.as_u16(), body.trim());
            return Err(CallError::new(kind, message).with_status(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| CallError::from(crate::crawler::FetchError::from_reqwest(&e)))?;
        let parsed: ClassifyResponse = serde_json::from_str(&body)
            .map_err(|e| CallError::new(ErrorKind::Parse, format!("Bad classifier response: {}", e)))?;
        Ok(parsed.results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::RetryPolicy;
    use std::sync::Mutex;

    fn items(n: usize) -> Vec<ClassifyItem> {
        (0..n)
            .map(|i| ClassifyItem {
                url: format!("https://example.com/{}/", i),
                title: Some(format!("Page {}", i)),
                text: "text".to_string(),
            })
            .collect()
    }

    fn settings() -> DispatchSettings {
        DispatchSettings::sequential(6000, RetryPolicy::default())
    }

    /// Answers for every item except those whose index is listed in `drop`
    struct Dropping {
        drop: Vec<usize>,
        batches: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl Classifier for Dropping {
        async fn classify_batch(
            &self,
            items: &[ClassifyItem],
        ) -> Result<Vec<ClassificationRecord>, CallError> {
            self.batches.lock().unwrap().push(items.len());
            Ok(items
                .iter()
                .filter(|item| {
                    !self
                        .drop
                        .iter()
                        .any(|i| item.url == format!("https://example.com/{}/", i))
                })
                .rev()
                .map(|item| ClassificationRecord {
                    url: item.url.clone(),
                    title: None,
                    page_type: "article".to_string(),
                    confidence: 0.9,
                    reasoning: "looks like an article".to_string(),
                    error: None,
                })
                .collect())
        }
    }

    /// Answers the first `answered` items in order, without echoing URLs
    struct Positional {
        answered: usize,
    }

    #[async_trait]
    impl Classifier for Positional {
        async fn classify_batch(
            &self,
            items: &[ClassifyItem],
        ) -> Result<Vec<ClassificationRecord>, CallError> {
            Ok((0..self.answered.min(items.len()))
                .map(|i| ClassificationRecord {
                    url: String::new(),
                    title: None,
                    page_type: format!("type-{}", i),
                    confidence: 0.5,
                    reasoning: String::new(),
                    error: None,
                })
                .collect())
        }
    }

    struct Failing;

    #[async_trait]
    impl Classifier for Failing {
        async fn classify_batch(
            &self,
            _items: &[ClassifyItem],
        ) -> Result<Vec<ClassificationRecord>, CallError> {
            Err(CallError::new(ErrorKind::Auth, "HTTP 401: bad key").with_status(401))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_response_is_padded_in_order() {
        let classifier = Arc::new(Dropping {
            drop: vec![3, 7],
            batches: Mutex::new(Vec::new()),
        });
        let records = classify_all(classifier.clone(), items(10), 10, &settings()).await;

        assert_eq!(records.len(), 10);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.url, format!("https://example.com/{}/", i));
        }
        assert_eq!(records[3].page_type, FALLBACK_PAGE_TYPE);
        assert_eq!(records[3].confidence, 0.0);
        assert_eq!(records[7].page_type, FALLBACK_PAGE_TYPE);
        assert_eq!(records[0].page_type, "article");
        assert_eq!(records[0].title.as_deref(), Some("Page 0"));
        assert_eq!(*classifier.batches.lock().unwrap(), vec![10]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_records_without_urls_align_by_position() {
        let records =
            classify_all(Arc::new(Positional { answered: 8 }), items(10), 10, &settings()).await;

        assert_eq!(records.len(), 10);
        for (i, record) in records.iter().enumerate().take(8) {
            assert_eq!(record.url, format!("https://example.com/{}/", i));
            assert_eq!(record.page_type, format!("type-{}", i));
            assert_eq!(record.title.as_deref(), Some(format!("Page {}", i).as_str()));
        }
        assert_eq!(records[8].page_type, FALLBACK_PAGE_TYPE);
        assert_eq!(records[9].page_type, FALLBACK_PAGE_TYPE);
        assert_eq!(records[9].url, "https://example.com/9/");
    }

    #[test]
    fn test_record_without_url_deserializes() {
        let record: ClassificationRecord =
            serde_json::from_str(r#"{"pageType": "menu", "confidence": 0.4}"#).unwrap();
        assert_eq!(record.url, "");
        assert_eq!(record.page_type, "menu");
    }

    #[tokio::test(start_paused = true)]
    async fn test_items_are_chunked() {
        let classifier = Arc::new(Dropping {
            drop: vec![],
            batches: Mutex::new(Vec::new()),
        });
        let records = classify_all(classifier.clone(), items(23), 10, &settings()).await;
        assert_eq!(records.len(), 23);
        assert_eq!(*classifier.batches.lock().unwrap(), vec![10, 10, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_chunk_keeps_length() {
        let records = classify_all(Arc::new(Failing), items(4), 3, &settings()).await;
        assert_eq!(records.len(), 4);
        assert!(records.iter().all(|r| r.error.is_some()));
        assert!(records.iter().all(|r| r.page_type == FALLBACK_PAGE_TYPE));
    }
}
