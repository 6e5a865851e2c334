//! Integration tests for batch page classification over HTTP

use chrono::Utc;
use serde_json::json;
use sitewalk::dispatch::classify::{
    classify_artifacts, ClassificationRecord, HttpClassifier, CLASSIFICATIONS_FILE,
    FALLBACK_PAGE_TYPE,
};
use sitewalk::dispatch::{DispatchSettings, RetryPolicy};
use sitewalk::output::{ArtifactStore, PageArtifact};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn settings() -> DispatchSettings {
    DispatchSettings::sequential(
        6000,
        RetryPolicy {
            max_retries: 2,
            default_wait: Duration::from_millis(50),
            safety_margin: Duration::ZERO,
        },
    )
}

fn store_with_pages(dir: &TempDir, paths: &[&str]) -> ArtifactStore {
    let store = ArtifactStore::open(dir.path()).unwrap();
    for p in paths {
        store
            .write(&PageArtifact {
                url: format!("https://example.com{}", p),
                title: Some(format!("Title {}", p)),
                text: "Opening hours and menu".to_string(),
                links: vec![],
                images: vec![],
                scraped_at: Utc::now(),
            })
            .unwrap();
    }
    store
}

fn classifier(server: &MockServer) -> Arc<HttpClassifier> {
    let endpoint = Url::parse(&format!("{}/classify", server.uri())).unwrap();
    Arc::new(HttpClassifier::new(
        reqwest::Client::new(),
        endpoint,
        Some("key-123".to_string()),
    ))
}

fn read_records(store: &ArtifactStore) -> Vec<ClassificationRecord> {
    let content = std::fs::read_to_string(store.dir().join(CLASSIFICATIONS_FILE)).unwrap();
    serde_json::from_str(&content).unwrap()
}

#[tokio::test]
async fn test_unreturned_pages_get_fallback_records() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/classify"))
        .and(header("authorization", "Bearer key-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {
                    "url": "https://example.com/menu/",
                    "pageType": "menu",
                    "confidence": 0.8,
                    "reasoning": "lists dishes"
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let store = store_with_pages(&dir, &["/about/", "/menu/"]);

    let written = classify_artifacts(&store, classifier(&server), 10, &settings())
        .await
        .unwrap();
    assert!(written.ends_with(CLASSIFICATIONS_FILE));

    let records = read_records(&store);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].url, "https://example.com/about/");
    assert_eq!(records[0].page_type, FALLBACK_PAGE_TYPE);
    assert_eq!(records[1].page_type, "menu");
    assert_eq!(records[1].title.as_deref(), Some("Title /menu/"));
}

#[tokio::test]
async fn test_throttled_batch_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/classify"))
        .respond_with(
            ResponseTemplate::new(429).set_body_string("RESOURCE_EXHAUSTED: please retry in 0.1s"),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/classify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {"url": "https://example.com/a/", "pageType": "article", "confidence": 0.7}
            ]
        })))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let store = store_with_pages(&dir, &["/a/"]);

    classify_artifacts(&store, classifier(&server), 10, &settings())
        .await
        .unwrap();

    let records = read_records(&store);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].page_type, "article");
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_rejected_key_marks_every_record_failed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let store = store_with_pages(&dir, &["/a/", "/b/", "/c/"]);

    classify_artifacts(&store, classifier(&server), 2, &settings())
        .await
        .unwrap();

    let records = read_records(&store);
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.error.is_some()));
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}
