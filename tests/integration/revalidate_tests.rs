//! Integration tests for post-run cache invalidation

use serde_json::json;
use sitewalk::config::parse_config;
use sitewalk::crawler::{Coordinator, HtmlProcessor, HttpFetcher};
use sitewalk::revalidate::{
    InvalidationStatus, Notifier, RevalidateClient, RevalidateError, RevalidateRequest,
};
use sitewalk::storage::{SqliteStorage, Storage};
use sitewalk::CrawlResult;
use std::sync::Arc;
use url::Url;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SECRET: &str = "s3cret";

fn client(server: &MockServer) -> RevalidateClient {
    let url = Url::parse(&format!("{}/api/revalidate", server.uri())).unwrap();
    RevalidateClient::new(reqwest::Client::new(), url, SECRET)
}

fn successes(count: usize) -> Vec<CrawlResult> {
    (0..count)
        .map(|i| CrawlResult::success(format!("https://example.com/p{}/", i), 1, None, 100, 0))
        .collect()
}

#[tokio::test]
async fn test_paths_sent_with_bearer_secret() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/revalidate"))
        .and(header("authorization", "Bearer s3cret"))
        .and(body_json(json!({"paths": ["/a/", "/b/"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "revalidatedPaths": ["/a/", "/b/"]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = client(&server)
        .revalidate_paths(vec!["/a/".to_string(), "/b/".to_string()])
        .await
        .unwrap();

    assert!(response.success);
    assert_eq!(response.revalidated_paths.len(), 2);
}

#[tokio::test]
async fn test_error_responses() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_json(json!({"keys": ["unauthorized"]})))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_json(json!({"keys": ["broken"]})))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_json(json!({"keys": ["garbled"]})))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let client = client(&server);
    let err = client
        .invalidate_keys(vec!["unauthorized".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, RevalidateError::Unauthorized));

    let err = client
        .invalidate_keys(vec!["broken".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, RevalidateError::Status(500)));

    let err = client
        .invalidate_keys(vec!["garbled".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, RevalidateError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_empty_request_is_not_sent() {
    let server = MockServer::start().await;

    let err = client(&server)
        .revalidate(&RevalidateRequest::default())
        .await
        .unwrap_err();

    assert!(matches!(err, RevalidateError::EmptyRequest));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_notifier_switches_to_prefix_above_threshold() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_json(json!({"prefix": "tokyo-shibuya/"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "invalidatedByPrefix": 11
        })))
        .expect(1)
        .mount(&server)
        .await;

    let notifier = Notifier::new(Some(client(&server)), Some("tokyo-shibuya".to_string()), 10);
    let status = notifier.notify("example.com", &successes(11)).await;

    match &status {
        InvalidationStatus::Revalidated { request, response } => {
            assert_eq!(request.prefix.as_deref(), Some("tokyo-shibuya/"));
            assert_eq!(response.invalidated_by_prefix, 11);
        }
        other => panic!("unexpected status: {}", other),
    }
    assert_eq!(status.to_string(), "invalidated prefix tokyo-shibuya/ (11 entries)");
}

#[tokio::test]
async fn test_notifier_sends_namespaced_paths_at_threshold() {
    let server = MockServer::start().await;
    let expected: Vec<String> = (0..10).map(|i| format!("/tokyo-shibuya/p{}/", i)).collect();
    Mock::given(method("POST"))
        .and(body_json(json!({ "paths": expected })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "revalidatedPaths": expected
        })))
        .expect(1)
        .mount(&server)
        .await;

    let notifier = Notifier::new(Some(client(&server)), Some("tokyo-shibuya".to_string()), 10);
    let status = notifier.notify("example.com", &successes(10)).await;

    assert_eq!(status.to_string(), "revalidated 10 of 10 paths");
}

#[tokio::test]
async fn test_notifier_failure_is_reported_not_raised() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let notifier = Notifier::new(Some(client(&server)), None, 10);
    let status = notifier.notify("example.com", &successes(2)).await;

    assert!(status.is_failure());
    assert_eq!(status.to_string(), "failed: HTTP 503");
}

#[tokio::test]
async fn test_crawl_run_notifies_and_stores_outcome() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"<html><body><a href="/news">News</a></body></html>"#)
                .insert_header("content-type", "text/html"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/news/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html><body>News</body></html>")
                .insert_header("content-type", "text/html"),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/revalidate"))
        .and(header("authorization", "Bearer s3cret"))
        .and(body_json(json!({"paths": ["/", "/news/"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "revalidatedPaths": ["/", "/news/"]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = parse_config(&format!(
        r#"
[crawler]
base-url = "{base}"
max-depth = 2
max-urls = 10
delay-between-requests = 0

[dispatch]
requests-per-minute = 6000

[user-agent]
crawler-name = "TestBot"
crawler-version = "1.0.0"
contact-url = "https://example.com/contact"
contact-email = "test@example.com"

[output]
database-path = ":memory:"

[revalidate]
url = "{base}/api/revalidate"
secret = "{SECRET}"
"#
    ))
    .unwrap();

    let notifier = Notifier::from_config(
        RevalidateClient::from_config(&config.revalidate).unwrap(),
        &config.revalidate,
    );
    assert!(notifier.is_configured());

    let fetcher =
        HttpFetcher::from_config(&config.user_agent, config.crawler.timeout()).unwrap();
    let mut coordinator = Coordinator::new(
        config,
        Arc::new(fetcher),
        Arc::new(HtmlProcessor::default()),
        Box::new(SqliteStorage::new_in_memory().unwrap()),
        notifier,
    )
    .unwrap();

    let report = coordinator.run().await.unwrap();
    assert_eq!(report.invalidation.to_string(), "revalidated 2 of 2 paths");

    let storage = coordinator.into_storage();
    let run = storage.get_run(report.run_id).unwrap();
    assert_eq!(run.invalidation.as_deref(), Some("revalidated 2 of 2 paths"));
}
