//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and run
//! full crawls end-to-end through the real HTTP fetcher.

use sitewalk::config::{parse_config, Config};
use sitewalk::crawler::{Coordinator, CrawlReport, HtmlProcessor, HttpFetcher};
use sitewalk::output::ArtifactStore;
use sitewalk::revalidate::Notifier;
use sitewalk::storage::{open_storage, RunStatus, SqliteStorage, Storage};
use sitewalk::{ErrorKind, UrlState};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration crawling `base_url`
fn create_test_config(base_url: &str, db_path: &str, extra: &str) -> Config {
    let content = format!(
        r#"
[crawler]
base-url = "{base_url}"
max-depth = 3
max-urls = 50
delay-between-requests = 0
request-timeout = 5
{extra}

[dispatch]
requests-per-minute = 6000
safety-margin = 0

[user-agent]
crawler-name = "TestBot"
crawler-version = "1.0.0"
contact-url = "https://example.com/contact"
contact-email = "test@example.com"

[output]
database-path = "{db_path}"
"#
    );
    parse_config(&content).expect("test config should parse")
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(format!(
            "<html><head><title>Test</title></head><body>{}</body></html>",
            body
        ))
        .insert_header("content-type", "text/html; charset=utf-8")
}

async fn mount_page(server: &MockServer, page_path: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(html(body))
        .mount(server)
        .await;
}

async fn crawl(
    config: Config,
    storage: SqliteStorage,
    artifacts: Option<ArtifactStore>,
) -> (CrawlReport, Box<dyn Storage>) {
    let fetcher = HttpFetcher::from_config(&config.user_agent, config.crawler.timeout())
        .expect("client should build");
    let mut coordinator = Coordinator::new(
        config,
        Arc::new(fetcher),
        Arc::new(HtmlProcessor::new(artifacts)),
        Box::new(storage),
        Notifier::disabled(),
    )
    .expect("coordinator should build");

    let report = coordinator.run().await.expect("crawl should finish");
    (report, coordinator.into_storage())
}

#[tokio::test]
async fn test_cycle_is_visited_once_per_page() {
    let server = MockServer::start().await;
    let base_url = server.uri();

    mount_page(&server, "/", r#"<a href="/b">B</a>"#).await;
    mount_page(&server, "/b/", r#"<a href="/c">C</a>"#).await;
    mount_page(&server, "/c/", r#"<a href="/">Home</a><a href="/b/">B again</a>"#).await;

    let config = create_test_config(&base_url, ":memory:", "");
    let (report, _) = crawl(config, SqliteStorage::new_in_memory().unwrap(), None).await;

    let visited: Vec<(String, u32)> = report
        .results
        .iter()
        .map(|r| (r.url.trim_start_matches(&base_url).to_string(), r.depth))
        .collect();
    assert_eq!(
        visited,
        vec![
            ("/".to_string(), 0),
            ("/b/".to_string(), 1),
            ("/c/".to_string(), 2)
        ]
    );
    assert!(report.results.iter().all(|r| r.state == UrlState::Success));
    assert!(!report.interrupted);

    let requests = server.received_requests().await.unwrap();
    let page_hits = requests.iter().filter(|r| r.url.path() == "/").count();
    assert_eq!(page_hits, 1);
}

#[tokio::test]
async fn test_off_domain_links_are_not_followed() {
    let server = MockServer::start().await;
    let other = MockServer::start().await;

    mount_page(
        &server,
        "/",
        &format!(r#"<a href="{}/elsewhere">Away</a><a href="/local">Local</a>"#, other.uri()),
    )
    .await;
    mount_page(&server, "/local/", "local page").await;
    mount_page(&other, "/elsewhere/", "should not be fetched").await;

    let config = create_test_config(&server.uri(), ":memory:", "");
    let (report, _) = crawl(config, SqliteStorage::new_in_memory().unwrap(), None).await;

    assert_eq!(report.results.len(), 2);
    assert!(other.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failures_are_recorded_and_crawl_continues() {
    let server = MockServer::start().await;

    mount_page(
        &server,
        "/",
        r#"<a href="/missing">Gone</a><a href="/feed.txt">Feed</a><a href="/ok">OK</a>"#,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/missing/"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/feed.txt"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("plain text")
                .insert_header("content-type", "text/plain"),
        )
        .mount(&server)
        .await;
    mount_page(&server, "/ok/", "fine").await;

    let config = create_test_config(&server.uri(), ":memory:", "");
    let (report, storage) = crawl(config, SqliteStorage::new_in_memory().unwrap(), None).await;

    assert_eq!(report.results.len(), 4);
    assert_eq!(report.structure.successful_pages, 2);
    assert_eq!(report.structure.skipped_pages, 2);

    let kinds: Vec<Option<ErrorKind>> = report
        .results
        .iter()
        .filter(|r| r.state == UrlState::Skipped)
        .map(|r| r.error_kind)
        .collect();
    assert!(kinds.contains(&Some(ErrorKind::HttpStatus)));
    assert!(kinds.contains(&Some(ErrorKind::ContentType)));

    let summary = storage.error_summary(report.run_id).unwrap();
    assert_eq!(summary.get(&ErrorKind::HttpStatus), Some(&1));
    assert_eq!(summary.get(&ErrorKind::ContentType), Some(&1));
}

#[tokio::test]
async fn test_depth_limit() {
    let server = MockServer::start().await;

    mount_page(&server, "/", r#"<a href="/one">1</a>"#).await;
    mount_page(&server, "/one/", r#"<a href="/two">2</a>"#).await;
    mount_page(&server, "/two/", r#"<a href="/three">3</a>"#).await;
    mount_page(&server, "/three/", "too deep").await;

    let mut config = create_test_config(&server.uri(), ":memory:", "");
    config.crawler.max_depth = 1;
    let (report, _) = crawl(config, SqliteStorage::new_in_memory().unwrap(), None).await;

    assert_eq!(report.results.len(), 2);
    assert!(report.results.iter().all(|r| r.depth <= 1));
}

#[tokio::test]
async fn test_throttled_page_is_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "1"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_page(&server, "/", "after the wait").await;

    let config = create_test_config(&server.uri(), ":memory:", "");
    let (report, _) = crawl(config, SqliteStorage::new_in_memory().unwrap(), None).await;

    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].state, UrlState::Success);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_robots_disallow_is_respected() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private/\n"),
        )
        .mount(&server)
        .await;
    mount_page(
        &server,
        "/",
        r#"<a href="/private/">Secret</a><a href="/public">Public</a>"#,
    )
    .await;
    mount_page(&server, "/public/", "open").await;
    mount_page(&server, "/private/", "closed").await;

    let config = create_test_config(&server.uri(), ":memory:", "respect-robots-txt = true");
    let (report, _) = crawl(config, SqliteStorage::new_in_memory().unwrap(), None).await;

    let private = report
        .results
        .iter()
        .find(|r| r.url.ends_with("/private/"))
        .expect("disallowed page should still have a result");
    assert_eq!(private.state, UrlState::Skipped);
    assert_eq!(private.error_kind, None);

    let requests = server.received_requests().await.unwrap();
    assert!(requests.iter().all(|r| r.url.path() != "/private/"));
}

#[tokio::test]
async fn test_ledger_and_artifacts_persist() {
    let server = MockServer::start().await;

    mount_page(
        &server,
        "/",
        r#"<h1>Welcome</h1><img src="/logo.png"><a href="/about">About</a>"#,
    )
    .await;
    mount_page(&server, "/about/", "<p>About us</p>").await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("ledger.db");
    let artifact_dir = dir.path().join("artifacts");
    let db = db_path.to_string_lossy().to_string();

    let config = create_test_config(&server.uri(), &db, "");
    let storage = SqliteStorage::new(Path::new(&db)).unwrap();
    let store = ArtifactStore::open(&artifact_dir).unwrap();
    let (report, storage) = crawl(config, storage, Some(store.clone())).await;
    drop(storage);

    let reopened = open_storage(&db_path).unwrap();
    let run = reopened.get_latest_run().unwrap().expect("run should be stored");
    assert_eq!(run.id, report.run_id);
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.total_pages, 2);
    assert_eq!(run.successful_pages, 2);
    assert_eq!(run.total_images, 1);
    assert_eq!(reopened.load_results(run.id).unwrap().len(), 2);

    let artifacts = store.load_all().unwrap();
    assert_eq!(artifacts.len(), 2);
    let home = artifacts
        .iter()
        .find(|a| a.url == format!("{}/", server.uri()))
        .expect("home artifact");
    assert_eq!(home.images.len(), 1);
    assert!(home.text.contains("Welcome"));
}
