//! Integration tests for URL discovery
//!
//! Sitemaps and pages are served by wiremock and fetched through the real
//! HTTP fetcher.

use sitewalk::config::parse_config;
use sitewalk::crawler::{Coordinator, DiscoverySource, Fetcher, HtmlProcessor, HttpFetcher};
use sitewalk::discovery::UrlDiscovery;
use sitewalk::revalidate::Notifier;
use sitewalk::storage::SqliteStorage;
use sitewalk::{Config, UrlState};
use std::collections::HashSet;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn create_test_config(base_url: &str, mode: &str, max_urls: usize) -> Config {
    let content = format!(
        r#"
[crawler]
base-url = "{base_url}"
mode = "{mode}"
max-depth = 2
max-urls = {max_urls}
delay-between-requests = 0

[dispatch]
requests-per-minute = 6000

[discovery]
sitemap-paths = ["/sitemap.xml"]

[user-agent]
crawler-name = "TestBot"
crawler-version = "1.0.0"
contact-url = "https://example.com/contact"
contact-email = "test@example.com"

[output]
database-path = ":memory:"
"#
    );
    parse_config(&content).expect("test config should parse")
}

fn fetcher(config: &Config) -> Arc<dyn Fetcher> {
    Arc::new(
        HttpFetcher::from_config(&config.user_agent, config.crawler.timeout())
            .expect("client should build"),
    )
}

fn xml(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body)
        .insert_header("content-type", "application/xml")
}

fn url_set(base: &str, paths: &[&str]) -> String {
    let urls: String = paths
        .iter()
        .map(|p| format!("<url><loc>{}{}</loc><lastmod>2024-05-01</lastmod></url>", base, p))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{}</urlset>"#,
        urls
    )
}

async fn mount(server: &MockServer, at: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(response)
        .mount(server)
        .await;
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(format!("<html><body>{}</body></html>", body))
        .insert_header("content-type", "text/html")
}

/// Index from robots.txt, three child sitemaps of five URLs, two repeated
async fn mount_sitemap_index(server: &MockServer) {
    let base = server.uri();
    mount(
        server,
        "/robots.txt",
        ResponseTemplate::new(200).set_body_string(format!(
            "User-agent: *\nAllow: /\nSitemap: {}/sitemap_index.xml\n",
            base
        )),
    )
    .await;
    mount(
        server,
        "/sitemap_index.xml",
        xml(format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <sitemap><loc>{0}/sitemap-1.xml</loc></sitemap>
  <sitemap><loc>{0}/sitemap-2.xml</loc></sitemap>
  <sitemap><loc>{0}/sitemap-3.xml</loc></sitemap>
</sitemapindex>"#,
            base
        )),
    )
    .await;
    mount(
        server,
        "/sitemap-1.xml",
        xml(url_set(&base, &["/a/", "/b/", "/c/", "/d/", "/e/"])),
    )
    .await;
    mount(
        server,
        "/sitemap-2.xml",
        xml(url_set(&base, &["/a", "/b/", "/f/", "/g/", "/h/"])),
    )
    .await;
    mount(
        server,
        "/sitemap-3.xml",
        xml(url_set(&base, &["/i/", "/j/", "/k/", "/l/", "/m/"])),
    )
    .await;
}

#[tokio::test]
async fn test_sitemap_index_respects_budget_and_dedupes() {
    let server = MockServer::start().await;
    mount_sitemap_index(&server).await;

    let config = create_test_config(&server.uri(), "pages", 10);
    let discovery = UrlDiscovery::from_config(fetcher(&config), &config).unwrap();
    let records = discovery
        .discover_all(&server.uri(), 10, 2, true)
        .await
        .unwrap();

    assert_eq!(records.len(), 10);
    let distinct: HashSet<&str> = records.iter().map(|r| r.url.as_str()).collect();
    assert_eq!(distinct.len(), 10);
    assert!(records.iter().all(|r| r.source == DiscoverySource::Sitemap));
    assert_eq!(records[0].lastmod.as_deref(), Some("2024-05-01"));

    let last = records.last().unwrap();
    assert_eq!(last.url.as_str(), format!("{}/j/", server.uri()));
}

#[tokio::test]
async fn test_link_discovery_fills_in_without_sitemap() {
    let server = MockServer::start().await;

    mount(&server, "/", html(r#"<a href="/one">1</a><a href="/two">2</a>"#)).await;
    mount(&server, "/one/", html(r#"<a href="/three">3</a>"#)).await;
    mount(&server, "/two/", html("leaf")).await;
    mount(&server, "/three/", html("leaf")).await;

    let config = create_test_config(&server.uri(), "pages", 10);
    let discovery = UrlDiscovery::from_config(fetcher(&config), &config).unwrap();
    let records = discovery
        .discover_all(&server.uri(), 10, 2, true)
        .await
        .unwrap();

    let paths: Vec<&str> = records.iter().map(|r| r.url.path()).collect();
    assert_eq!(paths, vec!["/", "/one/", "/two/", "/three/"]);
    assert!(records.iter().all(|r| r.source != DiscoverySource::Sitemap));
}

#[tokio::test]
async fn test_sitemap_ignored_when_not_preferred() {
    let server = MockServer::start().await;
    mount_sitemap_index(&server).await;
    mount(&server, "/", html(r#"<a href="/only">Only</a>"#)).await;
    mount(&server, "/only/", html("leaf")).await;

    let config = create_test_config(&server.uri(), "pages", 10);
    let discovery = UrlDiscovery::from_config(fetcher(&config), &config).unwrap();
    let records = discovery
        .discover_all(&server.uri(), 10, 2, false)
        .await
        .unwrap();

    assert_eq!(records.len(), 2);
    let requests = server.received_requests().await.unwrap();
    assert!(requests.iter().all(|r| !r.url.path().ends_with(".xml")));
}

#[tokio::test]
async fn test_pages_mode_crawls_discovered_list() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount(
        &server,
        "/sitemap.xml",
        xml(url_set(&base, &["/", "/news/", "/about/"])),
    )
    .await;
    Mock::given(method("HEAD"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    mount(&server, "/", html(r#"<a href="/not-listed">Hidden</a>"#)).await;
    mount(&server, "/news/", html("news")).await;
    mount(&server, "/about/", html("about")).await;

    let config = create_test_config(&base, "pages", 3);
    let fetcher = fetcher(&config);
    let mut coordinator = Coordinator::new(
        config,
        fetcher,
        Arc::new(HtmlProcessor::default()),
        Box::new(SqliteStorage::new_in_memory().unwrap()),
        Notifier::disabled(),
    )
    .unwrap();

    let report = coordinator.run().await.unwrap();

    assert_eq!(report.results.len(), 3);
    assert!(report.results.iter().all(|r| r.state == UrlState::Success));
    assert!(report.results.iter().all(|r| r.depth == 0));

    let requests = server.received_requests().await.unwrap();
    assert!(requests.iter().all(|r| r.url.path() != "/not-listed/"));
}
