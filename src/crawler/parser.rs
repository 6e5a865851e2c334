//! HTML parser for extracting links and page content
//!
//! This module handles parsing HTML content to extract:
//! - Anchor targets to follow
//! - Page title
//! - Visible body text
//! - Image sources

use crate::url::{is_skippable, resolve_link};
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Elements whose text is never part of the visible page text
const INVISIBLE_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Extracted information from an HTML page
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    /// The page title (from <title> tag)
    pub title: Option<String>,

    /// Absolute http(s) anchor targets, in document order
    pub links: Vec<Url>,

    /// Visible body text with whitespace collapsed
    pub text: String,

    /// Absolute image sources, in document order
    pub images: Vec<Url>,
}

/// Parses HTML content and extracts links and content
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` targets that resolve to http(s) URLs
///
/// **Exclude:**
/// - `javascript:`, `mailto:`, `tel:`, `data:`, `file:` targets
/// - Fragment-only targets (same page anchors)
/// - Targets that cannot be resolved against the page URL
///
/// Domain filtering is left to the caller.
///
/// # Arguments
///
/// * `html` - The HTML content to parse
/// * `base_url` - The page URL, used to resolve relative links
///
/// # Example
///
/// ```
/// use sitewalk::crawler::parse_html;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let parsed = parse_html(html, &base_url);
/// assert_eq!(parsed.title, Some("Test".to_string()));
/// assert_eq!(parsed.links[0].as_str(), "https://example.com/page");
/// ```
pub fn parse_html(html: &str, base_url: &Url) -> ParsedPage {
    let document = Html::parse_document(html);

    ParsedPage {
        title: extract_title(&document),
        links: extract_links(&document, base_url),
        text: extract_text(&document),
        images: extract_images(&document, base_url),
    }
}

/// Extracts only the anchor targets of a page
pub fn extract_links(document: &Html, base_url: &Url) -> Vec<Url> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| resolve_anchor(href, base_url))
        .collect()
}

/// Convenience wrapper for callers that only need links from raw HTML
pub fn links_in(html: &str, base_url: &Url) -> Vec<Url> {
    extract_links(&Html::parse_document(html), base_url)
}

fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn extract_text(document: &Html) -> String {
    let root = Selector::parse("body")
        .ok()
        .and_then(|selector| document.select(&selector).next())
        .unwrap_or_else(|| document.root_element());

    let mut words: Vec<&str> = Vec::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(ElementRef::wrap)
            .is_some_and(|parent| INVISIBLE_ELEMENTS.contains(&parent.value().name()));
        if !hidden {
            words.extend(text.split_whitespace());
        }
    }
    words.join(" ")
}

fn extract_images(document: &Html, base_url: &Url) -> Vec<Url> {
    let Ok(selector) = Selector::parse("img[src]") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|element| element.value().attr("src"))
        .filter(|src| !is_skippable(src))
        .filter_map(|src| resolve_link(base_url, src))
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .collect()
}

/// Resolves an anchor href to an absolute http(s) URL
fn resolve_anchor(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') || is_skippable(href) {
        return None;
    }

    resolve_link(base_url, href).filter(|url| matches!(url.scheme(), "http" | "https"))
}
