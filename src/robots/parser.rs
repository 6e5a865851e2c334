//! Robots.txt parser implementation
//!
//! Access rules are matched with the robotstxt crate; `Sitemap:` lines are
//! read directly since they apply to every user agent.

use robotstxt::DefaultMatcher;

/// Parsed robots.txt data
#[derive(Debug, Clone)]
pub struct ParsedRobots {
    /// Raw robots.txt content (empty string means allow all)
    content: String,
    /// Absolute sitemap URLs in file order
    sitemaps: Vec<String>,
}

impl ParsedRobots {
    /// Creates a new ParsedRobots from raw robots.txt content
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
            sitemaps: extract_sitemaps(content),
        }
    }

    /// Creates a permissive ParsedRobots that allows everything
    ///
    /// Used when robots.txt is missing or cannot be fetched.
    pub fn allow_all() -> Self {
        Self {
            content: String::new(),
            sitemaps: Vec::new(),
        }
    }

    /// Sitemap URLs declared with `Sitemap:` directives
    pub fn sitemaps(&self) -> &[String] {
        &self.sitemaps
    }

    /// Checks if a URL is allowed for the given user agent
    ///
    /// # Arguments
    ///
    /// * `url` - Absolute URL to check
    /// * `user_agent` - The product token of the crawler
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        if self.content.is_empty() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, user_agent, url)
    }
}

fn extract_sitemaps(content: &str) -> Vec<String> {
    let mut sitemaps = Vec::new();
    for line in content.lines() {
        let line = match line.split_once('#') {
            Some((before, _)) => before,
            None => line,
        };
        if let Some((key, value)) = line.trim().split_once(':') {
            let value = value.trim();
            if key.trim().eq_ignore_ascii_case("sitemap")
                && !value.is_empty()
                && !sitemaps.iter().any(|s| s == value)
            {
                sitemaps.push(value.to_string());
            }
        }
    }
    sitemaps
}
