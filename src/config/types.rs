use serde::Deserialize;
use std::time::Duration;

/// Environment variable consulted when `[revalidate] url` is absent
pub const REVALIDATE_URL_ENV: &str = "REVALIDATE_URL";

/// Environment variable consulted when `[revalidate] secret` is absent
pub const REVALIDATE_SECRET_ENV: &str = "REVALIDATE_SECRET";

/// Environment variable consulted when `[classifier] api-key` is absent
pub const CLASSIFIER_API_KEY_ENV: &str = "CLASSIFIER_API_KEY";

/// Conventional sitemap locations probed when robots.txt names none
pub const DEFAULT_SITEMAP_PATHS: &[&str] = &[
    "/sitemap.xml",
    "/sitemap_index.xml",
    "/sitemaps.xml",
    "/sitemap.php",
    "/wp-sitemap.xml",
];

/// Main configuration structure for Sitewalk
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub revalidate: RevalidateConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
}

/// How the orchestrator obtains the URLs it visits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrawlMode {
    /// Breadth-first traversal from the seed through the frontier
    Site,
    /// Run URL discovery first, then crawl the resulting list
    Pages,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Seed URL; its scheme and host scope the crawl
    #[serde(rename = "base-url")]
    pub base_url: String,

    #[serde(default = "default_crawl_mode")]
    pub mode: CrawlMode,

    /// Maximum link depth from the seed
    #[serde(rename = "max-depth")]
    pub max_depth: u32,

    /// Maximum number of URLs visited (site mode) or discovered (pages mode)
    #[serde(rename = "max-urls")]
    pub max_urls: usize,

    /// Politeness delay between consecutive dispatches (milliseconds)
    #[serde(rename = "delay-between-requests", default = "default_delay")]
    pub delay_between_requests: u64,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout", default = "default_request_timeout")]
    pub request_timeout: u64,

    /// Consult sitemaps before link discovery
    #[serde(rename = "prefer-sitemap", default = "default_true")]
    pub prefer_sitemap: bool,

    /// Skip URLs that robots.txt disallows for our user agent
    #[serde(rename = "respect-robots-txt", default)]
    pub respect_robots_txt: bool,
}

impl CrawlerConfig {
    pub fn politeness_delay(&self) -> Duration {
        Duration::from_millis(self.delay_between_requests)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

/// Which dispatcher implementation to start the run with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    Sequential,
    Concurrent,
}

/// Rate budget, retry policy and concurrency settings for outbound calls
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    #[serde(rename = "requests-per-minute", default = "default_rpm")]
    pub requests_per_minute: u32,

    /// Retries after the first attempt for throttled calls
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Wait used when the server does not say how long to back off (milliseconds)
    #[serde(rename = "default-wait", default = "default_wait")]
    pub default_wait: u64,

    /// Added to a server-provided wait (milliseconds)
    #[serde(rename = "safety-margin", default = "default_safety_margin")]
    pub safety_margin: u64,

    #[serde(default = "default_dispatch_mode")]
    pub mode: DispatchMode,

    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(rename = "batch-size", default = "default_batch_size")]
    pub batch_size: usize,

    /// Pause between concurrent batches (milliseconds)
    #[serde(rename = "batch-pause", default = "default_batch_pause")]
    pub batch_pause: u64,

    /// Smallest politeness delay at which concurrent mode is allowed (milliseconds)
    #[serde(rename = "min-concurrent-delay", default = "default_min_concurrent_delay")]
    pub min_concurrent_delay: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: default_rpm(),
            max_retries: default_max_retries(),
            default_wait: default_wait(),
            safety_margin: default_safety_margin(),
            mode: default_dispatch_mode(),
            workers: default_workers(),
            batch_size: default_batch_size(),
            batch_pause: default_batch_pause(),
            min_concurrent_delay: default_min_concurrent_delay(),
        }
    }
}

/// Inputs to the URL discovery coordinator
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryConfig {
    /// Regexes; a matching absolute URL is never discovered by link traversal
    #[serde(rename = "exclude-patterns", default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,

    /// Paths probed for a sitemap when robots.txt names none
    #[serde(rename = "sitemap-paths", default = "default_sitemap_paths")]
    pub sitemap_paths: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            exclude_patterns: default_exclude_patterns(),
            sitemap_paths: default_sitemap_paths(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the User-Agent header value
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite run ledger
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Directory for per-page JSON artifacts; artifacts are not written when absent
    #[serde(rename = "artifact-dir", default)]
    pub artifact_dir: Option<String>,
}

/// Cache invalidation endpoint settings
#[derive(Debug, Clone, Deserialize)]
pub struct RevalidateConfig {
    pub url: Option<String>,

    pub secret: Option<String>,

    /// Path namespace prepended to changed paths and used as the invalidation prefix
    pub namespace: Option<String>,

    /// Above this many changed paths, invalidate by prefix instead
    #[serde(rename = "prefix-threshold", default = "default_prefix_threshold")]
    pub prefix_threshold: usize,

    /// Request timeout (seconds)
    #[serde(default = "default_revalidate_timeout")]
    pub timeout: u64,
}

impl Default for RevalidateConfig {
    fn default() -> Self {
        Self {
            url: None,
            secret: None,
            namespace: None,
            prefix_threshold: default_prefix_threshold(),
            timeout: default_revalidate_timeout(),
        }
    }
}

impl RevalidateConfig {
    /// Endpoint from the file, falling back to the environment
    pub fn resolved_url(&self) -> Option<String> {
        self.url
            .clone()
            .or_else(|| std::env::var(REVALIDATE_URL_ENV).ok())
            .filter(|s| !s.is_empty())
    }

    /// Shared secret from the file, falling back to the environment
    pub fn resolved_secret(&self) -> Option<String> {
        self.secret
            .clone()
            .or_else(|| std::env::var(REVALIDATE_SECRET_ENV).ok())
            .filter(|s| !s.is_empty())
    }
}

/// Page classification endpoint settings
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
    pub endpoint: Option<String>,

    #[serde(rename = "api-key")]
    pub api_key: Option<String>,

    #[serde(rename = "max-batch-size", default = "default_classifier_batch")]
    pub max_batch_size: usize,

    #[serde(rename = "requests-per-minute", default = "default_classifier_rpm")]
    pub requests_per_minute: u32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            max_batch_size: default_classifier_batch(),
            requests_per_minute: default_classifier_rpm(),
        }
    }
}

impl ClassifierConfig {
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(CLASSIFIER_API_KEY_ENV).ok())
            .filter(|s| !s.is_empty())
    }
}

fn default_crawl_mode() -> CrawlMode {
    CrawlMode::Site
}

fn default_delay() -> u64 {
    500
}

fn default_request_timeout() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

fn default_rpm() -> u32 {
    60
}

fn default_max_retries() -> u32 {
    3
}

fn default_wait() -> u64 {
    15_000
}

fn default_safety_margin() -> u64 {
    1_000
}

fn default_dispatch_mode() -> DispatchMode {
    DispatchMode::Sequential
}

fn default_workers() -> usize {
    2
}

fn default_batch_size() -> usize {
    2
}

fn default_batch_pause() -> u64 {
    5_000
}

fn default_min_concurrent_delay() -> u64 {
    5_000
}

fn default_exclude_patterns() -> Vec<String> {
    crate::url::DEFAULT_EXCLUDE_PATTERNS
        .iter()
        .map(|p| p.to_string())
        .collect()
}

fn default_sitemap_paths() -> Vec<String> {
    DEFAULT_SITEMAP_PATHS.iter().map(|p| p.to_string()).collect()
}

fn default_prefix_threshold() -> usize {
    10
}

fn default_revalidate_timeout() -> u64 {
    30
}

fn default_classifier_batch() -> usize {
    10
}

fn default_classifier_rpm() -> u32 {
    5
}
