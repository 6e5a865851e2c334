//! Configuration module for Sitewalk
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use sitewalk::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("sitewalk.toml")).unwrap();
//! println!("Crawling {} up to depth {}", config.crawler.base_url, config.crawler.max_depth);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    ClassifierConfig, Config, CrawlMode, CrawlerConfig, DiscoveryConfig, DispatchConfig,
    DispatchMode, OutputConfig, RevalidateConfig, UserAgentConfig, CLASSIFIER_API_KEY_ENV,
    DEFAULT_SITEMAP_PATHS, REVALIDATE_SECRET_ENV, REVALIDATE_URL_ENV,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
