use crate::config::types::{
    ClassifierConfig, Config, CrawlerConfig, DiscoveryConfig, DispatchConfig, OutputConfig,
    RevalidateConfig, UserAgentConfig,
};
use crate::url::{is_valid_http_url, ExcludeMatcher};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_dispatch_config(&config.dispatch)?;
    validate_discovery_config(&config.discovery)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_revalidate_config(&config.revalidate)?;
    validate_classifier_config(&config.classifier)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if !is_valid_http_url(&config.base_url) {
        return Err(ConfigError::InvalidUrl(format!(
            "base_url must be an http(s) URL with a host, got '{}'",
            config.base_url
        )));
    }

    if config.max_urls < 1 {
        return Err(ConfigError::Validation(format!(
            "max_urls must be >= 1, got {}",
            config.max_urls
        )));
    }

    if config.request_timeout < 1 {
        return Err(ConfigError::Validation(
            "request_timeout must be at least 1 second".to_string(),
        ));
    }

    Ok(())
}

fn validate_dispatch_config(config: &DispatchConfig) -> Result<(), ConfigError> {
    if config.requests_per_minute < 1 || config.requests_per_minute > 6000 {
        return Err(ConfigError::Validation(format!(
            "requests_per_minute must be between 1 and 6000, got {}",
            config.requests_per_minute
        )));
    }

    if config.workers < 1 || config.workers > 8 {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and 8, got {}",
            config.workers
        )));
    }

    if config.batch_size < 1 {
        return Err(ConfigError::Validation(format!(
            "batch_size must be >= 1, got {}",
            config.batch_size
        )));
    }

    Ok(())
}

fn validate_discovery_config(config: &DiscoveryConfig) -> Result<(), ConfigError> {
    ExcludeMatcher::new(config.exclude_patterns.as_slice())?;

    for path in &config.sitemap_paths {
        if !path.starts_with('/') {
            return Err(ConfigError::Validation(format!(
                "sitemap path '{}' must start with '/'",
                path
            )));
        }
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if config.artifact_dir.as_deref() == Some("") {
        return Err(ConfigError::Validation(
            "artifact_dir cannot be empty when set".to_string(),
        ));
    }

    Ok(())
}

fn validate_revalidate_config(config: &RevalidateConfig) -> Result<(), ConfigError> {
    if let Some(url) = &config.url {
        if !is_valid_http_url(url) {
            return Err(ConfigError::InvalidUrl(format!(
                "Invalid revalidate url: '{}'",
                url
            )));
        }
    }

    if let Some(namespace) = &config.namespace {
        if namespace.is_empty() || namespace.contains('/') {
            return Err(ConfigError::Validation(format!(
                "revalidate namespace must be a single non-empty path segment, got '{}'",
                namespace
            )));
        }
    }

    if config.prefix_threshold < 1 {
        return Err(ConfigError::Validation(
            "prefix_threshold must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_classifier_config(config: &ClassifierConfig) -> Result<(), ConfigError> {
    if let Some(endpoint) = &config.endpoint {
        if !is_valid_http_url(endpoint) {
            return Err(ConfigError::InvalidUrl(format!(
                "Invalid classifier endpoint: '{}'",
                endpoint
            )));
        }
    }

    if config.max_batch_size < 1 || config.max_batch_size > 50 {
        return Err(ConfigError::Validation(format!(
            "classifier max_batch_size must be between 1 and 50, got {}",
            config.max_batch_size
        )));
    }

    if config.requests_per_minute < 1 {
        return Err(ConfigError::Validation(
            "classifier requests_per_minute must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    let (local, domain) = email.split_once('@').ok_or_else(|| {
        ConfigError::Validation(format!("Invalid email format: '{}'", email))
    })?;

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
