//! Sitewalk main entry point
//!
//! This is the command-line interface for the Sitewalk crawl orchestrator.

use anyhow::{bail, Context};
use clap::Parser;
use sitewalk::config::{load_config_with_hash, Config};
use sitewalk::crawler::{Coordinator, Fetcher, HtmlProcessor, HttpFetcher};
use sitewalk::discovery::UrlDiscovery;
use sitewalk::dispatch::classify::{classify_artifacts, HttpClassifier};
use sitewalk::dispatch::DispatchSettings;
use sitewalk::output::{
    load_statistics, print_site_structure, print_statistics, ArtifactStore,
};
use sitewalk::revalidate::{Notifier, RevalidateClient};
use sitewalk::storage::open_storage;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Sitewalk: a polite same-site crawl orchestrator
///
/// Sitewalk discovers the pages of one website from its sitemaps and links,
/// fetches them under a requests-per-minute budget, records one result per
/// page and tells a downstream cache what changed.
#[derive(Parser, Debug)]
#[command(name = "sitewalk")]
#[command(version)]
#[command(about = "A polite same-site crawl orchestrator", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without crawling
    #[arg(long, conflicts_with_all = ["stats", "discover_only", "classify"])]
    dry_run: bool,

    /// Show statistics of the latest run and exit
    #[arg(long, conflicts_with_all = ["dry_run", "discover_only", "classify"])]
    stats: bool,

    /// Run URL discovery only and print the records as JSON
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "classify"])]
    discover_only: bool,

    /// Classify the page artifacts in DIR and exit
    #[arg(long, value_name = "DIR", conflicts_with_all = ["dry_run", "stats", "discover_only"])]
    classify: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.discover_only {
        handle_discover_only(&config).await?;
    } else if let Some(dir) = &cli.classify {
        handle_classify(&config, dir).await?;
    } else {
        handle_crawl(config, config_hash).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sitewalk=info,warn"),
            1 => EnvFilter::new("sitewalk=debug,info"),
            2 => EnvFilter::new("sitewalk=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn build_fetcher(config: &Config) -> anyhow::Result<Arc<dyn Fetcher>> {
    let fetcher = HttpFetcher::from_config(&config.user_agent, config.crawler.timeout())
        .context("building HTTP client")?;
    Ok(Arc::new(fetcher))
}

/// Handles the --dry-run mode: shows the resolved settings
fn handle_dry_run(config: &Config) {
    println!("=== Sitewalk Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Base URL: {}", config.crawler.base_url);
    println!("  Mode: {:?}", config.crawler.mode);
    println!("  Max depth: {}", config.crawler.max_depth);
    println!("  Max URLs: {}", config.crawler.max_urls);
    println!(
        "  Delay between requests: {}ms",
        config.crawler.delay_between_requests
    );
    println!("  Prefer sitemap: {}", config.crawler.prefer_sitemap);
    println!("  Respect robots.txt: {}", config.crawler.respect_robots_txt);

    let settings =
        DispatchSettings::from_config(&config.dispatch, config.crawler.politeness_delay());
    println!("\nDispatch:");
    println!("  Requests per minute: {}", settings.requests_per_minute);
    println!("  Max retries: {}", settings.retry.max_retries);
    match settings.concurrency {
        Some(c) => println!(
            "  Concurrent: {} workers, batches of {}",
            c.workers, c.batch_size
        ),
        None => println!("  Sequential"),
    }

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    match &config.output.artifact_dir {
        Some(dir) => println!("  Artifacts: {}", dir),
        None => println!("  Artifacts: disabled"),
    }

    println!("\nRevalidation:");
    match config.revalidate.resolved_url() {
        Some(url) if config.revalidate.resolved_secret().is_some() => {
            println!("  Endpoint: {}", url)
        }
        _ => println!("  Not configured"),
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(Path::new(&config.output.database_path))?;

    match load_statistics(&storage)? {
        Some(stats) => print_statistics(&stats),
        None => println!("No runs recorded yet"),
    }

    Ok(())
}

/// Handles the --discover-only mode: prints discovered URL records
async fn handle_discover_only(config: &Config) -> anyhow::Result<()> {
    let discovery = UrlDiscovery::from_config(build_fetcher(config)?, config)?;
    let records = discovery
        .discover_all(
            &config.crawler.base_url,
            config.crawler.max_urls,
            config.crawler.max_depth,
            config.crawler.prefer_sitemap,
        )
        .await?;

    tracing::info!("Discovered {} URLs", records.len());
    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}

/// Handles the --classify mode: classifies stored page artifacts
async fn handle_classify(config: &Config, dir: &Path) -> anyhow::Result<()> {
    let Some(classifier) = HttpClassifier::from_config(&config.classifier, config.crawler.timeout())?
    else {
        bail!("no classifier endpoint configured");
    };

    let settings =
        DispatchSettings::from_config(&config.dispatch, config.crawler.politeness_delay())
            .with_requests_per_minute(config.classifier.requests_per_minute);
    let store = ArtifactStore::open(dir)?;

    let path = classify_artifacts(
        &store,
        Arc::new(classifier),
        config.classifier.max_batch_size,
        &settings,
    )
    .await?;

    println!("✓ Classifications written to: {}", path.display());
    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, config_hash: String) -> anyhow::Result<()> {
    tracing::info!(
        "Crawling {} ({:?} mode, max {} URLs, depth {})",
        config.crawler.base_url,
        config.crawler.mode,
        config.crawler.max_urls,
        config.crawler.max_depth
    );

    let fetcher = build_fetcher(&config)?;
    let artifacts = config
        .output
        .artifact_dir
        .as_deref()
        .map(ArtifactStore::open)
        .transpose()?;
    let storage = open_storage(Path::new(&config.output.database_path))?;
    let notifier = Notifier::from_config(
        RevalidateClient::from_config(&config.revalidate)?,
        &config.revalidate,
    );
    if !notifier.is_configured() {
        tracing::warn!("Revalidation endpoint or secret missing; cache will not be notified");
    }

    let mut coordinator = Coordinator::new(
        config,
        fetcher,
        Arc::new(HtmlProcessor::new(artifacts)),
        Box::new(storage),
        notifier,
    )?
    .with_config_hash(config_hash);

    let shutdown = coordinator.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received; finishing the batch in flight");
            shutdown.store(true, Ordering::SeqCst);
        }
    });

    let report = match coordinator.run().await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            return Err(e.into());
        }
    };

    print_site_structure(&report.structure);
    println!("\nRun #{}", report.run_id);
    println!("Cache invalidation: {}", report.invalidation);
    if report.interrupted {
        println!("Run was interrupted");
    }

    Ok(())
}
