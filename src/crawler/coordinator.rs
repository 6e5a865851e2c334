//! Crawler coordinator - main crawl orchestration logic
//!
//! This module drives a run from start to finish:
//! - Opening a run in the ledger
//! - Pulling URLs from the frontier (site mode) or a discovered list (pages mode)
//! - Dispatching fetches under the rate budget
//! - Recording one result per URL as soon as it is known
//! - Feeding links from successful pages back into the frontier
//! - Finalizing the run and notifying the downstream cache

use crate::config::{Config, CrawlMode};
use crate::crawler::fetcher::{FetchedPage, Fetcher};
use crate::crawler::frontier::{DiscoverySource, Frontier, FrontierEntry};
use crate::crawler::parser::links_in;
use crate::crawler::processor::PageProcessor;
use crate::crawler::result::CrawlResult;
use crate::discovery::{UrlDiscovery, UrlRecord};
use crate::dispatch::{CallError, DispatchRun, DispatchSettings, Dispatched, Operation};
use crate::output::SiteStructure;
use crate::revalidate::{InvalidationStatus, Notifier};
use crate::robots::{fetch_robots, ParsedRobots};
use crate::storage::{RunStatus, Storage};
use crate::url::{canonicalize, CanonicalUrl, ExcludeMatcher};
use crate::{ErrorKind, SitewalkError, UrlState};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use url::Url;

/// Log a progress line every this many pages
const PROGRESS_INTERVAL: usize = 10;

/// Page fetching as a dispatched operation
struct FetchPage {
    fetcher: Arc<dyn Fetcher>,
}

#[async_trait]
impl Operation for FetchPage {
    type Item = FrontierEntry;
    type Output = FetchedPage;

    async fn call(&self, entry: &FrontierEntry) -> Result<FetchedPage, CallError> {
        self.fetcher
            .fetch_page(entry.url.as_url())
            .await
            .map_err(CallError::from)
    }
}

/// Everything a finished (or interrupted) run produced
#[derive(Debug)]
pub struct CrawlReport {
    pub run_id: i64,
    pub structure: SiteStructure,
    /// One result per dispatched URL, in the order they were recorded
    pub results: Vec<CrawlResult>,
    pub invalidation: InvalidationStatus,
    pub interrupted: bool,
}

/// Mutable state of the run in progress
struct RunState {
    run_id: i64,
    structure: SiteStructure,
    results: Vec<CrawlResult>,
    started: Instant,
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    fetcher: Arc<dyn Fetcher>,
    processor: Arc<dyn PageProcessor>,
    storage: Box<dyn Storage>,
    notifier: Notifier,
    exclude: ExcludeMatcher,
    shutdown: Arc<AtomicBool>,
    config_hash: String,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The validated configuration
    /// * `fetcher` - Fetches pages, robots.txt and sitemaps
    /// * `processor` - Handles every successfully fetched page
    /// * `storage` - Run ledger
    /// * `notifier` - Post-run cache invalidation
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run
    /// * `Err(SitewalkError)` - An exclude pattern does not compile
    pub fn new(
        config: Config,
        fetcher: Arc<dyn Fetcher>,
        processor: Arc<dyn PageProcessor>,
        storage: Box<dyn Storage>,
        notifier: Notifier,
    ) -> Result<Self, SitewalkError> {
        let exclude = ExcludeMatcher::new(config.discovery.exclude_patterns.as_slice())?;
        Ok(Self {
            config: Arc::new(config),
            fetcher,
            processor,
            storage,
            notifier,
            exclude,
            shutdown: Arc::new(AtomicBool::new(false)),
            config_hash: String::new(),
        })
    }

    /// Sets the configuration hash stored on the run record
    pub fn with_config_hash(mut self, config_hash: impl Into<String>) -> Self {
        self.config_hash = config_hash.into();
        self
    }

    /// Flag that stops the run after the batch in flight
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    /// Gives back the ledger, e.g. to read statistics after a run
    pub fn into_storage(self) -> Box<dyn Storage> {
        self.storage
    }

    fn stop_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Runs a crawl in the configured mode
    pub async fn run(&mut self) -> Result<CrawlReport, SitewalkError> {
        match self.config.crawler.mode {
            CrawlMode::Site => self.run_site().await,
            CrawlMode::Pages => {
                let discovery = UrlDiscovery::from_config(self.fetcher.clone(), &self.config)?;
                let records = discovery
                    .discover_all(
                        &self.config.crawler.base_url,
                        self.config.crawler.max_urls,
                        self.config.crawler.max_depth,
                        self.config.crawler.prefer_sitemap,
                    )
                    .await?;
                info!("Discovered {} URLs", records.len());
                self.run_pages(records).await
            }
        }
    }

    /// Breadth-first crawl of the site from the base URL
    ///
    /// Links from a batch are enqueued only after the whole batch returned,
    /// and only links of successful pages are followed.
    pub async fn run_site(&mut self) -> Result<CrawlReport, SitewalkError> {
        let crawler = self.config.crawler.clone();
        let mut frontier = Frontier::new(&crawler.base_url, Some(crawler.max_depth))?;
        let mut state = self.start_run("site")?;
        let robots = self.load_robots().await?;

        let settings =
            DispatchSettings::from_config(&self.config.dispatch, crawler.politeness_delay());
        let mut dispatch = DispatchRun::new(
            FetchPage {
                fetcher: self.fetcher.clone(),
            },
            &settings,
        );

        let mut dispatched = 0usize;
        let mut interrupted = false;

        while !frontier.is_empty() {
            if self.stop_requested() {
                interrupted = true;
                break;
            }
            if dispatched >= crawler.max_urls {
                info!("URL budget of {} reached", crawler.max_urls);
                break;
            }
            if dispatched > 0 && !crawler.politeness_delay().is_zero() {
                sleep(crawler.politeness_delay()).await;
            }

            let take = dispatch.batch_capacity().min(crawler.max_urls - dispatched);
            let batch = frontier.next_batch(take);
            dispatched += batch.len();

            let allowed = self.filter_robots(batch, robots.as_ref(), &mut state)?;
            let outcomes = dispatch.dispatch(allowed).await;

            let mut discovered = Vec::new();
            for outcome in outcomes {
                let depth = outcome.item.depth;
                let (result, links) = self.complete(outcome).await;
                self.record(&mut state, result)?;
                discovered.extend(links.into_iter().map(|link| (link, depth + 1)));
            }

            for (link, depth) in discovered {
                frontier.enqueue(link.as_str(), depth, DiscoverySource::Link);
            }

            self.log_progress(&state, frontier.len());
        }

        if frontier.is_empty() && !interrupted {
            info!("Frontier is empty, crawl complete");
        }
        info!("Visited {} distinct URLs", frontier.visited_count());

        self.finish_run(state, interrupted).await
    }

    /// Crawls a pre-discovered URL list without following links
    pub async fn run_pages(&mut self, records: Vec<UrlRecord>) -> Result<CrawlReport, SitewalkError> {
        let mut state = self.start_run("pages")?;
        let robots = self.load_robots().await?;

        let settings = DispatchSettings::from_config(
            &self.config.dispatch,
            self.config.crawler.politeness_delay(),
        );
        let mut dispatch = DispatchRun::new(
            FetchPage {
                fetcher: self.fetcher.clone(),
            },
            &settings,
        );

        let mut seen: HashSet<CanonicalUrl> = HashSet::new();
        let entries: Vec<FrontierEntry> = records
            .into_iter()
            .filter(|record| seen.insert(record.url.clone()))
            .map(|record| FrontierEntry {
                url: record.url,
                depth: 0,
                discovered_at: chrono::Utc::now(),
                source: record.source,
            })
            .take(self.config.crawler.max_urls)
            .collect();
        let mut pending = entries.into_iter();

        let mut interrupted = false;
        let mut first = true;

        while !pending.as_slice().is_empty() {
            if self.stop_requested() {
                interrupted = true;
                break;
            }
            if !first && !self.config.crawler.politeness_delay().is_zero() {
                sleep(self.config.crawler.politeness_delay()).await;
            }
            first = false;

            let batch: Vec<FrontierEntry> =
                pending.by_ref().take(dispatch.batch_capacity()).collect();
            let allowed = self.filter_robots(batch, robots.as_ref(), &mut state)?;
            for outcome in dispatch.dispatch(allowed).await {
                let (result, _links) = self.complete(outcome).await;
                self.record(&mut state, result)?;
            }

            self.log_progress(&state, pending.len());
        }

        self.finish_run(state, interrupted).await
    }

    fn start_run(&mut self, mode: &str) -> Result<RunState, SitewalkError> {
        let base = canonicalize(&self.config.crawler.base_url)?;
        let run_id = self
            .storage
            .create_run(base.as_str(), mode, &self.config_hash)?;
        info!("Starting crawl run {} of {} ({} mode)", run_id, base, mode);

        Ok(RunState {
            run_id,
            structure: SiteStructure::new(base.as_str()),
            results: Vec::new(),
            started: Instant::now(),
        })
    }

    async fn load_robots(&self) -> Result<Option<ParsedRobots>, SitewalkError> {
        if !self.config.crawler.respect_robots_txt {
            return Ok(None);
        }
        let base = Url::parse(&self.config.crawler.base_url)?;
        Ok(Some(fetch_robots(self.fetcher.as_ref(), &base).await))
    }

    /// Records disallowed entries as skipped and returns the rest
    fn filter_robots(
        &mut self,
        batch: Vec<FrontierEntry>,
        robots: Option<&ParsedRobots>,
        state: &mut RunState,
    ) -> Result<Vec<FrontierEntry>, SitewalkError> {
        let Some(robots) = robots else {
            return Ok(batch);
        };

        let agent = self.config.user_agent.crawler_name.clone();
        let mut allowed = Vec::with_capacity(batch.len());
        for entry in batch {
            if robots.is_allowed(entry.url.as_str(), &agent) {
                allowed.push(entry);
            } else {
                debug!("{} disallowed by robots.txt", entry.url);
                let result =
                    CrawlResult::skipped(entry.url.as_str(), entry.depth, "Disallowed by robots.txt");
                self.record(state, result)?;
            }
        }
        Ok(allowed)
    }

    /// Turns a dispatch outcome into a result and the links to follow
    async fn complete(
        &self,
        outcome: Dispatched<FrontierEntry, FetchedPage>,
    ) -> (CrawlResult, Vec<Url>) {
        let entry = outcome.item;

        let page = match outcome.result {
            Ok(page) => page,
            Err(failure) => {
                debug!("Fetch of {} failed: {}", entry.url, failure);
                let result = CrawlResult::failure(
                    entry.url.as_str(),
                    entry.depth,
                    failure.kind(),
                    failure.to_string(),
                );
                return (result, Vec::new());
            }
        };

        match self.processor.process(&entry.url, &page).await {
            Ok(processed) => {
                let links = links_in(&page.html, &page.final_url)
                    .into_iter()
                    .filter(|link| !self.exclude.is_excluded(link.as_str()))
                    .collect();
                let result = CrawlResult::success(
                    entry.url.as_str(),
                    entry.depth,
                    processed.title,
                    processed.text_length,
                    processed.image_count,
                );
                (result, links)
            }
            Err(e) => {
                warn!("Processing {} failed: {}", entry.url, e);
                let result = CrawlResult::failure(
                    entry.url.as_str(),
                    entry.depth,
                    ErrorKind::Processing,
                    e.to_string(),
                );
                (result, Vec::new())
            }
        }
    }

    /// Stores one result immediately and folds it into the aggregate
    fn record(&mut self, state: &mut RunState, result: CrawlResult) -> Result<(), SitewalkError> {
        debug_assert!(
            UrlState::Visited.can_transition_to(result.state),
            "recorded {} in non-terminal state {}",
            result.url,
            result.state
        );
        self.storage.record_result(state.run_id, &result)?;
        state.structure.record(&result);
        state.results.push(result);
        Ok(())
    }

    fn log_progress(&self, state: &RunState, pending: usize) {
        let done = state.results.len();
        if done == 0 || done % PROGRESS_INTERVAL != 0 {
            return;
        }
        let elapsed = state.started.elapsed().as_secs_f64();
        let rate = if elapsed > 0.0 { done as f64 / elapsed } else { 0.0 };
        info!(
            "Progress: {} pages crawled, {} pending, {:.2} pages/sec",
            done, pending, rate
        );
    }

    async fn finish_run(
        &mut self,
        mut state: RunState,
        interrupted: bool,
    ) -> Result<CrawlReport, SitewalkError> {
        state.structure.finish();

        let invalidation = if interrupted {
            InvalidationStatus::Skipped("run interrupted")
        } else {
            let host = canonicalize(&state.structure.base_url)?
                .as_url()
                .host_str()
                .unwrap_or_default()
                .to_string();
            self.notifier.notify(&host, &state.results).await
        };

        let status = if interrupted {
            warn!("Crawl interrupted; keeping {} recorded results", state.results.len());
            RunStatus::Interrupted
        } else {
            RunStatus::Completed
        };
        self.storage.finish_run(
            state.run_id,
            &state.structure,
            status,
            Some(&invalidation.to_string()),
        )?;

        info!(
            "Crawl finished: {} pages ({} ok, {} failed) in {:.1}s",
            state.structure.total_pages,
            state.structure.successful_pages,
            state.structure.failed_pages,
            state.started.elapsed().as_secs_f64()
        );

        Ok(CrawlReport {
            run_id: state.run_id,
            structure: state.structure,
            results: state.results,
            invalidation,
            interrupted,
        })
    }
}
