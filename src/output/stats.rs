//! Run aggregates and statistics
//!
//! [`SiteStructure`] is accumulated while a run is in progress.
//! [`RunStatistics`] is read back from the ledger for `--stats`.

use crate::crawler::CrawlResult;
use crate::state::UrlState;
use crate::storage::{RunRecord, Storage, StorageResult};
use crate::ErrorKind;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;

/// Aggregate over every result of one run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteStructure {
    pub base_url: String,
    pub total_pages: usize,
    pub successful_pages: usize,
    /// Pages that did not succeed; includes skipped pages
    pub failed_pages: usize,
    pub skipped_pages: usize,
    pub total_text_length: usize,
    pub total_images: usize,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

impl SiteStructure {
    /// Starts an aggregate for a run beginning now
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            total_pages: 0,
            successful_pages: 0,
            failed_pages: 0,
            skipped_pages: 0,
            total_text_length: 0,
            total_images: 0,
            start_time: Utc::now(),
            end_time: None,
        }
    }

    /// Folds one result into the totals
    pub fn record(&mut self, result: &CrawlResult) {
        self.total_pages += 1;
        if result.is_success() {
            self.successful_pages += 1;
            self.total_text_length += result.text_length;
            self.total_images += result.image_count;
        } else {
            self.failed_pages += 1;
            if result.is_skipped() {
                self.skipped_pages += 1;
            }
        }
    }

    /// Stamps the end time
    pub fn finish(&mut self) {
        self.end_time = Some(Utc::now());
    }

    /// Elapsed time, once the run has finished
    pub fn duration(&self) -> Option<Duration> {
        self.end_time.map(|end| end - self.start_time)
    }

    /// Share of pages that succeeded, between 0.0 and 1.0
    pub fn success_rate(&self) -> f64 {
        if self.total_pages == 0 {
            0.0
        } else {
            self.successful_pages as f64 / self.total_pages as f64
        }
    }
}

/// Statistics for one stored run
#[derive(Debug, Clone)]
pub struct RunStatistics {
    pub run: RunRecord,
    pub pages_by_state: HashMap<UrlState, u64>,
    pub errors_by_kind: HashMap<ErrorKind, u64>,
}

/// Loads statistics for the latest run
///
/// # Returns
///
/// * `Ok(Some(RunStatistics))` - The latest run and its breakdowns
/// * `Ok(None)` - The ledger holds no runs
/// * `Err(StorageError)` - The query failed
pub fn load_statistics(storage: &dyn Storage) -> StorageResult<Option<RunStatistics>> {
    let Some(run) = storage.get_latest_run()? else {
        return Ok(None);
    };

    let pages_by_state = storage.count_results_by_state(run.id)?;
    let errors_by_kind = storage.error_summary(run.id)?;

    Ok(Some(RunStatistics {
        run,
        pages_by_state,
        errors_by_kind,
    }))
}

/// Prints the aggregate of a finished run
pub fn print_site_structure(site: &SiteStructure) {
    println!("=== Crawl Summary: {} ===\n", site.base_url);
    println!("  Pages:        {}", site.total_pages);
    println!("  Successful:   {}", site.successful_pages);
    println!(
        "  Failed:       {} ({} skipped)",
        site.failed_pages, site.skipped_pages
    );
    println!("  Text length:  {}", site.total_text_length);
    println!("  Images:       {}", site.total_images);
    if let Some(duration) = site.duration() {
        println!(
            "  Duration:     {:.1}s",
            duration.num_milliseconds() as f64 / 1000.0
        );
    }
    println!("  Success rate: {:.1}%", site.success_rate() * 100.0);
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &RunStatistics) {
    let run = &stats.run;
    println!("=== Run #{} ({}) ===\n", run.id, run.status.to_db_string());
    println!("  Base URL:    {}", run.base_url);
    println!("  Mode:        {}", run.mode);
    println!("  Started:     {}", run.started_at);
    if let Some(finished) = &run.finished_at {
        println!("  Finished:    {}", finished);
    }
    println!("  Config hash: {}", run.config_hash);
    println!();

    println!("Pages by State:");
    let total: u64 = stats.pages_by_state.values().sum();
    let mut state_counts: Vec<_> = stats.pages_by_state.iter().collect();
    state_counts.sort_by(|a, b| b.1.cmp(a.1));
    for (state, count) in state_counts {
        let percentage = if total > 0 {
            (*count as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", state, count, percentage);
    }
    println!();

    if !stats.errors_by_kind.is_empty() {
        println!("Failures by Kind:");
        let mut error_counts: Vec<_> = stats.errors_by_kind.iter().collect();
        error_counts.sort_by(|a, b| b.1.cmp(a.1));
        for (kind, count) in error_counts {
            println!("  {}: {}", kind, count);
        }
        println!();
    }

    if let Some(invalidation) = &run.invalidation {
        println!("Cache invalidation: {}", invalidation);
    }
}
