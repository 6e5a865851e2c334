//! Storage traits and error types
//!
//! This module defines the trait interface for the run ledger and
//! associated error types.

use crate::crawler::CrawlResult;
use crate::output::SiteStructure;
use crate::state::UrlState;
use crate::storage::{RunRecord, RunStatus};
use crate::ErrorKind;
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for run ledger backends
///
/// Results are written one at a time as they are produced, so a run that is
/// interrupted keeps every result recorded before the interruption.
pub trait Storage: Send {
    // ===== Run Management =====

    /// Creates a new run in the `running` state
    ///
    /// # Arguments
    ///
    /// * `base_url` - Seed URL of the run
    /// * `mode` - `site` or `pages`
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, base_url: &str, mode: &str, config_hash: &str) -> StorageResult<i64>;

    /// Writes the final aggregate, status and invalidation outcome of a run
    fn finish_run(
        &mut self,
        run_id: i64,
        site: &SiteStructure,
        status: RunStatus,
        invalidation: Option<&str>,
    ) -> StorageResult<()>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    // ===== Results =====

    /// Records one per-URL result
    ///
    /// A second result for the same URL in the same run replaces the first.
    fn record_result(&mut self, run_id: i64, result: &CrawlResult) -> StorageResult<()>;

    /// Loads all results of a run in the order they were recorded
    fn load_results(&self, run_id: i64) -> StorageResult<Vec<CrawlResult>>;

    // ===== Statistics =====

    fn count_results_by_state(&self, run_id: i64) -> StorageResult<HashMap<UrlState, u64>>;

    /// Counts failed results by error kind
    fn error_summary(&self, run_id: i64) -> StorageResult<HashMap<ErrorKind, u64>>;
}
