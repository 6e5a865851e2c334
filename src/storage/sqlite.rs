//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::crawler::CrawlResult;
use crate::output::SiteStructure;
use crate::state::UrlState;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{RunRecord, RunStatus};
use crate::{ErrorKind, SitewalkError};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;

const RUN_COLUMNS: &str = "id, base_url, mode, started_at, finished_at, config_hash, status, \
     total_pages, successful_pages, failed_pages, skipped_pages, total_text_length, \
     total_images, invalidation";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(SitewalkError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, SitewalkError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> Result<Self, SitewalkError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        base_url: row.get(1)?,
        mode: row.get(2)?,
        started_at: row.get(3)?,
        finished_at: row.get(4)?,
        config_hash: row.get(5)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(6)?)
            .unwrap_or(RunStatus::Running),
        total_pages: row.get(7)?,
        successful_pages: row.get(8)?,
        failed_pages: row.get(9)?,
        skipped_pages: row.get(10)?,
        total_text_length: row.get(11)?,
        total_images: row.get(12)?,
        invalidation: row.get(13)?,
    })
}

/// Raw column values of a `results` row
struct ResultRow {
    url: String,
    title: Option<String>,
    state: String,
    depth: u32,
    text_length: i64,
    image_count: i64,
    error_kind: Option<String>,
    error_message: Option<String>,
    scraped_at: String,
}

impl ResultRow {
    fn into_result(self) -> StorageResult<CrawlResult> {
        let state = UrlState::from_db_string(&self.state)
            .ok_or_else(|| StorageError::Corrupt(format!("unknown state '{}'", self.state)))?;
        let error_kind = match self.error_kind.as_deref() {
            Some(kind) => Some(
                ErrorKind::from_str_opt(kind)
                    .ok_or_else(|| StorageError::Corrupt(format!("unknown error kind '{}'", kind)))?,
            ),
            None => None,
        };
        let scraped_at = DateTime::parse_from_rfc3339(&self.scraped_at)
            .map_err(|e| StorageError::Corrupt(format!("bad timestamp: {}", e)))?
            .with_timezone(&Utc);

        Ok(CrawlResult {
            url: self.url,
            title: self.title,
            state,
            depth: self.depth,
            text_length: self.text_length.max(0) as usize,
            image_count: self.image_count.max(0) as usize,
            error_kind,
            error_message: self.error_message,
            scraped_at,
        })
    }
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, base_url: &str, mode: &str, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (base_url, mode, started_at, config_hash, status)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                base_url,
                mode,
                now,
                config_hash,
                RunStatus::Running.to_db_string()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        site: &SiteStructure,
        status: RunStatus,
        invalidation: Option<&str>,
    ) -> StorageResult<()> {
        let finished_at = site.end_time.unwrap_or_else(Utc::now).to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, total_pages = ?3,
                 successful_pages = ?4, failed_pages = ?5, skipped_pages = ?6,
                 total_text_length = ?7, total_images = ?8, invalidation = ?9
             WHERE id = ?10",
            params![
                status.to_db_string(),
                finished_at,
                site.total_pages as i64,
                site.successful_pages as i64,
                site.failed_pages as i64,
                site.skipped_pages as i64,
                site.total_text_length as i64,
                site.total_images as i64,
                invalidation,
                run_id
            ],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        let sql = format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS);
        self.conn
            .query_row(&sql, params![run_id], run_from_row)
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let sql = format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS);
        Ok(self.conn.query_row(&sql, [], run_from_row).optional()?)
    }

    // ===== Results =====

    fn record_result(&mut self, run_id: i64, result: &CrawlResult) -> StorageResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO results
                 (run_id, url, title, state, depth, text_length, image_count,
                  error_kind, error_message, scraped_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                run_id,
                result.url,
                result.title,
                result.state.to_db_string(),
                result.depth,
                result.text_length as i64,
                result.image_count as i64,
                result.error_kind.map(|k| k.as_str()),
                result.error_message,
                result.scraped_at.to_rfc3339()
            ],
        )?;
        Ok(())
    }

    fn load_results(&self, run_id: i64) -> StorageResult<Vec<CrawlResult>> {
        let mut stmt = self.conn.prepare(
            "SELECT url, title, state, depth, text_length, image_count,
                    error_kind, error_message, scraped_at
             FROM results WHERE run_id = ?1 ORDER BY id",
        )?;

        let rows = stmt
            .query_map(params![run_id], |row| {
                Ok(ResultRow {
                    url: row.get(0)?,
                    title: row.get(1)?,
                    state: row.get(2)?,
                    depth: row.get(3)?,
                    text_length: row.get(4)?,
                    image_count: row.get(5)?,
                    error_kind: row.get(6)?,
                    error_message: row.get(7)?,
                    scraped_at: row.get(8)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(ResultRow::into_result).collect()
    }

    // ===== Statistics =====

    fn count_results_by_state(&self, run_id: i64) -> StorageResult<HashMap<UrlState, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT state, COUNT(*) FROM results WHERE run_id = ?1 GROUP BY state")?;

        let mut counts = HashMap::new();
        let rows = stmt.query_map(params![run_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (state, count) = row?;
            if let Some(state) = UrlState::from_db_string(&state) {
                counts.insert(state, count as u64);
            }
        }
        Ok(counts)
    }

    fn error_summary(&self, run_id: i64) -> StorageResult<HashMap<ErrorKind, u64>> {
        let mut stmt = self.conn.prepare(
            "SELECT error_kind, COUNT(*) FROM results
             WHERE run_id = ?1 AND error_kind IS NOT NULL
             GROUP BY error_kind",
        )?;

        let mut summary = HashMap::new();
        let rows = stmt.query_map(params![run_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (kind, count) = row?;
            if let Some(kind) = ErrorKind::from_str_opt(&kind) {
                summary.insert(kind, count as u64);
            }
        }
        Ok(summary)
    }
}
