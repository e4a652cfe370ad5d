//! Generic entity loader shared by every record type.

use anyhow::{Context, Result};
use serde::Serialize;

use super::committer::BatchCommitter;
use super::records::Record;
use super::source::{RowError, RowSource};
use crate::models::EntityKind;
use crate::storage::Repository;

/// Per-entity load lifecycle, persisted in the `load_runs` ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadState {
    NotStarted,
    InProgress,
    Completed,
    PartiallyFailed,
}

impl LoadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadState::NotStarted => "not_started",
            LoadState::InProgress => "in_progress",
            LoadState::Completed => "completed",
            LoadState::PartiallyFailed => "partially_failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "not_started" => Some(LoadState::NotStarted),
            "in_progress" => Some(LoadState::InProgress),
            "completed" => Some(LoadState::Completed),
            "partially_failed" => Some(LoadState::PartiallyFailed),
            _ => None,
        }
    }

    /// Whether the entity reached end of file at least once
    pub fn is_finished(&self) -> bool {
        matches!(self, LoadState::Completed | LoadState::PartiallyFailed)
    }
}

/// Loader tuning
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub error_sample_limit: usize,
    pub error_message_max_len: usize,
    pub progress_interval: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            error_sample_limit: 10,
            error_message_max_len: 200,
            progress_interval: 1000,
        }
    }
}

/// Outcome of loading one source into one table
#[derive(Debug, Clone, Serialize)]
pub struct LoadSummary {
    pub entity: EntityKind,
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
}

impl LoadSummary {
    pub fn new(entity: EntityKind) -> Self {
        Self {
            entity,
            success: 0,
            failed: 0,
            skipped: 0,
            errors: Vec::new(),
        }
    }

    pub fn state(&self) -> LoadState {
        if self.failed == 0 {
            LoadState::Completed
        } else {
            LoadState::PartiallyFailed
        }
    }

    fn record_failure(&mut self, row: usize, err: &RowError, opts: &LoadOptions) {
        self.failed += 1;
        if self.errors.len() < opts.error_sample_limit {
            let message: String = err
                .to_string()
                .chars()
                .take(opts.error_message_max_len)
                .collect();
            self.errors.push(format!("row {}: {}", row, message));
        }
        tracing::debug!(entity = %self.entity, row, "Row rejected: {}", err);
    }
}

/// Loader entry point as stored in the load plan
pub type LoadFn = fn(&Repository, &mut RowSource, &LoadOptions) -> Result<LoadSummary>;

/// Load every row of `source` as records of type `E`.
///
/// Bad rows are counted and sampled, never fatal. Rows whose key is already
/// stored are skipped. An I/O failure on the source or a failed batch commit
/// aborts the load; batches committed before it stay committed.
pub fn load_entity<E: Record>(
    repo: &Repository,
    source: &mut RowSource,
    opts: &LoadOptions,
) -> Result<LoadSummary> {
    let conn = repo.conn();
    let mut summary = LoadSummary::new(E::KIND);
    let mut committer = BatchCommitter::new(conn, E::KIND.batch_size());
    let mut row_number = 0usize;

    tracing::info!("Loading {}", E::KIND);

    while let Some(next) = source.next_row() {
        row_number += 1;

        let raw = match next {
            Ok(raw) => raw,
            Err(e) if e.is_io_error() => {
                return Err(e).with_context(|| {
                    format!("Failed to read {} source at row {}", E::KIND, row_number)
                });
            }
            Err(e) => {
                summary.record_failure(row_number, &RowError::from(e), opts);
                continue;
            }
        };

        let staged = E::from_row(&raw).and_then(|record| {
            if record.exists(conn)? {
                return Ok(false);
            }
            committer.stage(|c| record.insert(c))?;
            Ok(true)
        });

        match staged {
            Ok(true) => {
                summary.success += 1;
                committer.commit_if_full().with_context(|| {
                    format!("Failed to commit {} batch at row {}", E::KIND, row_number)
                })?;
            }
            Ok(false) => summary.skipped += 1,
            Err(e) => summary.record_failure(row_number, &e, opts),
        }

        if opts.progress_interval > 0 && row_number % opts.progress_interval == 0 {
            tracing::info!(
                "  {} progress: {} rows ({} ok, {} failed, {} skipped)",
                E::KIND,
                row_number,
                summary.success,
                summary.failed,
                summary.skipped
            );
        }
    }

    let committed = committer
        .finish()
        .with_context(|| format!("Failed to commit final {} batch", E::KIND))?;

    tracing::info!(
        entity = %E::KIND,
        committed,
        success = summary.success,
        failed = summary.failed,
        skipped = summary.skipped,
        "Finished loading {}",
        E::KIND
    );

    Ok(summary)
}
