//! Output module for run reports
//!
//! This module handles:
//! - Statistics over the finished index (`STATISTICS.txt`)
//! - The failure log of retrieval and extraction failures
//! - The per-source download summary of the ledger

mod failures;
pub mod stats;
mod summary;

pub use failures::{render_failure_log, FailureRecord, FailureStage};
pub use stats::{format_thousands, print_statistics, Statistics};
pub use summary::render_download_summary;

use crate::storage::{write_atomic_with_timeout, RunLayout};
use std::io;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while writing reports
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write report {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Rendered reports of one run
#[derive(Debug, Clone)]
pub struct Reports {
    pub statistics: String,
    pub failure_log: String,
    pub download_summary: String,
}

impl Reports {
    /// Writes all reports under the layout's report directory
    pub async fn write(&self, layout: &RunLayout, timeout: Duration) -> OutputResult<()> {
        write_report(&layout.statistics_path(), &self.statistics, timeout).await?;
        write_report(&layout.failure_log_path(), &self.failure_log, timeout).await?;
        write_report(&layout.summary_path(), &self.download_summary, timeout).await?;
        tracing::info!("Reports written to {}", layout.reports_dir().display());
        Ok(())
    }
}

async fn write_report(path: &Path, contents: &str, timeout: Duration) -> OutputResult<()> {
    write_atomic_with_timeout(path.to_path_buf(), contents.as_bytes().to_vec(), timeout)
        .await
        .map_err(|e| OutputError::Write {
            path: path.display().to_string(),
            source: e,
        })
}
