//! The search index: model, builder and persistence
//!
//! The index is rebuilt from scratch on every indexing run from the artifacts
//! the ledger references. Ids are assigned densely from 1 in ledger order, so
//! rebuilding against an unchanged ledger reproduces the same ids.

mod builder;

pub use builder::{IndexBuild, IndexFailure, Indexer};

use crate::storage::{write_atomic, write_atomic_with_timeout};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Placeholder date for documents without a known date
pub const UNKNOWN_DATE: &str = "Various";

/// Placeholder page label for whole documents
pub const WHOLE_DOCUMENT_PAGES: &str = "Multiple";

/// Index-specific errors
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Failed to write index: {0}")]
    Write(#[source] io::Error),

    #[error("Failed to read index {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Index {path} is not valid: {message}")]
    Parse { path: String, message: String },

    #[error("Failed to serialize index: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// One searchable document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedDocument {
    /// Dense, 1-based id local to this index build
    pub id: u64,

    pub title: String,

    /// `"<source name> - Entry #<entry number>"`
    #[serde(rename = "source")]
    pub source_label: String,

    pub date: String,

    #[serde(rename = "page")]
    pub page_label: String,

    pub content: String,

    pub filename: String,
}

impl IndexedDocument {
    /// Source name part of the label
    pub fn source_name(&self) -> &str {
        match self.source_label.rsplit_once(" - Entry #") {
            Some((name, _)) => name,
            None => &self.source_label,
        }
    }
}

/// The terminal artifact of the pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    /// `YYYY-MM-DD`
    #[serde(rename = "lastUpdated")]
    pub last_updated: String,

    #[serde(rename = "totalDocuments")]
    pub total_count: usize,

    pub source: String,

    pub disclaimer: String,

    pub documents: Vec<IndexedDocument>,
}

impl Index {
    pub fn to_json(&self) -> Result<Vec<u8>, IndexError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }
}

/// Writes the index atomically
pub fn write_index(index: &Index, path: &Path) -> Result<(), IndexError> {
    let bytes = index.to_json()?;
    write_atomic(path, &bytes).map_err(IndexError::Write)
}

/// Writes the index atomically on a blocking thread, bounded by `timeout`
pub async fn write_index_with_timeout(
    index: &Index,
    path: &Path,
    timeout: Duration,
) -> Result<(), IndexError> {
    let bytes = index.to_json()?;
    write_atomic_with_timeout(path.to_path_buf(), bytes, timeout)
        .await
        .map_err(IndexError::Write)
}

/// Reads a previously written index
pub fn read_index(path: &Path) -> Result<Index, IndexError> {
    let content = std::fs::read_to_string(path).map_err(|e| IndexError::Read {
        path: path.display().to_string(),
        source: e,
    })?;

    serde_json::from_str(&content).map_err(|e| IndexError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}
