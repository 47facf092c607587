//! Docket-Harvest: a resumable document acquisition and indexing pipeline
//!
//! This crate enumerates paginated remote document collections, retrieves each
//! document exactly once (tracked by a durable retrieval ledger), extracts
//! searchable text from the retrieved PDFs and assembles a single JSON index.

pub mod config;
pub mod extract;
pub mod harvest;
pub mod index;
pub mod ledger;
pub mod output;
pub mod source;
pub mod storage;

use thiserror::Error;

/// Main error type for Docket-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] ledger::LedgerError),

    #[error("Index error: {0}")]
    Index(#[from] index::IndexError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("Source error: {0}")]
    Source(#[from] source::SourceError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Background task failed: {0}")]
    Task(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Unknown source id: {0}")]
    UnknownSource(String),

    #[error("Output directory {path} is not usable: {reason}")]
    OutputDirectory { path: String, reason: String },
}

/// Result type alias for Docket-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use extract::{ExtractionResult, PdfExtractor, RawArtifact, TextExtractor};
pub use harvest::{DocumentFetcher, Enumerator, FetchOutcome, Pipeline, RunReport};
pub use index::{Index, IndexedDocument, Indexer};
pub use ledger::{Ledger, LedgerEntry};
pub use source::{DocumentKey, DocumentReference, SourceAdapter};
