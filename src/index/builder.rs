use super::{Index, IndexedDocument, UNKNOWN_DATE, WHOLE_DOCUMENT_PAGES};
use crate::config::IndexConfig;
use crate::extract::{Extraction, RawArtifact, TextExtractor};
use crate::ledger::Ledger;
use crate::source::DocumentKey;
use chrono::Utc;
use std::path::{Path, PathBuf};

/// A ledger entry that did not make it into the index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexFailure {
    pub document_key: DocumentKey,
    pub filename: String,
    pub reason: String,
}

/// Result of one index build
#[derive(Debug, Clone)]
pub struct IndexBuild {
    pub index: Index,
    pub failures: Vec<IndexFailure>,
}

/// Folds ledger entries and their extracted text into an [`Index`]
pub struct Indexer {
    config: IndexConfig,
    artifacts_dir: PathBuf,
}

impl Indexer {
    pub fn new(config: IndexConfig, artifacts_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            artifacts_dir: artifacts_dir.into(),
        }
    }

    pub fn artifacts_dir(&self) -> &Path {
        &self.artifacts_dir
    }

    /// Builds the index from every entry in `ledger`, in ledger order
    ///
    /// Entries whose artifact is missing or whose extraction fails are left
    /// out of the index and returned as failures. Ids stay dense over the
    /// documents actually indexed.
    pub fn build(&self, ledger: &Ledger, extractor: &dyn TextExtractor) -> IndexBuild {
        let mut documents = Vec::new();
        let mut failures = Vec::new();

        let total = ledger.len();
        for (position, entry) in ledger.entries().iter().enumerate() {
            let path = self.artifacts_dir.join(&entry.output_filename);

            let artifact = match RawArtifact::load(entry.document_key.clone(), &path) {
                Ok(artifact) => artifact,
                Err(e) => {
                    let reason = if e.kind() == std::io::ErrorKind::NotFound {
                        "artifact missing from storage".to_string()
                    } else {
                        format!("artifact unreadable: {}", e)
                    };
                    tracing::warn!("{}: {}", entry.document_key, reason);
                    failures.push(IndexFailure {
                        document_key: entry.document_key.clone(),
                        filename: entry.output_filename.clone(),
                        reason,
                    });
                    continue;
                }
            };

            let result = extractor.extract(&artifact);
            // The artifact bytes are released here, before the next document
            drop(artifact);

            match result.outcome {
                Extraction::Text(content) => {
                    tracing::debug!(
                        "[{}/{}] Extracted {} characters from {}",
                        position + 1,
                        total,
                        content.chars().count(),
                        entry.output_filename
                    );
                    documents.push(IndexedDocument {
                        id: documents.len() as u64 + 1,
                        title: entry.description.clone(),
                        source_label: format!(
                            "{} - Entry #{}",
                            entry.display_source(),
                            entry.entry_number
                        ),
                        date: UNKNOWN_DATE.to_string(),
                        page_label: WHOLE_DOCUMENT_PAGES.to_string(),
                        content,
                        filename: entry.output_filename.clone(),
                    });
                }
                Extraction::Failed(reason) => {
                    tracing::warn!(
                        "{}: extraction failed: {}",
                        result.document_key,
                        reason
                    );
                    failures.push(IndexFailure {
                        document_key: result.document_key,
                        filename: entry.output_filename.clone(),
                        reason,
                    });
                }
            }
        }

        tracing::info!(
            "Indexed {} documents, {} failed",
            documents.len(),
            failures.len()
        );

        IndexBuild {
            index: Index {
                last_updated: Utc::now().format("%Y-%m-%d").to_string(),
                total_count: documents.len(),
                source: self.config.source.clone(),
                disclaimer: self.config.disclaimer.clone(),
                documents,
            },
            failures,
        }
    }
}
