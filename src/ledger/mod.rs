//! Retrieval ledger: the durable record of retrieved documents
//!
//! The ledger is the only state shared across runs. It is loaded at startup,
//! updated after every successful download and rewritten as a whole on every
//! persist, using a temp-file-and-replace write so readers only ever see a
//! complete file.

use crate::source::{DocumentKey, DocumentReference};
use crate::storage::{write_atomic, write_atomic_with_timeout};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Ledger-specific errors
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Failed to read ledger {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Ledger {path} is corrupt: {message}")]
    Corrupt { path: String, message: String },

    #[error("Failed to persist ledger: {0}")]
    Persist(#[source] io::Error),

    #[error("Failed to serialize ledger: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// One successfully retrieved document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub document_key: DocumentKey,

    /// Artifact filename inside the run's artifact directory
    pub output_filename: String,

    pub source_id: String,

    /// Human readable source name, used for index labels
    #[serde(default)]
    pub source_name: String,

    pub entry_number: String,

    pub description: String,

    pub retrieved_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Creates the entry for a reference whose artifact was just written
    pub fn from_reference(reference: &DocumentReference, output_filename: &str) -> Self {
        Self {
            document_key: reference.key(),
            output_filename: output_filename.to_string(),
            source_id: reference.source_id.clone(),
            source_name: reference.source_label.clone(),
            entry_number: reference.entry_number.clone(),
            description: reference.description.clone(),
            retrieved_at: Utc::now(),
        }
    }

    /// Source name for display, falling back to the source id
    pub fn display_source(&self) -> &str {
        if self.source_name.is_empty() {
            &self.source_id
        } else {
            &self.source_name
        }
    }
}

/// On-disk representation of the ledger
#[derive(Serialize, Deserialize)]
struct LedgerFile {
    documents: Vec<LedgerEntry>,
    last_updated: DateTime<Utc>,
}

/// The set of documents retrieved so far, in insertion order
#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    entries: Vec<LedgerEntry>,
    positions: HashMap<DocumentKey, usize>,
    last_updated: Option<DateTime<Utc>>,
}

impl Ledger {
    /// Creates an empty ledger that will persist to `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Vec::new(),
            positions: HashMap::new(),
            last_updated: None,
        }
    }

    /// Loads the ledger stored at `path`
    ///
    /// A missing file yields an empty ledger. A file that exists but does not
    /// parse is reported as [`LedgerError::Corrupt`].
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("No ledger at {}, starting empty", path.display());
                return Ok(Self::new(path));
            }
            Err(e) => {
                return Err(LedgerError::Read {
                    path: path.display().to_string(),
                    source: e,
                })
            }
        };

        let file: LedgerFile =
            serde_json::from_str(&content).map_err(|e| LedgerError::Corrupt {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        let mut ledger = Self::new(path);
        for entry in file.documents {
            ledger.record(entry);
        }
        ledger.last_updated = Some(file.last_updated);

        tracing::info!(
            "Loaded ledger with {} documents from {}",
            ledger.len(),
            ledger.path.display()
        );

        Ok(ledger)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, key: &DocumentKey) -> bool {
        self.positions.contains_key(key)
    }

    /// Records an entry; an existing entry with the same key is replaced in place
    pub fn record(&mut self, entry: LedgerEntry) {
        match self.positions.get(&entry.document_key) {
            Some(&position) => {
                tracing::debug!("Replacing ledger entry {}", entry.document_key);
                self.entries[position] = entry;
            }
            None => {
                self.positions
                    .insert(entry.document_key.clone(), self.entries.len());
                self.entries.push(entry);
            }
        }
    }

    /// Serialized ledger state, stamped with the current time
    pub fn to_json(&self) -> Result<Vec<u8>, LedgerError> {
        let file = LedgerFile {
            documents: self.entries.clone(),
            last_updated: Utc::now(),
        };
        Ok(serde_json::to_vec_pretty(&file)?)
    }

    /// Writes the whole ledger atomically
    ///
    /// On failure the in-memory state is untouched, so a later successful
    /// persist still includes every recorded entry.
    pub fn persist(&mut self) -> Result<(), LedgerError> {
        let bytes = self.to_json()?;
        write_atomic(&self.path, &bytes).map_err(LedgerError::Persist)?;
        self.last_updated = Some(Utc::now());
        Ok(())
    }

    /// [`persist`](Self::persist) on a blocking thread, bounded by `timeout`
    pub async fn persist_with_timeout(&mut self, timeout: Duration) -> Result<(), LedgerError> {
        let bytes = self.to_json()?;
        write_atomic_with_timeout(self.path.clone(), bytes, timeout)
            .await
            .map_err(LedgerError::Persist)?;
        self.last_updated = Some(Utc::now());
        Ok(())
    }

    /// Entries in insertion order
    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn get(&self, key: &DocumentKey) -> Option<&LedgerEntry> {
        self.positions.get(key).map(|&i| &self.entries[i])
    }

    /// Snapshot of all recorded keys
    pub fn keys(&self) -> HashSet<DocumentKey> {
        self.positions.keys().cloned().collect()
    }

    /// Artifact filenames already claimed, mapped to the key owning them
    pub fn filenames(&self) -> HashMap<String, DocumentKey> {
        self.entries
            .iter()
            .map(|e| (e.output_filename.clone(), e.document_key.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Time of the last successful persist or load
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    /// Entries whose artifact no longer exists under `artifacts_dir`
    pub fn missing_artifacts(&self, artifacts_dir: &Path) -> Vec<&LedgerEntry> {
        self.entries
            .iter()
            .filter(|e| !artifacts_dir.join(&e.output_filename).is_file())
            .collect()
    }
}
