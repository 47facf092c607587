//! Text extraction from retrieved artifacts
//!
//! Extraction never fails past its boundary: every fault is turned into a
//! tagged [`Extraction::Failed`] carrying a readable cause, and an artifact
//! with no text at all is a failure rather than an empty success.

mod normalize;
mod pdf;

pub use normalize::normalize_text;
pub use pdf::PdfExtractor;

use crate::source::DocumentKey;
use std::io;
use std::path::{Path, PathBuf};

/// Raw bytes of one retrieved document plus where they are stored
#[derive(Debug, Clone)]
pub struct RawArtifact {
    pub key: DocumentKey,
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

impl RawArtifact {
    pub fn new(key: DocumentKey, path: PathBuf, bytes: Vec<u8>) -> Self {
        Self { key, path, bytes }
    }

    /// Reads an artifact back from storage
    pub fn load(key: DocumentKey, path: &Path) -> io::Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(Self::new(key, path.to_path_buf(), bytes))
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Outcome of extracting one artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// Non-empty normalized text
    Text(String),
    /// Reason the artifact yielded no text
    Failed(String),
}

/// Exactly one per extracted artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionResult {
    pub document_key: DocumentKey,
    pub outcome: Extraction,
}

impl ExtractionResult {
    /// Successful result, demoted to a failure when `text` is blank
    pub fn text(document_key: DocumentKey, text: String) -> Self {
        let outcome = if text.trim().is_empty() {
            Extraction::Failed("no extractable text".to_string())
        } else {
            Extraction::Text(text)
        };
        Self {
            document_key,
            outcome,
        }
    }

    pub fn failed(document_key: DocumentKey, reason: impl Into<String>) -> Self {
        Self {
            document_key,
            outcome: Extraction::Failed(reason.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Extraction::Text(_))
    }
}

/// Converts a raw artifact into plain text
///
/// Implementations must be pure functions of the artifact so they can run
/// concurrently over distinct artifacts.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, artifact: &RawArtifact) -> ExtractionResult;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_text_is_a_failure() {
        let key = DocumentKey::new("logs", "a.pdf");
        let result = ExtractionResult::text(key.clone(), "  \n\n ".to_string());
        assert_eq!(
            result.outcome,
            Extraction::Failed("no extractable text".to_string())
        );
        assert!(!result.is_success());

        let result = ExtractionResult::text(key, "Flight manifest".to_string());
        assert!(result.is_success());
    }

    #[test]
    fn test_load_artifact() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("a.pdf");
        std::fs::write(&path, b"%PDF-1.5").unwrap();

        let artifact = RawArtifact::load(DocumentKey::new("logs", "a.pdf"), &path).unwrap();
        assert_eq!(artifact.len(), 8);
        assert_eq!(artifact.path, path);
    }
}
