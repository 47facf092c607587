//! PDF text extraction backed by `lopdf`

use super::{normalize_text, ExtractionResult, RawArtifact, TextExtractor};
use lopdf::Document;

/// Default page cap; larger documents are truncated, not rejected
const DEFAULT_MAX_PAGES: usize = 5_000;

/// Extracts text page by page and joins the pages with a blank line
///
/// Pages without text contribute nothing. A document that cannot be opened
/// (corrupt, encrypted) or that has no text on any page is a failure.
#[derive(Debug, Clone)]
pub struct PdfExtractor {
    max_pages: usize,
}

impl PdfExtractor {
    pub fn new() -> Self {
        Self {
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    pub fn with_max_pages(max_pages: usize) -> Self {
        Self {
            max_pages: max_pages.max(1),
        }
    }

    fn extract_pages(&self, bytes: &[u8]) -> Result<String, String> {
        let document = Document::load_mem(bytes).map_err(|e| format!("unparsable PDF: {}", e))?;

        if document.is_encrypted() {
            return Err("encrypted PDF".to_string());
        }

        let pages = document.get_pages();
        if pages.len() > self.max_pages {
            tracing::warn!(
                "PDF has {} pages, extracting the first {}",
                pages.len(),
                self.max_pages
            );
        }

        let mut texts = Vec::new();
        for &page_number in pages.keys().take(self.max_pages) {
            match document.extract_text(&[page_number]) {
                Ok(text) => {
                    let text = normalize_text(&text);
                    if !text.is_empty() {
                        texts.push(text);
                    }
                }
                // A single unreadable page contributes nothing
                Err(e) => tracing::debug!("No text on page {}: {}", page_number, e),
            }
        }

        Ok(texts.join("\n\n"))
    }
}

impl Default for PdfExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl TextExtractor for PdfExtractor {
    fn extract(&self, artifact: &RawArtifact) -> ExtractionResult {
        match self.extract_pages(&artifact.bytes) {
            Ok(text) => ExtractionResult::text(artifact.key.clone(), text),
            Err(reason) => ExtractionResult::failed(artifact.key.clone(), reason),
        }
    }
}
