//! Statistics derived from a finished index
//!
//! This is a read-only pass over the index: per-source document counts,
//! character totals and the number of documents that failed.

use crate::index::Index;
use std::collections::HashMap;

const RULE_WIDE: usize = 60;
const RULE_NARROW: usize = 40;

/// Index statistics summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statistics {
    /// Number of indexed documents
    pub total_documents: usize,

    /// Characters of indexed content across all documents
    pub total_characters: u64,

    /// Documents per source, sorted by descending count then name
    pub by_source: Vec<(String, usize)>,

    /// Documents that failed retrieval or extraction
    pub failed_documents: usize,

    pub disclaimer: String,
}

impl Statistics {
    /// Computes statistics over `index`
    pub fn from_index(index: &Index, failed_documents: usize) -> Self {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        let mut total_characters = 0u64;

        for doc in &index.documents {
            *counts.entry(doc.source_name()).or_insert(0) += 1;
            total_characters += doc.content.chars().count() as u64;
        }

        let mut by_source: Vec<(String, usize)> = counts
            .into_iter()
            .map(|(name, count)| (name.to_string(), count))
            .collect();
        by_source.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        Self {
            total_documents: index.documents.len(),
            total_characters,
            by_source,
            failed_documents,
            disclaimer: index.disclaimer.clone(),
        }
    }

    /// Average characters per document, 0 for an empty index
    pub fn average_characters(&self) -> u64 {
        if self.total_documents == 0 {
            0
        } else {
            self.total_characters / self.total_documents as u64
        }
    }

    /// Renders the plain-text statistics report
    pub fn render(&self) -> String {
        let mut out = String::new();

        out.push_str("DOCUMENT COLLECTION STATISTICS\n");
        out.push_str(&"=".repeat(RULE_WIDE));
        out.push_str("\n\n");

        out.push_str(&format!("Total Documents: {}\n", self.total_documents));
        out.push_str(&format!(
            "Total Characters: {}\n",
            format_thousands(self.total_characters)
        ));
        out.push_str(&format!(
            "Average per Document: {} characters\n\n",
            format_thousands(self.average_characters())
        ));

        out.push_str("Documents by Source:\n");
        out.push_str(&"-".repeat(RULE_NARROW));
        out.push('\n');
        for (source, count) in &self.by_source {
            out.push_str(&format!("{}: {} documents\n", source, count));
        }

        out.push_str(&format!("\nFailed Documents: {}\n", self.failed_documents));

        out.push('\n');
        out.push_str(&"=".repeat(RULE_WIDE));
        out.push('\n');
        if !self.disclaimer.is_empty() {
            out.push_str(&self.disclaimer);
            out.push('\n');
        }

        out
    }
}

/// Formats an integer with comma thousands separators
pub fn format_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }

    out
}

/// Prints statistics to stdout
pub fn print_statistics(stats: &Statistics) {
    print!("{}", stats.render());
}
