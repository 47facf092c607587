//! Source enumerator: one flat, de-duplicated stream of references
//!
//! Drives every adapter from page 1 until it reports no further page,
//! pausing between page requests. Enumeration can only restart from the
//! beginning; resuming is the ledger's job.

use crate::source::{DocumentKey, DocumentReference, SourceAdapter, SourceEntry};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

/// Hard stop for adapters that never report a last page
const MAX_PAGES_PER_SOURCE: u32 = 10_000;

/// A source whose enumeration ended early
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFailure {
    pub source_id: String,
    pub message: String,
}

/// Lazily enumerates document references across sources
pub struct Enumerator {
    adapters: Vec<Arc<dyn SourceAdapter>>,
    page_delay: Duration,
    source_index: usize,
    next_page: u32,
    pages_requested: usize,
    buffer: VecDeque<DocumentReference>,
    seen: HashSet<DocumentKey>,
    duplicates: usize,
    failures: Vec<SourceFailure>,
}

impl Enumerator {
    pub fn new(adapters: Vec<Arc<dyn SourceAdapter>>, page_delay: Duration) -> Self {
        Self {
            adapters,
            page_delay,
            source_index: 0,
            next_page: 1,
            pages_requested: 0,
            buffer: VecDeque::new(),
            seen: HashSet::new(),
            duplicates: 0,
            failures: Vec::new(),
        }
    }

    /// Starts a fresh pass from the first page of the first source
    pub fn restart(&mut self) {
        self.source_index = 0;
        self.next_page = 1;
        self.pages_requested = 0;
        self.buffer.clear();
        self.seen.clear();
        self.duplicates = 0;
        self.failures.clear();
    }

    /// Sources whose enumeration ended with an error in this pass
    pub fn source_failures(&self) -> &[SourceFailure] {
        &self.failures
    }

    /// References dropped because their key was already yielded in this pass
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    /// Yields the next reference, or `None` once every source is exhausted
    ///
    /// Cancel-safe: enumeration state only changes after an await completes.
    pub async fn next(&mut self) -> Option<DocumentReference> {
        loop {
            if let Some(reference) = self.buffer.pop_front() {
                return Some(reference);
            }

            let adapter = self.adapters.get(self.source_index)?.clone();
            let page = self.next_page;

            if self.pages_requested > 0 && !self.page_delay.is_zero() {
                tokio::time::sleep(self.page_delay).await;
            }

            let result = adapter.list_page(page).await;
            self.pages_requested += 1;

            match result {
                Ok(listing) => {
                    tracing::debug!(
                        "Source {} page {}: {} entries",
                        adapter.source_id(),
                        page,
                        listing.entries.len()
                    );

                    for entry in &listing.entries {
                        self.accept(adapter.as_ref(), entry);
                    }

                    if listing.has_next && page < MAX_PAGES_PER_SOURCE {
                        self.next_page = page + 1;
                    } else {
                        if listing.has_next {
                            tracing::warn!(
                                "Source {} still reports more pages after {}, stopping",
                                adapter.source_id(),
                                page
                            );
                        }
                        self.advance_source();
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        "Source {} failed on page {}: {}",
                        adapter.source_id(),
                        page,
                        e
                    );
                    self.failures.push(SourceFailure {
                        source_id: adapter.source_id().to_string(),
                        message: e.to_string(),
                    });
                    self.advance_source();
                }
            }
        }
    }

    fn accept(&mut self, adapter: &dyn SourceAdapter, entry: &SourceEntry) {
        let retrieval_location = match adapter.resolve(entry) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("Skipping unresolvable entry: {}", e);
                return;
            }
        };

        let reference = DocumentReference {
            source_id: adapter.source_id().to_string(),
            source_label: adapter.label().to_string(),
            local_id: entry.local_id.clone(),
            entry_number: entry.entry_number.clone(),
            description: entry.description.clone(),
            retrieval_location,
        };

        if self.seen.insert(reference.key()) {
            self.buffer.push_back(reference);
        } else {
            self.duplicates += 1;
            tracing::debug!("Dropping duplicate reference {}", reference.key());
        }
    }

    fn advance_source(&mut self) {
        self.source_index += 1;
        self.next_page = 1;
    }
}
