//! Source adapters: pluggable access to remote document collections
//!
//! A [`SourceAdapter`] knows how to list one remote collection page by page
//! and how to turn a listed entry into a retrievable location. The rest of
//! the pipeline only ever sees [`DocumentReference`]s.
//!
//! Adapters shipped with the crate:
//! - [`CourtListenerAdapter`] for paginated CourtListener dockets
//! - [`UrlListAdapter`] for fixed lists of direct document URLs
//! - [`HtmlListingAdapter`] for a single HTML page linking to documents

mod courtlistener;
mod listing;
mod reference;
mod url_list;

pub use courtlistener::CourtListenerAdapter;
pub use listing::{extract_document_links, HtmlListingAdapter, ListedLink};
pub use reference::{sanitize, DocumentKey, DocumentReference};
pub use url_list::UrlListAdapter;

use crate::config::{SourceConfig, SourceKind};
use crate::ConfigError;
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use thiserror::Error;
use url::Url;

/// Errors raised while listing a source
///
/// These are source-level failures: they end enumeration of the affected
/// source but never the whole run.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Request for source {source_id} failed: {message}")]
    Request { source_id: String, message: String },

    #[error("Source {source_id} returned HTTP {status}")]
    Status { source_id: String, status: u16 },

    #[error("Could not decode listing of source {source_id}: {message}")]
    Decode { source_id: String, message: String },

    #[error("Source {source_id} answered with a verification challenge")]
    Challenge { source_id: String },

    #[error("Source {source_id} not found: {message}")]
    NotFound { source_id: String, message: String },

    #[error("Cannot resolve '{locator}' for source {source_id}: {message}")]
    Resolve {
        source_id: String,
        locator: String,
        message: String,
    },
}

/// One entry of a source listing, before resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    /// Identifier unique within the source
    pub local_id: String,
    pub entry_number: String,
    pub description: String,
    /// Adapter-specific pointer to the document (path, URL, ...)
    pub locator: String,
}

/// One page of a source listing
#[derive(Debug, Clone, Default)]
pub struct SourcePage {
    pub entries: Vec<SourceEntry>,
    /// Whether the adapter has a further page after this one
    pub has_next: bool,
}

impl SourcePage {
    /// The last page of a listing
    pub fn last(entries: Vec<SourceEntry>) -> Self {
        Self {
            entries,
            has_next: false,
        }
    }
}

/// Access to one remote document collection
///
/// Pages are numbered from 1. An adapter must be safe to call again for the
/// same page (the enumerator may restart from the beginning).
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Stable id of the source this adapter lists
    fn source_id(&self) -> &str;

    /// Human readable name of the source
    fn label(&self) -> &str;

    /// Lists one page of entries
    async fn list_page(&self, page: u32) -> Result<SourcePage, SourceError>;

    /// Resolves an entry to the location its document can be fetched from
    fn resolve(&self, entry: &SourceEntry) -> Result<Url, SourceError>;
}

/// Builds one adapter per configured source
pub fn build_adapters(
    sources: &[SourceConfig],
    client: &Client,
) -> Result<Vec<Arc<dyn SourceAdapter>>, ConfigError> {
    let mut adapters: Vec<Arc<dyn SourceAdapter>> = Vec::with_capacity(sources.len());

    for source in sources {
        let adapter: Arc<dyn SourceAdapter> = match source.kind {
            SourceKind::Courtlistener => {
                Arc::new(CourtListenerAdapter::from_config(source, client.clone())?)
            }
            SourceKind::UrlList => Arc::new(UrlListAdapter::from_config(source)?),
            SourceKind::HtmlListing => {
                Arc::new(HtmlListingAdapter::from_config(source, client.clone())?)
            }
        };
        adapters.push(adapter);
    }

    Ok(adapters)
}

/// Parses a base URL, making sure it ends with a slash so `join` appends
pub(crate) fn parse_base_url(value: &str) -> Result<Url, url::ParseError> {
    if value.ends_with('/') {
        Url::parse(value)
    } else {
        Url::parse(&format!("{}/", value))
    }
}

/// Identifier of a URL within its host: path plus query, without slashes at the ends
pub(crate) fn url_local_id(url: &Url) -> String {
    let path = url.path().trim_matches('/');
    match url.query() {
        Some(query) => format!("{}?{}", path, query),
        None => path.to_string(),
    }
}
