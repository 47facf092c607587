//! CourtListener docket adapter
//!
//! Pages through the docket-entries endpoint of the CourtListener REST API.
//! Every RECAP document attached to a docket entry that has a stored file
//! becomes one listed entry; documents without a stored file cannot be
//! retrieved and are left out.

use crate::config::SourceConfig;
use crate::source::{parse_base_url, SourceAdapter, SourceEntry, SourceError, SourcePage};
use crate::ConfigError;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::OnceCell;
use url::Url;

pub const DEFAULT_API_BASE: &str = "https://www.courtlistener.com/api/rest/v3/";
pub const DEFAULT_STORAGE_BASE: &str = "https://storage.courtlistener.com/";

/// How the docket is identified
#[derive(Debug, Clone)]
enum DocketLocator {
    Id(u64),
    Search(String),
}

#[derive(Debug, Deserialize)]
struct Paginated<T> {
    #[serde(default = "Vec::new")]
    results: Vec<T>,
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DocketSummary {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct DocketEntry {
    #[serde(default)]
    entry_number: Option<Value>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    recap_documents: Vec<RecapDocument>,
}

#[derive(Debug, Deserialize)]
struct RecapDocument {
    id: u64,
    #[serde(default)]
    document_number: Option<Value>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    filepath_local: Option<String>,
}

/// Lists the documents of one CourtListener docket
pub struct CourtListenerAdapter {
    client: Client,
    source_id: String,
    label: String,
    api_base: Url,
    storage_base: Url,
    locator: DocketLocator,
    docket_id: OnceCell<u64>,
}

impl CourtListenerAdapter {
    pub fn from_config(config: &SourceConfig, client: Client) -> Result<Self, ConfigError> {
        let parse = |field: &str, value: &str| {
            parse_base_url(value).map_err(|e| {
                ConfigError::InvalidUrl(format!(
                    "Source '{}' has invalid {} '{}': {}",
                    config.id, field, value, e
                ))
            })
        };

        let api_base = parse(
            "api-base",
            config.api_base.as_deref().unwrap_or(DEFAULT_API_BASE),
        )?;
        let storage_base = parse(
            "storage-base",
            config.storage_base.as_deref().unwrap_or(DEFAULT_STORAGE_BASE),
        )?;

        let locator = match (config.docket_id, &config.search) {
            (Some(id), _) => DocketLocator::Id(id),
            (None, Some(term)) => DocketLocator::Search(term.clone()),
            (None, None) => {
                return Err(ConfigError::Validation(format!(
                    "CourtListener source '{}' needs docket-id or search",
                    config.id
                )))
            }
        };

        Ok(Self {
            client,
            source_id: config.id.clone(),
            label: config.label.clone(),
            api_base,
            storage_base,
            locator,
            docket_id: OnceCell::new(),
        })
    }

    /// Returns the docket id, searching for it once when only a term is configured
    async fn docket_id(&self) -> Result<u64, SourceError> {
        let id = self
            .docket_id
            .get_or_try_init(|| async {
                match &self.locator {
                    DocketLocator::Id(id) => Ok(*id),
                    DocketLocator::Search(term) => self.search_docket(term).await,
                }
            })
            .await?;
        Ok(*id)
    }

    async fn search_docket(&self, term: &str) -> Result<u64, SourceError> {
        let mut url = self.endpoint("dockets/")?;
        url.query_pairs_mut()
            .append_pair("q", term)
            .append_pair("format", "json");

        tracing::info!("Searching dockets of {} for '{}'", self.source_id, term);
        let page: Paginated<DocketSummary> = self.get_json(url).await?;

        let docket = page.results.first().ok_or_else(|| SourceError::NotFound {
            source_id: self.source_id.clone(),
            message: format!("no docket matches '{}'", term),
        })?;

        tracing::info!(
            "Source {} resolved to docket {} ({} candidates)",
            self.source_id,
            docket.id,
            page.results.len()
        );
        Ok(docket.id)
    }

    fn endpoint(&self, path: &str) -> Result<Url, SourceError> {
        self.api_base.join(path).map_err(|e| SourceError::Resolve {
            source_id: self.source_id.clone(),
            locator: path.to_string(),
            message: e.to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, SourceError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SourceError::Request {
                source_id: self.source_id.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                source_id: self.source_id.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| SourceError::Request {
            source_id: self.source_id.clone(),
            message: e.to_string(),
        })?;

        serde_json::from_str(&body).map_err(|e| SourceError::Decode {
            source_id: self.source_id.clone(),
            message: e.to_string(),
        })
    }
}

/// Renders a JSON number or string label (`17`, `"17"`) as text
fn value_label(value: &Option<Value>) -> Option<String> {
    match value {
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Flattens docket entries into one listed entry per stored RECAP document
fn entries_from(docket_entries: Vec<DocketEntry>) -> Vec<SourceEntry> {
    let mut entries = Vec::new();

    for entry in docket_entries {
        for document in entry.recap_documents {
            let Some(locator) = non_empty(&document.filepath_local) else {
                continue;
            };

            entries.push(SourceEntry {
                local_id: document.id.to_string(),
                entry_number: value_label(&document.document_number)
                    .or_else(|| value_label(&entry.entry_number))
                    .unwrap_or_else(|| "unknown".to_string()),
                description: non_empty(&document.description)
                    .or_else(|| non_empty(&entry.description))
                    .unwrap_or_else(|| "document".to_string()),
                locator,
            });
        }
    }

    entries
}

#[async_trait]
impl SourceAdapter for CourtListenerAdapter {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn label(&self) -> &str {
        &self.label
    }

    async fn list_page(&self, page: u32) -> Result<SourcePage, SourceError> {
        let docket_id = self.docket_id().await?;

        let mut url = self.endpoint("docket-entries/")?;
        url.query_pairs_mut()
            .append_pair("docket", &docket_id.to_string())
            .append_pair("page", &page.to_string())
            .append_pair("format", "json");

        let listing: Paginated<DocketEntry> = self.get_json(url).await?;
        let has_next = listing.next.is_some();

        Ok(SourcePage {
            entries: entries_from(listing.results),
            has_next,
        })
    }

    fn resolve(&self, entry: &SourceEntry) -> Result<Url, SourceError> {
        let resolved = match Url::parse(&entry.locator) {
            Ok(absolute) => Ok(absolute),
            Err(_) => self
                .storage_base
                .join(entry.locator.trim_start_matches('/')),
        };

        resolved.map_err(|e| SourceError::Resolve {
            source_id: self.source_id.clone(),
            locator: entry.locator.clone(),
            message: e.to_string(),
        })
    }
}
