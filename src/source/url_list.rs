//! Adapter for a fixed list of direct document URLs

use crate::config::SourceConfig;
use crate::source::{url_local_id, SourceAdapter, SourceEntry, SourceError, SourcePage};
use crate::ConfigError;
use async_trait::async_trait;
use url::Url;

/// Lists a configured set of URLs as a single page
#[derive(Debug, Clone)]
pub struct UrlListAdapter {
    source_id: String,
    label: String,
    urls: Vec<Url>,
}

impl UrlListAdapter {
    pub fn new(source_id: &str, label: &str, urls: Vec<Url>) -> Self {
        Self {
            source_id: source_id.to_string(),
            label: label.to_string(),
            urls,
        }
    }

    pub fn from_config(config: &SourceConfig) -> Result<Self, ConfigError> {
        let urls = config
            .urls
            .iter()
            .map(|raw| {
                Url::parse(raw).map_err(|e| {
                    ConfigError::InvalidUrl(format!(
                        "Source '{}' has invalid URL '{}': {}",
                        config.id, raw, e
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::new(&config.id, &config.label, urls))
    }
}

/// Last path segment without its extension, e.g. `epstein-flight-manifests`
fn describe(url: &Url) -> String {
    let segment = url
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .unwrap_or("document");

    match segment.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => segment.to_string(),
    }
}

#[async_trait]
impl SourceAdapter for UrlListAdapter {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn label(&self) -> &str {
        &self.label
    }

    async fn list_page(&self, page: u32) -> Result<SourcePage, SourceError> {
        if page != 1 {
            return Ok(SourcePage::last(Vec::new()));
        }

        let entries = self
            .urls
            .iter()
            .enumerate()
            .map(|(i, url)| SourceEntry {
                local_id: url_local_id(url),
                entry_number: (i + 1).to_string(),
                description: describe(url),
                locator: url.to_string(),
            })
            .collect();

        Ok(SourcePage::last(entries))
    }

    fn resolve(&self, entry: &SourceEntry) -> Result<Url, SourceError> {
        Url::parse(&entry.locator).map_err(|e| SourceError::Resolve {
            source_id: self.source_id.clone(),
            locator: entry.locator.clone(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> UrlListAdapter {
        UrlListAdapter::new(
            "flight-logs",
            "Flight Logs",
            vec![
                Url::parse("https://assets.example.org/documents/1507315/epstein-flight-manifests.pdf")
                    .unwrap(),
                Url::parse("https://assets.example.org/logs/").unwrap(),
            ],
        )
    }

    #[tokio::test]
    async fn test_single_page_listing() {
        let page = adapter().list_page(1).await.unwrap();
        assert!(!page.has_next);
        assert_eq!(page.entries.len(), 2);

        let first = &page.entries[0];
        assert_eq!(first.entry_number, "1");
        assert_eq!(first.description, "epstein-flight-manifests");
        assert_eq!(
            first.local_id,
            "documents/1507315/epstein-flight-manifests.pdf"
        );

        assert_eq!(page.entries[1].description, "logs");
    }

    #[tokio::test]
    async fn test_later_pages_are_empty() {
        let page = adapter().list_page(2).await.unwrap();
        assert!(page.entries.is_empty());
        assert!(!page.has_next);
    }

    #[tokio::test]
    async fn test_resolve_returns_the_listed_url() {
        let adapter = adapter();
        let page = adapter.list_page(1).await.unwrap();
        let url = adapter.resolve(&page.entries[0]).unwrap();
        assert_eq!(url.as_str(), page.entries[0].locator);
    }
}
