//! HTML listing adapter
//!
//! Fetches one HTML page and treats every link containing a configured
//! pattern as a document. Suited to archive pages that list their documents
//! as plain `<a href>` links.

use crate::config::SourceConfig;
use crate::harvest::looks_like_challenge;
use crate::source::{url_local_id, SourceAdapter, SourceEntry, SourceError, SourcePage};
use crate::ConfigError;
use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// A document link found on a listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedLink {
    /// Absolute link target
    pub url: Url,
    /// Link text, whitespace-collapsed
    pub text: String,
}

/// Extracts de-duplicated document links from a listing page
///
/// # Link Rules
///
/// - only `<a href>` elements whose raw or resolved href contains `pattern`
/// - `javascript:`, `mailto:`, `tel:`, `data:` and fragment-only links are skipped
/// - relative links are resolved against `base_url`
/// - the first occurrence of a target wins; fragments are ignored for identity
pub fn extract_document_links(html: &str, base_url: &Url, pattern: &str) -> Vec<ListedLink> {
    let document = Html::parse_document(html);
    let mut links = Vec::new();
    let mut seen = HashSet::new();

    let Ok(selector) = Selector::parse("a[href]") else {
        return links;
    };

    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };

        let Some(mut url) = resolve_link(href, base_url) else {
            continue;
        };

        if !href.contains(pattern) && !url.as_str().contains(pattern) {
            continue;
        }

        url.set_fragment(None);
        if !seen.insert(url.to_string()) {
            continue;
        }

        let text = element
            .text()
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");

        links.push(ListedLink { url, text });
    }

    links
}

/// Resolves a link href to an absolute http(s) URL
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    match base_url.join(href) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => Some(url),
        _ => None,
    }
}

/// Lists the documents linked from one HTML page
pub struct HtmlListingAdapter {
    client: Client,
    source_id: String,
    label: String,
    listing_url: Url,
    link_pattern: String,
}

impl HtmlListingAdapter {
    pub fn from_config(config: &SourceConfig, client: Client) -> Result<Self, ConfigError> {
        let raw = config.listing_url.as_deref().ok_or_else(|| {
            ConfigError::Validation(format!(
                "HTML listing source '{}' must set listing-url",
                config.id
            ))
        })?;

        let listing_url = Url::parse(raw).map_err(|e| {
            ConfigError::InvalidUrl(format!(
                "Source '{}' has invalid listing-url '{}': {}",
                config.id, raw, e
            ))
        })?;

        let link_pattern = config
            .link_pattern
            .clone()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| {
                ConfigError::Validation(format!(
                    "HTML listing source '{}' must set a non-empty link-pattern",
                    config.id
                ))
            })?;

        Ok(Self {
            client,
            source_id: config.id.clone(),
            label: config.label.clone(),
            listing_url,
            link_pattern,
        })
    }

    fn request_error(&self, e: reqwest::Error) -> SourceError {
        SourceError::Request {
            source_id: self.source_id.clone(),
            message: e.to_string(),
        }
    }
}

#[async_trait]
impl SourceAdapter for HtmlListingAdapter {
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

        let response = self
            .client
            .get(self.listing_url.clone())
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                source_id: self.source_id.clone(),
                status: status.as_u16(),
            });
        }

        // Redirects may move the listing; relative links resolve against the final URL
        let base_url = response.url().clone();
        let html = response.text().await.map_err(|e| self.request_error(e))?;

        if looks_like_challenge(&html) {
            return Err(SourceError::Challenge {
                source_id: self.source_id.clone(),
            });
        }

        let entries = extract_document_links(&html, &base_url, &self.link_pattern)
            .into_iter()
            .enumerate()
            .map(|(i, link)| {
                let description = if link.text.is_empty() {
                    url_local_id(&link.url)
                } else {
                    link.text
                };
                SourceEntry {
                    local_id: url_local_id(&link.url),
                    entry_number: (i + 1).to_string(),
                    description,
                    locator: link.url.to_string(),
                }
            })
            .collect::<Vec<_>>();

        tracing::debug!(
            "Listing {} yielded {} document links",
            self.listing_url,
            entries.len()
        );

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
