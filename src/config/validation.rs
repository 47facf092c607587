use crate::config::types::{
    Config, HarvesterConfig, OutputConfig, SourceConfig, SourceKind, UserAgentConfig,
};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_harvester_config(&config.harvester)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_sources(&config.sources)?;
    Ok(())
}

/// Restricts the configured sources to the given ids
///
/// An empty selection keeps every source. Unknown ids are rejected so a typo
/// on the command line never silently turns into an empty run.
pub fn restrict_sources(config: &mut Config, ids: &[String]) -> Result<(), ConfigError> {
    if ids.is_empty() {
        return Ok(());
    }

    for id in ids {
        if config.source(id).is_none() {
            return Err(ConfigError::UnknownSource(id.clone()));
        }
    }

    config.sources.retain(|s| ids.contains(&s.id));
    Ok(())
}

/// Validates harvester configuration
fn validate_harvester_config(config: &HarvesterConfig) -> Result<(), ConfigError> {
    if config.max_concurrent_fetches < 1 || config.max_concurrent_fetches > 8 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_fetches must be between 1 and 8, got {}",
            config.max_concurrent_fetches
        )));
    }

    if config.max_retries > 10 {
        return Err(ConfigError::Validation(format!(
            "max_retries must be at most 10, got {}",
            config.max_retries
        )));
    }

    if config.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be > 0".to_string(),
        ));
    }

    if config.io_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "io_timeout_secs must be > 0".to_string(),
        ));
    }

    if config.max_artifact_bytes == 0 {
        return Err(ConfigError::Validation(
            "max_artifact_bytes must be > 0".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.directory.trim().is_empty() {
        return Err(ConfigError::Validation(
            "output directory cannot be empty".to_string(),
        ));
    }

    if let Some(index_path) = &config.index_path {
        if index_path.trim().is_empty() {
            return Err(ConfigError::Validation(
                "index_path cannot be empty when set".to_string(),
            ));
        }
    }

    Ok(())
}

/// Validates source entries, including per-kind required fields
fn validate_sources(sources: &[SourceConfig]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for source in sources {
        validate_source_id(&source.id)?;

        if !seen.insert(source.id.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Duplicate source id '{}'",
                source.id
            )));
        }

        if source.label.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "Source '{}' must have a label",
                source.id
            )));
        }

        for (name, value) in [
            ("api-base", &source.api_base),
            ("storage-base", &source.storage_base),
            ("listing-url", &source.listing_url),
        ] {
            if let Some(value) = value {
                validate_http_url(&source.id, name, value)?;
            }
        }

        match source.kind {
            SourceKind::Courtlistener => {
                match (&source.docket_id, &source.search) {
                    (Some(_), None) => {}
                    (None, Some(term)) if !term.trim().is_empty() => {}
                    _ => {
                        return Err(ConfigError::Validation(format!(
                            "CourtListener source '{}' needs exactly one of docket-id or search",
                            source.id
                        )))
                    }
                }
            }
            SourceKind::UrlList => {
                if source.urls.is_empty() {
                    return Err(ConfigError::Validation(format!(
                        "URL list source '{}' must have at least one URL",
                        source.id
                    )));
                }
                for url in &source.urls {
                    validate_http_url(&source.id, "urls", url)?;
                }
            }
            SourceKind::HtmlListing => {
                if source.listing_url.is_none() {
                    return Err(ConfigError::Validation(format!(
                        "HTML listing source '{}' must set listing-url",
                        source.id
                    )));
                }
                match &source.link_pattern {
                    Some(pattern) if !pattern.is_empty() => {}
                    _ => {
                        return Err(ConfigError::Validation(format!(
                            "HTML listing source '{}' must set a non-empty link-pattern",
                            source.id
                        )))
                    }
                }
            }
        }
    }

    Ok(())
}

/// Validates a source id: it becomes part of filenames and document keys
fn validate_source_id(id: &str) -> Result<(), ConfigError> {
    if id.is_empty() {
        return Err(ConfigError::Validation(
            "Source id cannot be empty".to_string(),
        ));
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ConfigError::Validation(format!(
            "Source id '{}' may only contain ASCII letters, digits, '-' and '_'",
            id
        )));
    }

    Ok(())
}

/// Validates that a configured URL is absolute http(s)
fn validate_http_url(source_id: &str, field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value).map_err(|e| {
        ConfigError::InvalidUrl(format!(
            "Source '{}' has invalid {} '{}': {}",
            source_id, field, value, e
        ))
    })?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "Source '{}' {} '{}' must use http or https",
            source_id, field, value
        )));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    let local = parts[0];
    let domain = parts[1];

    if local.is_empty() || domain.is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::IndexConfig;

    fn create_test_config() -> Config {
        let mut docket = SourceConfig::new("giuffre", "Giuffre v. Maxwell", SourceKind::Courtlistener);
        docket.docket_id = Some(4355308);

        let mut logs = SourceConfig::new("flight-logs", "Flight Logs", SourceKind::UrlList);
        logs.urls = vec!["https://example.com/manifest.pdf".to_string()];

        Config {
            harvester: HarvesterConfig::default(),
            user_agent: UserAgentConfig {
                crawler_name: "TestHarvester".to_string(),
                crawler_version: "1.0".to_string(),
                contact_url: "https://example.com/about".to_string(),
                contact_email: "admin@example.com".to_string(),
            },
            output: OutputConfig {
                directory: "./harvest".to_string(),
                index_path: None,
            },
            index: IndexConfig::default(),
            sources: vec![docket, logs],
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&create_test_config()).is_ok());
    }

    #[test]
    fn test_concurrency_bounds() {
        let mut config = create_test_config();
        config.harvester.max_concurrent_fetches = 9;
        assert!(validate(&config).is_err());

        config.harvester.max_concurrent_fetches = 8;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_retry_bounds() {
        let mut config = create_test_config();
        config.harvester.max_retries = 0;
        assert!(validate(&config).is_ok());

        config.harvester.max_retries = 11;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_duplicate_source_ids() {
        let mut config = create_test_config();
        config.sources[1].id = "giuffre".to_string();
        assert!(matches!(validate(&config), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_source_id_characters() {
        assert!(validate_source_id("giuffre-v-maxwell_2015").is_ok());
        assert!(validate_source_id("").is_err());
        assert!(validate_source_id("case/1").is_err());
        assert!(validate_source_id("case name").is_err());
    }

    #[test]
    fn test_courtlistener_needs_exactly_one_locator() {
        let mut config = create_test_config();
        config.sources[0].search = Some("maxwell".to_string());
        assert!(validate(&config).is_err());

        config.sources[0].docket_id = None;
        assert!(validate(&config).is_ok());

        config.sources[0].search = None;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_url_list_rejects_bad_urls() {
        let mut config = create_test_config();
        config.sources[1].urls = vec!["ftp://example.com/a.pdf".to_string()];
        assert!(matches!(validate(&config), Err(ConfigError::InvalidUrl(_))));

        config.sources[1].urls = vec![];
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_html_listing_requires_pattern() {
        let mut config = create_test_config();
        let mut listing = SourceConfig::new("vault", "FBI Vault", SourceKind::HtmlListing);
        listing.listing_url = Some("https://vault.example.gov/epstein".to_string());
        config.sources.push(listing);
        assert!(validate(&config).is_err());

        config.sources[2].link_pattern = Some("/download".to_string());
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_restrict_sources() {
        let mut config = create_test_config();
        restrict_sources(&mut config, &["flight-logs".to_string()]).unwrap();
        assert_eq!(config.sources.len(), 1);
        assert_eq!(config.sources[0].id, "flight-logs");

        let mut config = create_test_config();
        let result = restrict_sources(&mut config, &["nope".to_string()]);
        assert!(matches!(result, Err(ConfigError::UnknownSource(_))));

        let mut config = create_test_config();
        restrict_sources(&mut config, &[]).unwrap();
        assert_eq!(config.sources.len(), 2);
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("admin@sub.example.com").is_ok());

        assert!(validate_email("").is_err());
        assert!(validate_email("invalid").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("user@").is_err());
        assert!(validate_email("user@domain").is_err());
    }
}
