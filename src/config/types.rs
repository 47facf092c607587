use serde::Deserialize;
use std::path::PathBuf;

/// Main configuration structure for Docket-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub harvester: HarvesterConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default, rename = "source")]
    pub sources: Vec<SourceConfig>,
}

impl Config {
    /// Returns the configured source with the given id
    pub fn source(&self, id: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.id == id)
    }
}

/// Pipeline behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HarvesterConfig {
    /// Delay between enumeration page requests (milliseconds)
    #[serde(rename = "page-delay-ms", default = "default_page_delay_ms")]
    pub page_delay_ms: u64,

    /// Delay between document fetch attempts (milliseconds)
    #[serde(rename = "fetch-delay-ms", default = "default_fetch_delay_ms")]
    pub fetch_delay_ms: u64,

    /// Retries after the first attempt for transient failures
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Base retry backoff, doubled on every further attempt (milliseconds)
    #[serde(rename = "retry-backoff-ms", default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Timeout applied to ledger, artifact and index writes (seconds)
    #[serde(rename = "io-timeout-secs", default = "default_io_timeout_secs")]
    pub io_timeout_secs: u64,

    /// Upper bound on concurrent document fetches
    #[serde(
        rename = "max-concurrent-fetches",
        default = "default_max_concurrent_fetches"
    )]
    pub max_concurrent_fetches: u32,

    /// Largest artifact accepted from the transport (bytes)
    #[serde(rename = "max-artifact-bytes", default = "default_max_artifact_bytes")]
    pub max_artifact_bytes: u64,

    /// What to do when a request hits a block or verification challenge
    #[serde(rename = "on-challenge", default)]
    pub on_challenge: ChallengePolicy,
}

impl HarvesterConfig {
    /// Total attempts for one document: the first request plus `max-retries`
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl Default for HarvesterConfig {
    fn default() -> Self {
        Self {
            page_delay_ms: default_page_delay_ms(),
            fetch_delay_ms: default_fetch_delay_ms(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            io_timeout_secs: default_io_timeout_secs(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
            max_artifact_bytes: default_max_artifact_bytes(),
            on_challenge: ChallengePolicy::default(),
        }
    }
}

fn default_page_delay_ms() -> u64 {
    500
}

fn default_fetch_delay_ms() -> u64 {
    300
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    1000
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_io_timeout_secs() -> u64 {
    30
}

fn default_max_concurrent_fetches() -> u32 {
    2
}

fn default_max_artifact_bytes() -> u64 {
    200 * 1024 * 1024
}

/// Policy applied when a fetch is blocked or challenged
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChallengePolicy {
    /// Pause and ask the operator on the terminal
    #[default]
    Prompt,
    /// Record the failure and continue with the next document
    Skip,
    /// Stop the run, persisting the ledger first
    Abort,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the harvester
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the harvester
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the harvester
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for harvester-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the User-Agent header: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Run directory holding artifacts, the ledger and reports
    pub directory: String,

    /// Where the index is written (defaults to `<directory>/documents.json`)
    #[serde(rename = "index-path", default)]
    pub index_path: Option<String>,
}

impl OutputConfig {
    /// Resolved index path
    pub fn index_path(&self) -> PathBuf {
        match &self.index_path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(&self.directory).join("documents.json"),
        }
    }
}

/// Descriptive fields copied into the index file
#[derive(Debug, Clone, Deserialize)]
pub struct IndexConfig {
    #[serde(default = "default_index_source")]
    pub source: String,

    #[serde(default = "default_index_disclaimer")]
    pub disclaimer: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            source: default_index_source(),
            disclaimer: default_index_disclaimer(),
        }
    }
}

fn default_index_source() -> String {
    "Official court documents from CourtListener.com".to_string()
}

fn default_index_disclaimer() -> String {
    "All documents are publicly available official court records".to_string()
}

/// The kind of remote system a source is enumerated from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// CourtListener docket (JSON API, paginated)
    Courtlistener,
    /// Fixed list of direct document URLs
    UrlList,
    /// Single HTML page whose links point at documents
    HtmlListing,
}

/// One remote collection to enumerate
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Stable identifier, used in document keys and filenames
    pub id: String,

    /// Human readable name used in the index (e.g. the case name)
    pub label: String,

    pub kind: SourceKind,

    /// CourtListener docket id
    #[serde(rename = "docket-id", default)]
    pub docket_id: Option<u64>,

    /// CourtListener docket search term, used when the docket id is unknown
    #[serde(default)]
    pub search: Option<String>,

    /// CourtListener REST API base
    #[serde(rename = "api-base", default)]
    pub api_base: Option<String>,

    /// Base URL that relative document paths are resolved against
    #[serde(rename = "storage-base", default)]
    pub storage_base: Option<String>,

    /// Direct document URLs for `url-list` sources
    #[serde(default)]
    pub urls: Vec<String>,

    /// Listing page for `html-listing` sources
    #[serde(rename = "listing-url", default)]
    pub listing_url: Option<String>,

    /// Substring a link must contain to count as a document
    #[serde(rename = "link-pattern", default)]
    pub link_pattern: Option<String>,
}

impl SourceConfig {
    /// Creates a source of the given kind with every optional field unset
    pub fn new(id: &str, label: &str, kind: SourceKind) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            kind,
            docket_id: None,
            search: None,
            api_base: None,
            storage_base: None,
            urls: Vec::new(),
            listing_url: None,
            link_pattern: None,
        }
    }
}
