//! Transport capability: fetch the bytes behind a location
//!
//! The pipeline only needs "GET with a timeout, bytes or a classified
//! failure". [`HttpTransport`] is the plain-request implementation; other
//! implementations (a driven browser session, a fixture store in tests) plug
//! in through the [`Transport`] trait.

use crate::config::UserAgentConfig;
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client, StatusCode};
use std::error::Error as StdError;
use std::io;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Maximum redirect hops followed per request
const MAX_REDIRECTS: usize = 10;

/// Lower-cased markers of a human-verification page
const CHALLENGE_MARKERS: &[&str] = &[
    "captcha",
    "recaptcha",
    "hcaptcha",
    "verify you are human",
    "confirm you are human",
];

/// Classified transport failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    /// Server-side or timeout status that may succeed later
    #[error("HTTP {0}")]
    Status(u16),

    #[error("blocked: {0}")]
    Blocked(String),

    #[error("rejected with HTTP {0}")]
    Rejected(u16),

    #[error("artifact exceeds {0} bytes")]
    TooLarge(u64),

    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Whether retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TransportError::Timeout | TransportError::Connect(_) | TransportError::Status(_)
        )
    }

    /// Whether the failure is an access block or verification challenge
    pub fn is_blocked(&self) -> bool {
        matches!(self, TransportError::Blocked(_))
    }
}

/// Classifies a response status; `None` for success
///
/// | Status | Class |
/// |--------|-------|
/// | 2xx | success |
/// | 408, 5xx | transient |
/// | 401, 403, 429 | blocked |
/// | other | rejected |
pub fn classify_status(status: StatusCode) -> Option<TransportError> {
    if status.is_success() {
        return None;
    }

    let code = status.as_u16();
    Some(match code {
        401 | 403 | 429 => TransportError::Blocked(format!("HTTP {}", code)),
        408 | 500..=599 => TransportError::Status(code),
        _ => TransportError::Rejected(code),
    })
}

/// Whether an HTML body is a human-verification page
pub fn looks_like_challenge(body: &str) -> bool {
    let body = body.to_lowercase();
    CHALLENGE_MARKERS.iter().any(|marker| body.contains(marker))
}

/// Retrieves the bytes at a location
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, location: &Url, timeout: Duration) -> Result<Vec<u8>, TransportError>;
}

/// Builds an HTTP client with proper configuration
///
/// The user agent has the form `Name/Version (+ContactURL; ContactEmail)`.
///
/// # Example
///
/// ```no_run
/// use docket_harvest::config::UserAgentConfig;
/// use docket_harvest::harvest::build_http_client;
/// use std::time::Duration;
///
/// let config = UserAgentConfig {
///     crawler_name: "DocketHarvest".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.org/about".to_string(),
///     contact_email: "ops@example.org".to_string(),
/// };
///
/// let client = build_http_client(&config, Duration::from_secs(60)).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Plain HTTP GET transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    max_bytes: u64,
}

impl HttpTransport {
    pub fn new(client: Client, max_bytes: u64) -> Self {
        Self { client, max_bytes }
    }
}

fn classify_reqwest(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else if e.is_connect() {
        TransportError::Connect(e.to_string())
    } else if e.is_body() || e.is_request() || is_connection_drop(&e) {
        // Peer resets and early closes surface as request or body errors
        TransportError::Connect(format!("connection interrupted: {}", e))
    } else {
        TransportError::Other(e.to_string())
    }
}

/// Whether an I/O error somewhere in the chain means the connection was dropped
fn is_connection_drop(e: &reqwest::Error) -> bool {
    let mut source = StdError::source(e);
    while let Some(err) = source {
        if let Some(io_err) = err.downcast_ref::<io::Error>() {
            return matches!(
                io_err.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
            );
        }
        source = err.source();
    }
    false
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, location: &Url, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        let mut response = self
            .client
            .get(location.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(classify_reqwest)?;

        if let Some(error) = classify_status(response.status()) {
            return Err(error);
        }

        if let Some(length) = response.content_length() {
            if length > self.max_bytes {
                return Err(TransportError::TooLarge(self.max_bytes));
            }
        }

        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains("html"))
            .unwrap_or(false);

        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(classify_reqwest)? {
            if bytes.len() as u64 + chunk.len() as u64 > self.max_bytes {
                return Err(TransportError::TooLarge(self.max_bytes));
            }
            bytes.extend_from_slice(&chunk);
        }

        if is_html && looks_like_challenge(&String::from_utf8_lossy(&bytes)) {
            return Err(TransportError::Blocked("verification challenge".to_string()));
        }

        Ok(bytes)
    }
}
