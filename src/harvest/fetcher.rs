//! Document fetcher: ledger-aware retrieval with pacing and retries
//!
//! # Retry Logic
//!
//! | Condition | Action |
//! |-----------|--------|
//! | Key already in ledger | Skipped, no network activity |
//! | Timeout, connection error, 408, 5xx | Retry with doubling backoff, then Failed |
//! | 401, 403, 429, verification page | Failed (blocked), never retried here |
//! | Other 4xx, oversized artifact | Failed (rejected) |
//! | Artifact write failure | Failed (storage) |

use crate::config::HarvesterConfig;
use crate::extract::RawArtifact;
use crate::harvest::pacing::Pacer;
use crate::harvest::transport::{Transport, TransportError};
use crate::ledger::{Ledger, LedgerEntry};
use crate::source::{DocumentKey, DocumentReference};
use crate::storage::write_atomic_with_timeout;
use crate::HarvestError;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Why a document could not be retrieved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Transient failures persisted through every attempt
    Transient,
    /// Access denied or verification challenge
    Blocked,
    /// Permanent refusal (4xx, size cap)
    Rejected,
    /// The artifact could not be written
    Storage,
}

/// A per-document retrieval failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub kind: FailureKind,
    pub reason: String,
}

impl FetchFailure {
    fn from_transport(error: &TransportError, attempts: u32) -> Self {
        let kind = if error.is_transient() {
            FailureKind::Transient
        } else if error.is_blocked() {
            FailureKind::Blocked
        } else {
            FailureKind::Rejected
        };

        let reason = if kind == FailureKind::Transient {
            format!("{} (after {} attempts)", error, attempts)
        } else {
            error.to_string()
        };

        Self { kind, reason }
    }

    pub fn is_blocked(&self) -> bool {
        self.kind == FailureKind::Blocked
    }
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

/// Result of fetching one reference
#[derive(Debug)]
pub enum FetchOutcome {
    /// Already in the ledger
    Skipped,
    /// Retrieved, written to storage and recorded
    Downloaded(RawArtifact),
    Failed(FetchFailure),
}

/// Bounded retry with doubling backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &HarvesterConfig) -> Self {
        Self {
            max_attempts: config.max_attempts(),
            base_backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }

    /// Backoff after the given failed attempt (1-based): base, 2x base, 4x base...
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.base_backoff.saturating_mul(factor)
    }
}

/// Retrieves documents through a [`Transport`] and writes them to storage
///
/// Cheap to clone; clones share the politeness pacer.
#[derive(Clone)]
pub struct DocumentFetcher {
    transport: Arc<dyn Transport>,
    pacer: Arc<Pacer>,
    retry: RetryPolicy,
    request_timeout: Duration,
    io_timeout: Duration,
    artifacts_dir: PathBuf,
}

impl DocumentFetcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        config: &HarvesterConfig,
        artifacts_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            transport,
            pacer: Arc::new(Pacer::new(Duration::from_millis(config.fetch_delay_ms))),
            retry: RetryPolicy::from_config(config),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            io_timeout: Duration::from_secs(config.io_timeout_secs),
            artifacts_dir: artifacts_dir.into(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn artifacts_dir(&self) -> &Path {
        &self.artifacts_dir
    }

    /// Retrieves `reference` and stores it as `filename`
    ///
    /// Does not consult or touch the ledger. The artifact is on durable
    /// storage when this returns `Ok`.
    pub async fn retrieve(
        &self,
        reference: &DocumentReference,
        filename: &str,
    ) -> Result<RawArtifact, FetchFailure> {
        let key = reference.key();
        let mut attempt = 0;

        let bytes = loop {
            attempt += 1;
            self.pacer.wait().await;

            match self
                .transport
                .fetch(&reference.retrieval_location, self.request_timeout)
                .await
            {
                Ok(bytes) => break bytes,
                Err(e) if e.is_transient() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.backoff(attempt);
                    tracing::warn!(
                        "{}: attempt {}/{} failed ({}), retrying in {:?}",
                        key,
                        attempt,
                        self.retry.max_attempts,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(FetchFailure::from_transport(&e, attempt)),
            }
        };

        let path = self.artifacts_dir.join(filename);
        write_atomic_with_timeout(path.clone(), bytes.clone(), self.io_timeout)
            .await
            .map_err(|e| FetchFailure {
                kind: FailureKind::Storage,
                reason: format!("failed to store artifact: {}", e),
            })?;

        tracing::debug!("{}: stored {} bytes as {}", key, bytes.len(), filename);

        Ok(RawArtifact::new(key, path, bytes))
    }

    /// Retrieves `reference` as `filename` and builds its ledger entry
    ///
    /// The entry is not recorded; the caller owns the ledger.
    pub async fn retrieve_entry(
        &self,
        reference: &DocumentReference,
        filename: &str,
    ) -> Result<(RawArtifact, LedgerEntry), FetchFailure> {
        let artifact = self.retrieve(reference, filename).await?;
        Ok((artifact, LedgerEntry::from_reference(reference, filename)))
    }

    /// Fetches one reference against `ledger`, recording and persisting on success
    ///
    /// This is the sequential entry point. The concurrent pipeline uses the same
    /// steps ([`claim_filename`], [`retrieve_entry`](Self::retrieve_entry)) and
    /// records through its single ledger writer instead.
    ///
    /// Per-document failures come back as [`FetchOutcome::Failed`]; only a
    /// ledger persistence failure is an `Err`.
    pub async fn fetch(
        &self,
        reference: &DocumentReference,
        ledger: &mut Ledger,
    ) -> Result<FetchOutcome, HarvestError> {
        let key = reference.key();
        if ledger.contains(&key) {
            tracing::debug!("{}: already retrieved, skipping", key);
            return Ok(FetchOutcome::Skipped);
        }

        let filename = claim_filename(reference, &mut ledger.filenames());

        match self.retrieve_entry(reference, &filename).await {
            Ok((artifact, entry)) => {
                ledger.record(entry);
                ledger.persist_with_timeout(self.io_timeout).await?;
                Ok(FetchOutcome::Downloaded(artifact))
            }
            Err(failure) => {
                tracing::warn!("{}: {}", key, failure);
                Ok(FetchOutcome::Failed(failure))
            }
        }
    }
}

/// Picks a filename for `reference` that no other document holds and claims it
///
/// `claimed` maps every filename in use to its owning key. A document keeps a
/// name it already owns.
pub fn claim_filename(
    reference: &DocumentReference,
    claimed: &mut HashMap<String, DocumentKey>,
) -> String {
    let key = reference.key();
    let filename = allocate_filename(reference, |name| {
        claimed.get(name).map_or(false, |owner| *owner != key)
    });
    claimed.insert(filename.clone(), key);
    filename
}

/// Picks the artifact filename for `reference`
///
/// Tries the plain name, then the name carrying the local id, then numbered
/// variants of that until `taken_by_other` accepts one.
pub(crate) fn allocate_filename(
    reference: &DocumentReference,
    taken_by_other: impl Fn(&str) -> bool,
) -> String {
    let filename = reference.output_filename();
    if !taken_by_other(&filename) {
        return filename;
    }

    let mut alternative = reference.disambiguated_filename();
    let mut counter = 2;
    while taken_by_other(&alternative) {
        alternative = reference.numbered_filename(counter);
        counter += 1;
    }

    tracing::debug!(
        "{}: filename {} already used, storing as {}",
        reference.key(),
        filename,
        alternative
    );
    alternative
}
