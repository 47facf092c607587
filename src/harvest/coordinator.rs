//! Pipeline coordinator - main harvest orchestration logic
//!
//! This module wires the stages together:
//! - An enumeration task feeding references over a bounded channel
//! - A semaphore-bounded pool of fetch workers
//! - A single ledger-writer task that records and persists every download
//! - Interrupt handling that abandons in-flight fetches and persists the ledger
//! - Index build and report generation once harvesting completed

use crate::config::Config;
use crate::extract::{PdfExtractor, TextExtractor};
use crate::harvest::enumerator::{Enumerator, SourceFailure};
use crate::harvest::fetcher::{claim_filename, DocumentFetcher, FetchFailure};
use crate::harvest::intervention::{hook_for_policy, Intervention, InterventionHook};
use crate::harvest::transport::{build_http_client, HttpTransport, Transport};
use crate::index::{write_index_with_timeout, Indexer};
use crate::ledger::{Ledger, LedgerEntry, LedgerError};
use crate::output::{
    render_download_summary, render_failure_log, FailureRecord, Reports, Statistics,
};
use crate::source::{build_adapters, DocumentKey, DocumentReference, SourceAdapter};
use crate::storage::RunLayout;
use crate::{HarvestError, Result};
use chrono::Utc;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;

/// Ledger events buffered between fetch workers and the writer
const LEDGER_QUEUE: usize = 64;

/// How often (in processed references) progress is logged
const PROGRESS_INTERVAL: usize = 10;

/// How a harvest ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every source was enumerated and every reference processed
    Completed,
    /// Stopped by an external interrupt
    Interrupted,
    /// Stopped by an operator decision on a blocked document
    Aborted,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Completed => f.write_str("completed"),
            RunStatus::Interrupted => f.write_str("interrupted"),
            RunStatus::Aborted => f.write_str("aborted"),
        }
    }
}

/// Outcome of an index build
#[derive(Debug, Clone)]
pub struct IndexSummary {
    pub documents: usize,
    /// Retrieval failures of the run plus extraction failures of the build
    pub failures: Vec<FailureRecord>,
    pub statistics: Statistics,
}

/// Counts and failures of one run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub status: RunStatus,
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: Vec<FailureRecord>,
    pub source_failures: Vec<SourceFailure>,
    /// Documents in the ledger when the run ended
    pub ledger_size: usize,
    pub index: Option<IndexSummary>,
}

impl RunReport {
    fn new() -> Self {
        Self {
            status: RunStatus::Completed,
            downloaded: 0,
            skipped: 0,
            failed: Vec::new(),
            source_failures: Vec::new(),
            ledger_size: 0,
            index: None,
        }
    }

    /// References handled so far (downloaded, skipped or failed)
    pub fn processed(&self) -> usize {
        self.downloaded + self.skipped + self.failed.len()
    }

    /// One-line summary for the terminal
    pub fn summary_line(&self) -> String {
        format!(
            "Run {}: {} downloaded, {} skipped, {} failed, {} source failures ({} documents in ledger)",
            self.status,
            self.downloaded,
            self.skipped,
            self.failed.len(),
            self.source_failures.len(),
            self.ledger_size
        )
    }
}

enum WorkerOutcome {
    Downloaded,
    Failed(FetchFailure),
    Aborted(FetchFailure),
    LedgerClosed,
}

struct WorkerResult {
    key: DocumentKey,
    filename: String,
    outcome: WorkerOutcome,
}

/// The acquisition-and-indexing pipeline
pub struct Pipeline {
    config: Config,
    config_hash: String,
    layout: RunLayout,
    adapters: Vec<Arc<dyn SourceAdapter>>,
    fetcher: DocumentFetcher,
    extractor: Arc<dyn TextExtractor>,
    hook: Arc<dyn InterventionHook>,
}

impl Pipeline {
    /// Builds the pipeline described by a validated configuration
    ///
    /// No network activity happens here.
    pub fn new(config: Config, config_hash: impl Into<String>) -> Result<Self> {
        let layout = RunLayout::from_config(&config.output);
        let request_timeout = Duration::from_secs(config.harvester.request_timeout_secs);

        let client = build_http_client(&config.user_agent, request_timeout)?;
        let adapters = build_adapters(&config.sources, &client)?;

        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(
            client,
            config.harvester.max_artifact_bytes,
        ));
        let fetcher = DocumentFetcher::new(transport, &config.harvester, layout.artifacts_dir());
        let hook = hook_for_policy(config.harvester.on_challenge);

        Ok(Self {
            config,
            config_hash: config_hash.into(),
            layout,
            adapters,
            fetcher,
            extractor: Arc::new(PdfExtractor::new()),
            hook,
        })
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_intervention(mut self, hook: Arc<dyn InterventionHook>) -> Self {
        self.hook = hook;
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.fetcher = DocumentFetcher::new(
            transport,
            &self.config.harvester,
            self.layout.artifacts_dir(),
        );
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn layout(&self) -> &RunLayout {
        &self.layout
    }

    /// Harvests, then builds the index and reports if harvesting completed
    pub async fn run<F>(&self, shutdown: F) -> Result<RunReport>
    where
        F: Future<Output = ()>,
    {
        let mut report = self.harvest(shutdown).await?;

        if report.status == RunStatus::Completed {
            report.index = Some(self.build_index(&report.failed).await?);
        } else {
            tracing::info!("Run {}, index not rebuilt", report.status);
        }

        Ok(report)
    }

    /// Enumerates every source and fetches every reference not yet in the ledger
    ///
    /// When `shutdown` resolves, dispatching stops, in-flight fetches are
    /// abandoned and the ledger is persisted with everything completed so far.
    /// Only ledger persistence failures are errors; per-document failures are
    /// collected in the report.
    pub async fn harvest<F>(&self, shutdown: F) -> Result<RunReport>
    where
        F: Future<Output = ()>,
    {
        self.layout.prepare()?;

        let ledger = Ledger::load(self.layout.ledger_path())?;
        let known = ledger.keys();
        let mut claimed = ledger.filenames();
        tracing::info!(
            "Starting harvest of {} sources ({} documents already retrieved)",
            self.adapters.len(),
            known.len()
        );

        let harvester = &self.config.harvester;
        let io_timeout = Duration::from_secs(harvester.io_timeout_secs);
        let max_concurrent = harvester.max_concurrent_fetches.max(1) as usize;

        let (ledger_tx, ledger_rx) = mpsc::channel::<LedgerEntry>(LEDGER_QUEUE);
        let mut writer = tokio::spawn(run_ledger_writer(ledger, ledger_rx, io_timeout));

        let (reference_tx, mut reference_rx) = mpsc::channel::<DocumentReference>(max_concurrent);
        let mut enumerator = Enumerator::new(
            self.adapters.clone(),
            Duration::from_millis(harvester.page_delay_ms),
        );
        let enumeration = tokio::spawn(async move {
            while let Some(reference) = enumerator.next().await {
                if reference_tx.send(reference).await.is_err() {
                    break;
                }
            }
            enumerator.source_failures().to_vec()
        });

        let semaphore = Arc::new(Semaphore::new(max_concurrent));
        let mut workers: JoinSet<WorkerResult> = JoinSet::new();
        let mut report = RunReport::new();
        let mut enumeration_done = false;
        let mut writer_result = None;

        tokio::pin!(shutdown);

        loop {
            if enumeration_done && workers.is_empty() {
                break;
            }

            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    tracing::warn!("Interrupt received, stopping dispatch");
                    report.status = RunStatus::Interrupted;
                    break;
                }

                joined = &mut writer, if writer_result.is_none() => {
                    tracing::error!("Ledger writer stopped, stopping dispatch");
                    writer_result = Some(joined);
                    break;
                }

                Some(joined) = workers.join_next() => {
                    match joined {
                        Ok(result) => {
                            if !self.record_result(result, &mut report) {
                                report.status = RunStatus::Aborted;
                                break;
                            }
                        }
                        Err(e) if e.is_cancelled() => {}
                        Err(e) => tracing::error!("Fetch worker failed: {}", e),
                    }
                }

                received = reference_rx.recv(),
                    if !enumeration_done && semaphore.available_permits() > 0 =>
                {
                    let Some(reference) = received else {
                        tracing::debug!("Enumeration finished");
                        enumeration_done = true;
                        continue;
                    };

                    let key = reference.key();
                    if known.contains(&key) {
                        tracing::debug!("{}: already retrieved, skipping", key);
                        report.skipped += 1;
                        log_progress(&report);
                        continue;
                    }

                    let filename = claim_filename(&reference, &mut claimed);

                    let Ok(permit) = semaphore.clone().acquire_owned().await else {
                        break;
                    };
                    let fetcher = self.fetcher.clone();
                    let hook = self.hook.clone();
                    let ledger_tx = ledger_tx.clone();

                    workers.spawn(async move {
                        let _permit = permit;
                        run_worker(fetcher, hook, ledger_tx, reference, filename).await
                    });
                }
            }
        }

        // Stop enumerating and abandon in-flight fetches. Their artifacts are
        // never recorded, so the next run retries them.
        drop(reference_rx);
        if !enumeration_done {
            enumeration.abort();
        }
        report.source_failures = match enumeration.await {
            Ok(failures) => failures,
            Err(e) if e.is_cancelled() => Vec::new(),
            Err(e) => {
                tracing::error!("Enumeration task failed: {}", e);
                Vec::new()
            }
        };

        if !workers.is_empty() {
            tracing::info!("Abandoning {} in-flight fetches", workers.len());
        }
        workers.shutdown().await;

        // The writer drains queued entries and persists once more after the
        // last sender is gone.
        drop(ledger_tx);
        let joined = match writer_result {
            Some(joined) => joined,
            None => writer.await,
        };
        let ledger = joined.map_err(|e| HarvestError::Task(format!("ledger writer: {}", e)))??;
        report.ledger_size = ledger.len();

        tracing::info!("{}", report.summary_line());
        Ok(report)
    }

    /// Rebuilds the index and the reports from the ledger on disk
    ///
    /// `run_failures` are the retrieval failures of the current run; they are
    /// listed in the failure log next to the extraction failures.
    pub async fn build_index(&self, run_failures: &[FailureRecord]) -> Result<IndexSummary> {
        self.layout.prepare()?;

        let io_timeout = Duration::from_secs(self.config.harvester.io_timeout_secs);
        let ledger = Ledger::load(self.layout.ledger_path())?;
        let artifacts_dir = self.layout.artifacts_dir();

        let missing = ledger.missing_artifacts(&artifacts_dir).len();
        if missing > 0 {
            tracing::warn!(
                "{} ledger entries have no artifact in {}",
                missing,
                artifacts_dir.display()
            );
        }

        tracing::info!("Extracting text from {} documents", ledger.len());
        let indexer = Indexer::new(self.config.index.clone(), artifacts_dir);
        let extractor = self.extractor.clone();
        let (build, ledger) = tokio::task::spawn_blocking(move || {
            let build = indexer.build(&ledger, extractor.as_ref());
            (build, ledger)
        })
        .await
        .map_err(|e| HarvestError::Task(format!("index build: {}", e)))?;

        write_index_with_timeout(&build.index, self.layout.index_path(), io_timeout).await?;
        tracing::info!(
            "Index with {} documents written to {}",
            build.index.total_count,
            self.layout.index_path().display()
        );

        let mut failures = run_failures.to_vec();
        failures.extend(build.failures.iter().map(FailureRecord::from));

        let statistics = Statistics::from_index(&build.index, failures.len());
        let reports = Reports {
            statistics: statistics.render(),
            failure_log: render_failure_log(&failures),
            download_summary: render_download_summary(&ledger, &self.config_hash, Utc::now()),
        };
        reports.write(&self.layout, io_timeout).await?;

        Ok(IndexSummary {
            documents: build.index.total_count,
            failures,
            statistics,
        })
    }

    /// Folds a finished worker into the report; `false` stops the run
    fn record_result(&self, result: WorkerResult, report: &mut RunReport) -> bool {
        let keep_going = match result.outcome {
            WorkerOutcome::Downloaded => {
                tracing::info!("Downloaded {} as {}", result.key, result.filename);
                report.downloaded += 1;
                true
            }
            WorkerOutcome::Failed(failure) => {
                tracing::warn!("{}: {}", result.key, failure);
                report
                    .failed
                    .push(FailureRecord::retrieval(result.filename, failure.reason));
                true
            }
            WorkerOutcome::Aborted(failure) => {
                tracing::warn!("{}: {}, run aborted by operator", result.key, failure);
                report
                    .failed
                    .push(FailureRecord::retrieval(result.filename, failure.reason));
                false
            }
            WorkerOutcome::LedgerClosed => {
                tracing::error!("{}: ledger writer unavailable, not recorded", result.key);
                true
            }
        };

        log_progress(report);
        keep_going
    }
}

fn log_progress(report: &RunReport) {
    let processed = report.processed();
    if processed > 0 && processed % PROGRESS_INTERVAL == 0 {
        tracing::info!(
            "Progress: {} processed ({} downloaded, {} skipped, {} failed)",
            processed,
            report.downloaded,
            report.skipped,
            report.failed.len()
        );
    }
}

/// Retrieves one document, consulting the operator when it is blocked
async fn run_worker(
    fetcher: DocumentFetcher,
    hook: Arc<dyn InterventionHook>,
    ledger_tx: mpsc::Sender<LedgerEntry>,
    reference: DocumentReference,
    filename: String,
) -> WorkerResult {
    let key = reference.key();

    let outcome = loop {
        match fetcher.retrieve_entry(&reference, &filename).await {
            Ok((artifact, entry)) => {
                // Only the ledger entry travels on; the bytes are released here
                drop(artifact);
                break if ledger_tx.send(entry).await.is_ok() {
                    WorkerOutcome::Downloaded
                } else {
                    WorkerOutcome::LedgerClosed
                };
            }
            Err(failure) if failure.is_blocked() => {
                match hook.on_challenge(&reference, &failure.reason).await {
                    Intervention::Retry => {
                        tracing::info!("{}: retrying after intervention", key);
                    }
                    Intervention::Skip => break WorkerOutcome::Failed(failure),
                    Intervention::Abort => break WorkerOutcome::Aborted(failure),
                }
            }
            Err(failure) => break WorkerOutcome::Failed(failure),
        }
    };

    WorkerResult {
        key,
        filename,
        outcome,
    }
}

/// Single writer of the ledger: records and persists every completion event
///
/// Persists once more when the channel closes and hands the ledger back.
async fn run_ledger_writer(
    mut ledger: Ledger,
    mut entries: mpsc::Receiver<LedgerEntry>,
    timeout: Duration,
) -> std::result::Result<Ledger, LedgerError> {
    while let Some(entry) = entries.recv().await {
        let key = entry.document_key.clone();
        ledger.record(entry);
        if let Err(e) = ledger.persist_with_timeout(timeout).await {
            tracing::error!("Failed to persist ledger after recording {}: {}", key, e);
            return Err(e);
        }
        tracing::debug!("Recorded {} ({} documents)", key, ledger.len());
    }

    ledger.persist_with_timeout(timeout).await?;
    Ok(ledger)
}
