//! Harvest module for document enumeration and retrieval
//!
//! This module contains the core acquisition logic, including:
//! - HTTP transport with block and challenge detection
//! - Paced, retrying document retrieval
//! - Source enumeration with de-duplication
//! - Operator intervention on blocked documents
//! - Overall run coordination and index build

mod coordinator;
mod enumerator;
mod fetcher;
mod intervention;
mod pacing;
mod transport;

pub use coordinator::{IndexSummary, Pipeline, RunReport, RunStatus};
pub use enumerator::{Enumerator, SourceFailure};
pub use fetcher::{
    claim_filename, DocumentFetcher, FailureKind, FetchFailure, FetchOutcome, RetryPolicy,
};
pub use intervention::{
    hook_for_policy, parse_response, AnswerReader, FixedIntervention, Intervention,
    InterventionHook, PromptIntervention,
};
pub use pacing::Pacer;
pub use transport::{
    build_http_client, classify_status, looks_like_challenge, HttpTransport, Transport,
    TransportError,
};

use crate::config::Config;
use crate::Result;

/// Runs a complete harvest
///
/// This is the main entry point for a run. It will:
/// 1. Prepare the run directory and load the ledger
/// 2. Enumerate every configured source
/// 3. Retrieve each document not yet in the ledger
/// 4. Rebuild the index and reports if the harvest completed
///
/// The run stops early, with the ledger persisted, on Ctrl-C.
pub async fn harvest(config: Config, config_hash: String) -> Result<RunReport> {
    let pipeline = Pipeline::new(config, config_hash)?;
    pipeline
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for interrupt: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
}
