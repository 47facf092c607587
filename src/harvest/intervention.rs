//! Operator intervention on blocked or challenged fetches

use crate::config::ChallengePolicy;
use crate::source::DocumentReference;
use async_trait::async_trait;
use std::io::{self, BufRead, Write};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};

/// What to do with a blocked document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intervention {
    /// Try the same document again
    Retry,
    /// Record it as failed and move on
    Skip,
    /// Stop dispatching and end the run
    Abort,
}

/// Decides how to continue after a block or verification challenge
#[async_trait]
pub trait InterventionHook: Send + Sync {
    async fn on_challenge(&self, reference: &DocumentReference, reason: &str) -> Intervention;
}

/// Always answers with the same decision
#[derive(Debug, Clone, Copy)]
pub struct FixedIntervention(pub Intervention);

#[async_trait]
impl InterventionHook for FixedIntervention {
    async fn on_challenge(&self, reference: &DocumentReference, reason: &str) -> Intervention {
        tracing::warn!("{}: {} ({:?})", reference.key(), reason, self.0);
        self.0
    }
}

/// Reads one answer line from the operator
pub type AnswerReader = Arc<dyn Fn() -> io::Result<String> + Send + Sync>;

/// Asks the operator on the terminal
///
/// Prompts are serialized, so concurrent workers never interleave questions.
/// Answers are read on a plain thread outside the runtime; an unanswered
/// prompt never holds up shutdown.
pub struct PromptIntervention {
    prompt_lock: Mutex<()>,
    reader: AnswerReader,
}

impl PromptIntervention {
    pub fn new() -> Self {
        Self::with_reader(Arc::new(read_answer))
    }

    pub fn with_reader(reader: AnswerReader) -> Self {
        Self {
            prompt_lock: Mutex::new(()),
            reader,
        }
    }

    /// Waits for one answer; `None` when none could be read
    async fn ask(&self) -> Option<io::Result<String>> {
        let (tx, rx) = oneshot::channel();
        let reader = self.reader.clone();

        let spawned = std::thread::Builder::new()
            .name("prompt".to_string())
            .spawn(move || {
                let _ = tx.send(reader());
            });
        if let Err(e) = spawned {
            tracing::warn!("Could not start prompt thread: {}", e);
            return None;
        }

        rx.await.ok()
    }
}

impl Default for PromptIntervention {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PromptIntervention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PromptIntervention").finish_non_exhaustive()
    }
}

/// Maps an operator answer to a decision
///
/// Empty input or `r` retries, `s` skips, `q` aborts. Anything else skips.
pub fn parse_response(line: &str) -> Intervention {
    match line.trim().to_lowercase().as_str() {
        "" | "r" | "retry" => Intervention::Retry,
        "q" | "quit" | "abort" => Intervention::Abort,
        _ => Intervention::Skip,
    }
}

fn read_answer() -> io::Result<String> {
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line)
}

#[async_trait]
impl InterventionHook for PromptIntervention {
    async fn on_challenge(&self, reference: &DocumentReference, reason: &str) -> Intervention {
        let _guard = self.prompt_lock.lock().await;

        println!();
        println!("Access problem for {} ({})", reference.key(), reason);
        println!("  {}", reference.retrieval_location);
        println!("Resolve it in a browser if needed, then:");
        print!("  [Enter] retry, [s] skip, [q] stop the run > ");
        let _ = io::stdout().flush();

        match self.ask().await {
            Some(Ok(line)) => parse_response(&line),
            Some(Err(e)) => {
                tracing::warn!("Could not read answer ({}), skipping {}", e, reference.key());
                Intervention::Skip
            }
            None => {
                tracing::warn!("No answer, skipping {}", reference.key());
                Intervention::Skip
            }
        }
    }
}

/// Hook implementing the configured challenge policy
pub fn hook_for_policy(policy: ChallengePolicy) -> Arc<dyn InterventionHook> {
    match policy {
        ChallengePolicy::Prompt => Arc::new(PromptIntervention::new()),
        ChallengePolicy::Skip => Arc::new(FixedIntervention(Intervention::Skip)),
        ChallengePolicy::Abort => Arc::new(FixedIntervention(Intervention::Abort)),
    }
}
