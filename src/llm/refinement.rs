use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::detection::ecosystem::MarkerFile;
use crate::detection::history::{AttemptFailure, AttemptHistory};
use crate::detection::phase1::BUILD_COMMAND_LABEL;
use crate::detection::runner::{CandidateOutcome, CommandRunner};
use crate::llm::client::{LLMClient, LLMError};
use crate::llm::context::ContextBuilder;

/// Longest pause honored when the collaborator reports a rate limit
const MAX_RATE_LIMIT_WAIT: Duration = Duration::from_secs(60);

/// Result of the iterative refinement loop
#[derive(Debug, Clone, Default)]
pub struct RefinementOutcome {
    pub command: Option<String>,
    /// Incoming history plus one entry per failed suggestion
    pub history: AttemptHistory,
    /// Suggestions requested from the collaborator
    pub attempts_made: usize,
}

/// Asks the reasoning collaborator for commands, feeding failures back in
pub struct RefinementAgent {
    client: Arc<dyn LLMClient>,
    runner: CommandRunner,
    context_builder: ContextBuilder,
    max_attempts: usize,
    llm_timeout: Duration,
}

impl RefinementAgent {
    pub fn new(
        client: Arc<dyn LLMClient>,
        runner: CommandRunner,
        context_builder: ContextBuilder,
        max_attempts: usize,
        llm_timeout: Duration,
    ) -> Self {
        Self {
            client,
            runner,
            context_builder,
            max_attempts,
            llm_timeout,
        }
    }

    /// Run up to `max_attempts` suggest/validate/execute rounds
    ///
    /// Suggestions run from `repo_root`. A collaborator error or timeout
    /// ends the loop early without adding to the history. A rate limit is
    /// waited out once per attempt before the request is repeated.
    pub async fn refine(
        &self,
        repo_root: &Path,
        target_dir: &Path,
        markers: &[MarkerFile],
        mut history: AttemptHistory,
        session_id: &str,
    ) -> RefinementOutcome {
        let mut attempts_made = 0;

        for attempt in 1..=self.max_attempts {
            let prompt = self.context_builder.build_prompt(repo_root, markers, &history);
            attempts_made = attempt;

            let Some(suggestion) = self.request_suggestion(&prompt, target_dir, session_id, attempt).await else {
                break;
            };

            info!(session_id, attempt, command = %suggestion, "Trying suggested command");
            let outcome = match AssertUnwindSafe(self.runner.attempt(BUILD_COMMAND_LABEL, &suggestion, repo_root))
                .catch_unwind()
                .await
            {
                Ok(outcome) => outcome,
                Err(_) => {
                    error!(session_id, attempt, command = %suggestion, "Suggested command panicked");
                    CandidateOutcome::unexpected()
                }
            };

            match outcome {
                CandidateOutcome::Success => {
                    info!(session_id, attempt, command = %suggestion, "Suggested command succeeded");
                    return RefinementOutcome {
                        command: Some(suggestion),
                        history,
                        attempts_made,
                    };
                }
                CandidateOutcome::ToolAbsent => {
                    history.record(
                        suggestion,
                        AttemptFailure::ExecutionError("executable is not installed".to_string()),
                    );
                }
                outcome => {
                    if let Some(failure) = outcome.failure() {
                        warn!(session_id, attempt, command = %suggestion, error = %failure, "Suggested command failed");
                        history.record(suggestion, failure);
                    }
                }
            }
        }

        RefinementOutcome {
            command: None,
            history,
            attempts_made,
        }
    }

    async fn request_suggestion(&self, prompt: &str, target_dir: &Path, session_id: &str, attempt: usize) -> Option<String> {
        let mut waited = false;

        loop {
            let request = AssertUnwindSafe(self.client.suggest_command(prompt, target_dir, session_id)).catch_unwind();
            match tokio::time::timeout(self.llm_timeout, request).await {
                Ok(Ok(Ok(suggestion))) => return Some(suggestion.command),
                Ok(Ok(Err(LLMError::RateLimitExceeded(secs)))) if !waited => {
                    let wait = Duration::from_secs(secs).min(MAX_RATE_LIMIT_WAIT);
                    info!(session_id, attempt, wait_secs = wait.as_secs(), "Reasoning collaborator rate limited, waiting");
                    tokio::time::sleep(wait).await;
                    waited = true;
                }
                Ok(Ok(Err(err))) => {
                    warn!(session_id, attempt, error = %err, "Reasoning collaborator failed, ending refinement");
                    return None;
                }
                Ok(Err(_)) => {
                    error!(session_id, attempt, "Reasoning collaborator panicked, ending refinement");
                    return None;
                }
                Err(_) => {
                    warn!(
                        session_id,
                        attempt,
                        timeout_secs = self.llm_timeout.as_secs(),
                        "Reasoning collaborator timed out, ending refinement"
                    );
                    return None;
                }
            }
        }
    }
}
