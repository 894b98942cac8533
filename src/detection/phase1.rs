use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::candidates::CandidateGenerator;
use super::history::AttemptHistory;
use super::tool_check::{ToolCheck, base_executable};
use super::runner::{CandidateOutcome, CommandRunner};
use crate::error::{DetectionError, DetectionResult};

/// Label used when validating build commands
pub const BUILD_COMMAND_LABEL: &str = "BUILD_COMMAND";
/// Label used when validating format commands
pub const FORMAT_COMMAND_LABEL: &str = "FORMAT_COMMAND";

/// Result of deterministic detection
#[derive(Debug, Clone, Default)]
pub struct Phase1Outcome {
    /// First candidate that validated and ran successfully
    pub command: Option<String>,
    /// Every candidate that was tried and failed, in order
    pub history: AttemptHistory,
    /// Number of candidates generated
    pub candidate_count: usize,
}

/// Tries generated candidates in priority order until one succeeds
#[derive(Clone)]
pub struct Phase1Detector {
    tool_check: Arc<dyn ToolCheck>,
    runner: CommandRunner,
}

impl Phase1Detector {
    pub fn new(tool_check: Arc<dyn ToolCheck>, runner: CommandRunner) -> Self {
        Self { tool_check, runner }
    }

    /// Detect a working build/test command
    ///
    /// Candidates run from `repo_root`; sub-projects are addressed through
    /// tool flags in the candidates themselves.
    pub async fn detect(&self, repo_root: &Path, project_dir: Option<&Path>) -> DetectionResult<Phase1Outcome> {
        let generator = checked_generator(repo_root, project_dir)?;
        let candidates = generator.build_candidates()?;
        info!(count = candidates.len(), "Generated build command candidates");

        Ok(self.run_candidates(BUILD_COMMAND_LABEL, &candidates, repo_root).await)
    }

    /// Detect a working formatter command, using the same policy
    pub async fn detect_format(&self, repo_root: &Path, project_dir: Option<&Path>) -> DetectionResult<Phase1Outcome> {
        let generator = checked_generator(repo_root, project_dir)?;
        let candidates = generator.format_candidates()?;
        info!(count = candidates.len(), "Generated format command candidates");

        Ok(self.run_candidates(FORMAT_COMMAND_LABEL, &candidates, repo_root).await)
    }

    /// Check, validate and run one candidate
    pub async fn evaluate(&self, label: &str, candidate: &str, cwd: &Path) -> CandidateOutcome {
        if let Some(executable) = base_executable(candidate) {
            if !self.tool_check.is_installed(executable, cwd).await {
                return CandidateOutcome::ToolAbsent;
            }
        }

        self.runner.attempt(label, candidate, cwd).await
    }

    async fn run_candidates(&self, label: &str, candidates: &[String], cwd: &Path) -> Phase1Outcome {
        let mut history = AttemptHistory::new();

        for candidate in candidates {
            // a panic costs this candidate only
            let outcome = match AssertUnwindSafe(self.evaluate(label, candidate, cwd))
                .catch_unwind()
                .await
            {
                Ok(outcome) => outcome,
                Err(_) => {
                    error!(command = %candidate, "Candidate evaluation panicked");
                    CandidateOutcome::unexpected()
                }
            };
            match &outcome {
                CandidateOutcome::Success => {
                    info!(command = %candidate, "Detected working command");
                    return Phase1Outcome {
                        command: Some(candidate.clone()),
                        history,
                        candidate_count: candidates.len(),
                    };
                }
                CandidateOutcome::ToolAbsent => {
                    debug!(command = %candidate, "Skipping candidate, tool not installed");
                }
                CandidateOutcome::ValidationRejected(err) => {
                    warn!(command = %candidate, error = %err, "Candidate rejected by validator");
                }
                CandidateOutcome::ExecutionFailed(_) => {
                    debug!(command = %candidate, "Candidate failed");
                }
            }

            if let Some(failure) = outcome.failure() {
                history.record(candidate.as_str(), failure);
            }
        }

        Phase1Outcome {
            command: None,
            history,
            candidate_count: candidates.len(),
        }
    }
}

fn checked_generator(repo_root: &Path, project_dir: Option<&Path>) -> DetectionResult<CandidateGenerator> {
    if !repo_root.is_dir() {
        return Err(DetectionError::NotADirectory(repo_root.to_path_buf()));
    }

    let generator = CandidateGenerator::new(repo_root, project_dir);
    if !generator.search_dir().is_dir() {
        return Err(DetectionError::ProjectDirMissing(PathBuf::from(generator.search_dir())));
    }

    Ok(generator)
}
