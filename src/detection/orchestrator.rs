use futures_util::FutureExt;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::ecosystem::{MarkerFile, discover_marker_files};
use super::history::AttemptHistory;
use super::phase1::{Phase1Detector, Phase1Outcome};
use super::tool_check::{ProcessToolCheck, ToolCheck};
use super::runner::CommandRunner;
use crate::audit::{AuditEvent, AuditLogger};
use crate::config::{Config, DetectionConfig};
use crate::error_translation::{BuildErrorExtractor, ErrorExtractor};
use crate::exec::{BuildExecutor, ShellExecutor};
use crate::llm::{AnthropicClient, ContextBuilder, LLMClient, RefinementAgent, RefinementOutcome};
use crate::security::CommandValidator;
use crate::util::text::ellipsize;

/// Returned when neither phase finds a working command
pub const NO_OP_BUILD_COMMAND: &str = "echo 'No build command detected - using no-op'";

const SNAPSHOT_CHARS: usize = 500;

/// Which stage produced the final command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionPhase {
    Deterministic,
    Refinement,
    Fallback,
}

impl fmt::Display for DetectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectionPhase::Deterministic => f.write_str("phase 1"),
            DetectionPhase::Refinement => f.write_str("phase 2"),
            DetectionPhase::Fallback => f.write_str("fallback"),
        }
    }
}

/// Full account of one detection run
#[derive(Debug, Clone)]
pub struct DetectionReport {
    pub command: String,
    pub phase: DetectionPhase,
    pub history: AttemptHistory,
    pub candidate_count: usize,
    pub llm_attempts: usize,
}

/// Runs deterministic detection, then LLM refinement, then falls back
///
/// `detect` always returns a non-empty command.
pub struct DetectionOrchestrator {
    phase1: Phase1Detector,
    runner: CommandRunner,
    config: DetectionConfig,
    llm: Option<Arc<dyn LLMClient>>,
    audit: Option<Arc<AuditLogger>>,
}

impl DetectionOrchestrator {
    pub fn new(
        validator: CommandValidator,
        tool_check: Arc<dyn ToolCheck>,
        executor: Arc<dyn BuildExecutor>,
        extractor: Arc<dyn ErrorExtractor>,
        config: DetectionConfig,
    ) -> Self {
        let runner = CommandRunner::new(Arc::new(validator), executor, extractor, config.build_timeout());

        Self {
            phase1: Phase1Detector::new(tool_check, runner.clone()),
            runner,
            config,
            llm: None,
            audit: None,
        }
    }

    /// Production wiring: real tool check, shell executor, and Anthropic when a key is available
    pub fn from_config(config: &Config) -> Self {
        let mut orchestrator = Self::new(
            CommandValidator::new(),
            Arc::new(ProcessToolCheck::new(config.detection.tool_check_timeout())),
            Arc::new(ShellExecutor::new()),
            Arc::new(BuildErrorExtractor::new()),
            config.detection.clone(),
        );

        match config.get_api_key() {
            Some(key) => {
                let client = AnthropicClient::with_model(key, config.llm.model.clone());
                orchestrator = orchestrator.with_llm(Arc::new(client));
            }
            None => warn!(env = %config.llm.api_key_env, "No API key configured, Phase 2 is disabled"),
        }

        if config.audit.enabled {
            let logger = match &config.audit.path {
                Some(path) => AuditLogger::with_path(path),
                None => AuditLogger::new(),
            };
            match logger {
                Ok(logger) => orchestrator = orchestrator.with_audit_logger(Arc::new(logger)),
                Err(err) => warn!(error = %err, "Audit log unavailable"),
            }
        }

        orchestrator
    }

    pub fn with_llm(mut self, client: Arc<dyn LLMClient>) -> Self {
        self.llm = Some(client);
        self
    }

    pub fn with_audit_logger(mut self, logger: Arc<AuditLogger>) -> Self {
        self.audit = Some(logger);
        self
    }

    /// Detect a build/test command; never fails and never returns empty
    pub async fn detect(
        &self,
        repo_root: &Path,
        project_dir: Option<&Path>,
        max_llm_attempts: usize,
        session_id: &str,
    ) -> String {
        self.detect_with_report(repo_root, project_dir, max_llm_attempts, session_id)
            .await
            .command
    }

    pub async fn detect_with_report(
        &self,
        repo_root: &Path,
        project_dir: Option<&Path>,
        max_llm_attempts: usize,
        session_id: &str,
    ) -> DetectionReport {
        info!(session_id, repo_root = %repo_root.display(), phase = "phase 1", "Starting deterministic detection");

        let phase1 = match AssertUnwindSafe(self.phase1.detect(repo_root, project_dir))
            .catch_unwind()
            .await
        {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => {
                error!(session_id, error = %err, "Phase 1 detection failed");
                Phase1Outcome::default()
            }
            Err(_) => {
                error!(session_id, "Phase 1 detection panicked");
                Phase1Outcome::default()
            }
        };

        let Phase1Outcome {
            command,
            history,
            candidate_count,
        } = phase1;

        if let Some(command) = command {
            let report = DetectionReport {
                command,
                phase: DetectionPhase::Deterministic,
                history,
                candidate_count,
                llm_attempts: 0,
            };
            self.audit_report(session_id, &report);
            return report;
        }

        warn!(
            session_id,
            candidates = candidate_count,
            failures = history.len(),
            phase = "phase 2",
            "Deterministic detection found no working command, starting LLM refinement"
        );

        let refinement = self
            .run_refinement(repo_root, project_dir, max_llm_attempts, session_id, history)
            .await;

        let report = match refinement.command {
            Some(command) => DetectionReport {
                command,
                phase: DetectionPhase::Refinement,
                history: refinement.history,
                candidate_count,
                llm_attempts: refinement.attempts_made,
            },
            None => {
                let snapshot = refinement
                    .history
                    .last()
                    .map(|last| ellipsize(&format!("{} -> {}", last.command, last.error()), SNAPSHOT_CHARS))
                    .unwrap_or_else(|| "no attempts recorded".to_string());
                warn!(
                    session_id,
                    fallback = NO_OP_BUILD_COMMAND,
                    attempts = refinement.history.len(),
                    last_failure = %snapshot,
                    "All detection attempts exhausted, using no-op build command"
                );

                DetectionReport {
                    command: NO_OP_BUILD_COMMAND.to_string(),
                    phase: DetectionPhase::Fallback,
                    history: refinement.history,
                    candidate_count,
                    llm_attempts: refinement.attempts_made,
                }
            }
        };

        self.audit_report(session_id, &report);
        report
    }

    /// Detect a formatter command; `None` when no candidate works
    pub async fn detect_format(&self, repo_root: &Path, project_dir: Option<&Path>, session_id: &str) -> Option<String> {
        match AssertUnwindSafe(self.phase1.detect_format(repo_root, project_dir))
            .catch_unwind()
            .await
        {
            Ok(Ok(outcome)) => {
                if outcome.command.is_none() {
                    info!(session_id, candidates = outcome.candidate_count, "No working format command found");
                }
                outcome.command
            }
            Ok(Err(err)) => {
                error!(session_id, error = %err, "Format detection failed");
                None
            }
            Err(_) => {
                error!(session_id, "Format detection panicked");
                None
            }
        }
    }

    async fn run_refinement(
        &self,
        repo_root: &Path,
        project_dir: Option<&Path>,
        max_llm_attempts: usize,
        session_id: &str,
        history: AttemptHistory,
    ) -> RefinementOutcome {
        let Some(client) = self.llm.clone() else {
            warn!(session_id, "No reasoning collaborator configured, skipping Phase 2");
            return RefinementOutcome {
                history,
                ..RefinementOutcome::default()
            };
        };

        if max_llm_attempts == 0 {
            return RefinementOutcome {
                history,
                ..RefinementOutcome::default()
            };
        }

        let target_dir = resolve_target_dir(repo_root, project_dir);
        let markers = match discover_marker_files(repo_root, &target_dir) {
            Ok(markers) => markers,
            Err(err) => {
                warn!(session_id, error = %err, "Could not list marker files");
                Vec::new()
            }
        };

        let agent = RefinementAgent::new(
            client,
            self.runner.clone(),
            ContextBuilder::new(self.config.tree_max_depth, self.config.tree_max_chars),
            max_llm_attempts,
            self.config.llm_timeout(),
        );

        let fallback_history = history.clone();
        let outcome = match AssertUnwindSafe(agent.refine(repo_root, &target_dir, &markers, history, session_id))
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(_) => {
                error!(session_id, "Phase 2 refinement panicked");
                RefinementOutcome {
                    history: fallback_history,
                    ..RefinementOutcome::default()
                }
            }
        };

        if outcome.command.is_none() {
            let last = outcome.history.last();
            warn!(
                session_id,
                markers = %render_markers(&markers),
                attempts = outcome.attempts_made,
                last_command = last.map(|a| a.command.as_str()).unwrap_or(""),
                last_error = %last.map(|a| ellipsize(&a.error(), SNAPSHOT_CHARS)).unwrap_or_default(),
                "LLM refinement exhausted without a working command"
            );
        }

        outcome
    }

    /// One line per failed attempt, then the final decision
    fn audit_report(&self, session_id: &str, report: &DetectionReport) {
        let Some(audit) = &self.audit else {
            return;
        };

        let mut results = Vec::new();
        for attempt in report.history.iter() {
            results.push(audit.log_attempt(session_id, attempt));
        }

        let (event, reason) = match report.phase {
            DetectionPhase::Fallback => (AuditEvent::Fallback, "no working command found".to_string()),
            phase => (AuditEvent::Accepted, format!("detected in {}", phase)),
        };
        results.push(audit.log_event(session_id, event, &report.command, &reason));

        for err in results.into_iter().filter_map(Result::err) {
            warn!(session_id, error = %err, "Failed to write audit log entry");
        }
    }
}

fn resolve_target_dir(repo_root: &Path, project_dir: Option<&Path>) -> PathBuf {
    match project_dir {
        Some(dir) if dir.is_absolute() => dir.to_path_buf(),
        Some(dir) => repo_root.join(dir),
        None => repo_root.to_path_buf(),
    }
}

fn render_markers(markers: &[MarkerFile]) -> String {
    if markers.is_empty() {
        return "none".to_string();
    }
    markers.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}
