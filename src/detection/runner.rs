use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::history::AttemptFailure;
use crate::error_translation::ErrorExtractor;
use crate::exec::BuildExecutor;
use crate::security::{CommandValidator, ValidationError};

/// Recorded when trying a command panicked
pub const UNEXPECTED_ERROR: &str = "unexpected error";

/// Outcome of trying a single command
#[derive(Debug, Clone, PartialEq)]
pub enum CandidateOutcome {
    Success,
    /// The base executable is not installed; nothing was recorded
    ToolAbsent,
    ValidationRejected(ValidationError),
    ExecutionFailed(AttemptFailure),
}

impl CandidateOutcome {
    /// Stand-in outcome for an attempt that panicked
    pub fn unexpected() -> Self {
        CandidateOutcome::ExecutionFailed(AttemptFailure::ExecutionError(UNEXPECTED_ERROR.to_string()))
    }

    /// The history entry this outcome produces, if any
    pub fn failure(&self) -> Option<AttemptFailure> {
        match self {
            CandidateOutcome::Success | CandidateOutcome::ToolAbsent => None,
            CandidateOutcome::ValidationRejected(err) => Some(AttemptFailure::ValidationFailed(err.to_string())),
            CandidateOutcome::ExecutionFailed(failure) => Some(failure.clone()),
        }
    }
}

/// Validates a command and, if accepted, runs it and condenses any failure
///
/// Shared by both detection phases so they enforce the same policy.
#[derive(Clone)]
pub struct CommandRunner {
    validator: Arc<CommandValidator>,
    executor: Arc<dyn BuildExecutor>,
    extractor: Arc<dyn ErrorExtractor>,
    build_timeout: Duration,
}

impl CommandRunner {
    pub fn new(
        validator: Arc<CommandValidator>,
        executor: Arc<dyn BuildExecutor>,
        extractor: Arc<dyn ErrorExtractor>,
        build_timeout: Duration,
    ) -> Self {
        Self {
            validator,
            executor,
            extractor,
            build_timeout,
        }
    }

    pub fn validator(&self) -> &CommandValidator {
        &self.validator
    }

    /// Validate `command` under `label` and run it from `cwd`
    ///
    /// Never returns `ToolAbsent`; existence probing is the caller's concern.
    pub async fn attempt(&self, label: &str, command: &str, cwd: &Path) -> CandidateOutcome {
        if let Err(err) = self.validator.validate(label, command) {
            debug!(command, error = %err, "Command rejected by validator");
            return CandidateOutcome::ValidationRejected(err);
        }

        info!(command, "Running build command");
        match self.executor.run(command, cwd, self.build_timeout).await {
            Ok(output) if output.success => CandidateOutcome::Success,
            Ok(output) => {
                debug!(command, exit_code = ?output.exit_code, "Build command failed");
                CandidateOutcome::ExecutionFailed(AttemptFailure::BuildFailed(self.extractor.extract(&output.output)))
            }
            Err(err) => {
                debug!(command, error = %err, "Build command could not be run");
                CandidateOutcome::ExecutionFailed(AttemptFailure::ExecutionError(err.to_string()))
            }
        }
    }
}
