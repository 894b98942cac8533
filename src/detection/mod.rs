pub mod candidates;
pub mod ecosystem;
pub mod history;
pub mod orchestrator;
pub mod phase1;
pub mod tool_check;
pub mod runner;

pub use candidates::{CandidateGenerator, generate_build_candidates, inspect_makefile_targets};
pub use ecosystem::{Ecosystem, MarkerFile, NodePackageManager, classify, discover_marker_files};
pub use history::{Attempt, AttemptFailure, AttemptHistory};
pub use orchestrator::{DetectionOrchestrator, DetectionPhase, DetectionReport, NO_OP_BUILD_COMMAND};
pub use phase1::{BUILD_COMMAND_LABEL, FORMAT_COMMAND_LABEL, Phase1Detector, Phase1Outcome};
pub use tool_check::{CHECK_FLAGS, ProcessToolCheck, ToolCheck};
pub use runner::{CandidateOutcome, CommandRunner, UNEXPECTED_ERROR};
