pub mod audit;
pub mod config;
pub mod detection;
pub mod error;
pub mod error_translation;
pub mod exec;
pub mod llm;
pub mod security;
pub mod util;

// Re-export commonly used types for convenience
pub use detection::{DetectionOrchestrator, DetectionReport, NO_OP_BUILD_COMMAND};
pub use error::{AppError, AppResult, DetectionError};
pub use security::CommandValidator;
