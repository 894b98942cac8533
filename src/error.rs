use std::io;
use std::path::PathBuf;
use thiserror::Error;

// Import module-level errors for AppError
use crate::config::settings::ConfigError;
use crate::exec::executor::ExecError;
use crate::llm::client::LLMError;
use crate::security::validator::ValidationError;

/// Errors that abort a detection phase
///
/// Per-candidate failures are never errors; they are recorded in the
/// attempt history instead.
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("Repository root is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("Project directory does not exist: {}", .0.display())]
    ProjectDirMissing(PathBuf),

    #[error("Failed to inspect repository: {0}")]
    IoError(#[from] io::Error),
}

/// Top-level application error that wraps all module-specific errors
///
/// This provides a unified error type for application-level code while preserving
/// the specific error context from each module. All module errors automatically
/// convert to AppError via the `From` trait.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Detection error: {0}")]
    Detection(#[from] DetectionError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("LLM error: {0}")]
    Llm(#[from] LLMError),

    #[error("Security validation error: {0}")]
    Security(#[from] ValidationError),

    #[error("Execution error: {0}")]
    Exec(#[from] ExecError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for detection phases
pub type DetectionResult<T> = std::result::Result<T, DetectionError>;

/// Result type for application-level operations
pub type AppResult<T> = std::result::Result<T, AppError>;
