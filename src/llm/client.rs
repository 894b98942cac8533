use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during LLM operations
#[derive(Debug, Error)]
pub enum LLMError {
    #[error("API request failed: {0}")]
    ApiError(String),

    #[error("Rate limit exceeded, retry after {0}s")]
    RateLimitExceeded(u64),

    #[error("Request timeout")]
    Timeout,

    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// A build command proposed by the reasoning collaborator
#[derive(Debug, Clone)]
pub struct SuggestedCommand {
    pub command: String,
    pub explanation: Option<String>,
}

/// Trait for reasoning collaborators that propose build commands
///
/// Suggestions are untrusted: callers validate them before running anything.
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Propose one build/test command for the project at `target_dir`
    async fn suggest_command(
        &self,
        prompt: &str,
        target_dir: &Path,
        session_id: &str,
    ) -> Result<SuggestedCommand, LLMError>;
}
