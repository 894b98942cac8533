use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::exec::ShellExecutor;

/// Flags tried in order when checking whether a tool is installed
pub const CHECK_FLAGS: &[&str] = &["--version", "--help", "-v", "-h"];

/// Answers whether an executable is present and runnable
#[async_trait]
pub trait ToolCheck: Send + Sync {
    async fn is_installed(&self, executable: &str, cwd: &Path) -> bool;
}

/// Checks tools by running them with harmless informational flags
///
/// Exit code 0 or 1 counts as present; a spawn failure or timeout moves on
/// to the next flag.
#[derive(Debug, Clone)]
pub struct ProcessToolCheck {
    executor: ShellExecutor,
    timeout: Duration,
}

impl ProcessToolCheck {
    pub fn new(timeout: Duration) -> Self {
        Self {
            executor: ShellExecutor::new(),
            timeout,
        }
    }
}

#[async_trait]
impl ToolCheck for ProcessToolCheck {
    async fn is_installed(&self, executable: &str, cwd: &Path) -> bool {
        for flag in CHECK_FLAGS {
            match self.executor.run_program(executable, &[*flag], cwd, self.timeout).await {
                Ok(output) if matches!(output.exit_code, Some(0) | Some(1)) => return true,
                Ok(output) => {
                    debug!(executable, flag, exit_code = ?output.exit_code, "Check flag not accepted");
                }
                Err(err) if err.is_not_found() => {
                    debug!(executable, "Executable not found");
                    return false;
                }
                Err(err) => {
                    debug!(executable, flag, error = %err, "Tool check attempt failed");
                }
            }
        }

        false
    }
}

/// First whitespace-delimited token of a command line
pub fn base_executable(command: &str) -> Option<&str> {
    command.split_whitespace().next()
}
