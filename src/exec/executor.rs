use async_trait::async_trait;
use std::io;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Errors raised when a process could not be run to completion
///
/// An ordinary non-zero exit is not an error: it comes back as a
/// `CommandOutput` with `success == false`.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to start '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("'{command}' timed out after {}s", .timeout.as_secs())]
    Timeout { command: String, timeout: Duration },

    #[error("I/O error while running '{command}': {source}")]
    Io {
        command: String,
        #[source]
        source: io::Error,
    },
}

impl ExecError {
    /// The binary could not be found or started
    pub fn is_not_found(&self) -> bool {
        matches!(self, ExecError::Spawn { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ExecError::Timeout { .. })
    }
}

/// Result of running a command to completion
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// stdout followed by stderr
    pub output: String,
    pub exit_code: Option<i32>,
    pub success: bool,
}

/// Runs build commands on behalf of the detectors
#[async_trait]
pub trait BuildExecutor: Send + Sync {
    /// Run a validated command line in `cwd`, bounded by `timeout`
    async fn run(&self, command: &str, cwd: &Path, timeout: Duration) -> Result<CommandOutput, ExecError>;
}

/// Executes commands through the platform shell
#[derive(Debug, Clone, Default)]
pub struct ShellExecutor;

impl ShellExecutor {
    pub fn new() -> Self {
        Self
    }

    /// Run a program directly with an argument vector, no shell involved
    pub async fn run_program(
        &self,
        program: &str,
        args: &[&str],
        cwd: &Path,
        timeout: Duration,
    ) -> Result<CommandOutput, ExecError> {
        let mut cmd = Command::new(program);
        cmd.args(args).current_dir(cwd);

        let display = std::iter::once(program)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");
        wait_with_timeout(cmd, &display, timeout).await
    }

    fn shell_command(command: &str) -> Command {
        #[cfg(windows)]
        {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(command);
            cmd
        }
        #[cfg(not(windows))]
        {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(command);
            cmd
        }
    }
}

#[async_trait]
impl BuildExecutor for ShellExecutor {
    async fn run(&self, command: &str, cwd: &Path, timeout: Duration) -> Result<CommandOutput, ExecError> {
        let mut cmd = Self::shell_command(command);
        cmd.current_dir(cwd);
        wait_with_timeout(cmd, command, timeout).await
    }
}

async fn wait_with_timeout(mut cmd: Command, display: &str, timeout: Duration) -> Result<CommandOutput, ExecError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    // the command leads its own group so a timeout reaches whatever it forked
    #[cfg(unix)]
    cmd.process_group(0);

    let child = cmd.spawn().map_err(|source| ExecError::Spawn {
        command: display.to_string(),
        source,
    })?;
    let pid = child.id();

    // dropping the timed-out future drops the child, which kills it
    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result.map_err(|source| ExecError::Io {
            command: display.to_string(),
            source,
        })?,
        Err(_) => {
            if let Some(pid) = pid {
                kill_process_group(pid, display);
            }
            return Err(ExecError::Timeout {
                command: display.to_string(),
                timeout,
            });
        }
    };

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));

    Ok(CommandOutput {
        output: combined,
        exit_code: output.status.code(),
        success: output.status.success(),
    })
}

#[cfg(unix)]
fn kill_process_group(pid: u32, display: &str) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;
    use tracing::warn;

    #[allow(clippy::cast_possible_wrap)]
    let group = Pid::from_raw(pid as i32);
    // ESRCH means the group already exited
    if let Err(e) = killpg(group, Signal::SIGKILL) {
        if e != nix::errno::Errno::ESRCH {
            let command = display;
            warn!(command = %command, error = %e, "Could not kill timed-out process group");
        }
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: u32, _display: &str) {}
