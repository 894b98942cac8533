use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use chrono::Utc;

use crate::detection::history::{Attempt, AttemptFailure};
use crate::util::text::ellipsize;

const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024; // 10MB
const MAX_REASON_CHARS: usize = 500;

/// Kinds of detection events written to the audit log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditEvent {
    Accepted,
    ValidationRejected,
    BuildFailed,
    Fallback,
}

impl AuditEvent {
    pub fn tag(&self) -> &'static str {
        match self {
            AuditEvent::Accepted => "ACCEPTED",
            AuditEvent::ValidationRejected => "VALIDATION-REJECTED",
            AuditEvent::BuildFailed => "BUILD-FAILED",
            AuditEvent::Fallback => "FALLBACK",
        }
    }
}

impl fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl From<&AttemptFailure> for AuditEvent {
    fn from(failure: &AttemptFailure) -> Self {
        match failure {
            AttemptFailure::ValidationFailed(_) => AuditEvent::ValidationRejected,
            AttemptFailure::BuildFailed(_) | AttemptFailure::ExecutionError(_) => AuditEvent::BuildFailed,
        }
    }
}

/// Append-only record of every command considered during detection
pub struct AuditLogger {
    log_path: PathBuf,
}

impl AuditLogger {
    /// Create a new AuditLogger with the default log path
    pub fn new() -> std::io::Result<Self> {
        Self::with_path(Self::default_log_path()?)
    }

    /// Create an AuditLogger with a custom log path
    pub fn with_path<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let log_path = path.as_ref().to_path_buf();

        // Ensure directory exists
        if let Some(parent) = log_path.parent() {
            fs::create_dir_all(parent)?;
        }

        Ok(Self { log_path })
    }

    /// Get the default log path: ~/.config/buildscout/audit.log
    fn default_log_path() -> std::io::Result<PathBuf> {
        let home = std::env::var("HOME").map_err(|_| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "HOME environment variable not set")
        })?;

        Ok(PathBuf::from(home).join(".config").join("buildscout").join("audit.log"))
    }

    /// Log one detection event
    pub fn log_event(&self, session_id: &str, event: AuditEvent, command: &str, reason: &str) -> std::io::Result<()> {
        // Check and rotate log if needed
        self.rotate_if_needed()?;

        let timestamp = Utc::now().to_rfc3339();
        let reason = ellipsize(&reason.replace('\n', "\\n"), MAX_REASON_CHARS);

        let log_entry = format!(
            "[{}] [{}] [{}] command=\"{}\" reason=\"{}\"\n",
            timestamp, session_id, event, command, reason
        );

        let mut file = OpenOptions::new().create(true).append(true).open(&self.log_path)?;

        file.write_all(log_entry.as_bytes())?;
        file.flush()?;

        Ok(())
    }

    /// Log a failed attempt from the history
    pub fn log_attempt(&self, session_id: &str, attempt: &Attempt) -> std::io::Result<()> {
        self.log_event(session_id, AuditEvent::from(&attempt.failure), &attempt.command, &attempt.error())
    }

    /// Rotate log file if it exceeds MAX_LOG_SIZE
    fn rotate_if_needed(&self) -> std::io::Result<()> {
        if !self.log_path.exists() {
            return Ok(());
        }

        let metadata = fs::metadata(&self.log_path)?;
        if metadata.len() > MAX_LOG_SIZE {
            // Rotate: audit.log -> audit.log.1
            let backup_path = self.log_path.with_extension("log.1");
            fs::rename(&self.log_path, backup_path)?;
        }

        Ok(())
    }

    /// Get the path to the log file
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }
}
