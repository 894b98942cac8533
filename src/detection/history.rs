use std::fmt;

/// Why a candidate or suggestion did not produce a working command
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptFailure {
    /// Rejected by the command validator, never executed
    ValidationFailed(String),
    /// Ran and exited non-zero; holds the condensed build output
    BuildFailed(String),
    /// Could not be run at all (spawn failure, timeout)
    ExecutionError(String),
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptFailure::ValidationFailed(reason) => write!(f, "validation failed: {}", reason),
            AttemptFailure::BuildFailed(output) => f.write_str(output),
            AttemptFailure::ExecutionError(reason) => write!(f, "execution error: {}", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attempt {
    pub command: String,
    pub failure: AttemptFailure,
}

impl Attempt {
    /// The error text shown to the reasoning collaborator
    pub fn error(&self) -> String {
        self.failure.to_string()
    }
}

/// Ordered record of failed attempts, carried from Phase 1 into Phase 2
///
/// Entries are only ever appended.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttemptHistory {
    entries: Vec<Attempt>,
}

impl AttemptHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, command: impl Into<String>, failure: AttemptFailure) {
        self.entries.push(Attempt {
            command: command.into(),
            failure,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attempt> {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&Attempt> {
        self.entries.last()
    }

    pub fn entries(&self) -> &[Attempt] {
        &self.entries
    }

    /// `(command, error)` pairs in attempt order
    pub fn pairs(&self) -> Vec<(String, String)> {
        self.entries.iter().map(|a| (a.command.clone(), a.error())).collect()
    }
}
