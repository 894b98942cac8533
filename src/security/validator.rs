use std::borrow::Cow;
use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;

use regex::{Regex, RegexSet};
use thiserror::Error;

use crate::security::{ALLOWED_COMMANDS, ALLOWED_OPERATORS, BLOCKED_PATTERNS, SHELL_INTERPRETERS};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{label} is empty or contains only whitespace")]
    EmptyCommand { label: String },

    #[error("{label} contains dangerous pattern: {pattern}")]
    DangerousPattern { label: String, pattern: String },

    #[error("{label} uses disallowed operator: {operator}")]
    DisallowedOperator { label: String, operator: String },

    #[error("{label} uses disallowed command: {executable}")]
    DisallowedCommand { label: String, executable: String },

    #[error("{label} uses shell command incorrectly: {segment} (sh/bash may only run a .sh script)")]
    ShellMisuse { label: String, segment: String },

    #[error("{label} contains unsafe file redirect: {target}")]
    UnsafeRedirect { label: String, target: String },

    #[error("{label} has unbalanced quotes")]
    UnbalancedQuotes { label: String },
}

static DEFAULT_BLOCKED: LazyLock<RegexSet> =
    LazyLock::new(|| RegexSet::new(BLOCKED_PATTERNS).expect("built-in blocked patterns compile"));

// backslash-newline, with the newline's surrounding blanks (but not further newlines)
static LINE_CONTINUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\[ \t]*\r?\n[ \t]*").expect("continuation regex compiles"));

// > file, >> file, 2> file, &> file, >&word, 2>&1; the word stops at blanks and operators
static REDIRECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\d+|&)?>>?(&?)\s*([^\s&|;<>]*)").expect("redirect regex compiles")
});

/// Immutable policy tables consulted by [`CommandValidator`]
#[derive(Debug, Clone)]
pub struct CommandPolicy {
    allowed_commands: HashSet<String>,
    allowed_operators: HashSet<String>,
    blocked_patterns: RegexSet,
}

impl CommandPolicy {
    /// Build a policy from explicit tables
    pub fn new<C, O, P>(commands: C, operators: O, patterns: P) -> Result<Self, regex::Error>
    where
        C: IntoIterator,
        C::Item: Into<String>,
        O: IntoIterator,
        O::Item: Into<String>,
        P: IntoIterator,
        P::Item: AsRef<str>,
    {
        Ok(Self {
            allowed_commands: commands.into_iter().map(Into::into).collect(),
            allowed_operators: operators.into_iter().map(Into::into).collect(),
            blocked_patterns: RegexSet::new(patterns)?,
        })
    }

    /// Derive a policy that no longer permits `executable`
    pub fn without_command(mut self, executable: &str) -> Self {
        self.allowed_commands.remove(executable);
        self
    }

    /// Derive a policy that additionally permits `executable`
    pub fn with_command(mut self, executable: &str) -> Self {
        self.allowed_commands.insert(executable.to_string());
        self
    }

    /// Derive a policy that no longer permits a chain operator
    pub fn without_operator(mut self, operator: &str) -> Self {
        self.allowed_operators.remove(operator);
        self
    }

    pub fn allows_command(&self, executable: &str) -> bool {
        self.allowed_commands.contains(executable)
    }

    pub fn allows_operator(&self, operator: &str) -> bool {
        self.allowed_operators.contains(operator)
    }

    /// Return the first blocked pattern the command matches
    pub fn blocked_pattern(&self, command: &str) -> Option<&str> {
        self.blocked_patterns
            .matches(command)
            .iter()
            .next()
            .map(|idx| self.blocked_patterns.patterns()[idx].as_str())
    }
}

impl Default for CommandPolicy {
    fn default() -> Self {
        Self {
            allowed_commands: ALLOWED_COMMANDS.iter().map(|c| c.to_string()).collect(),
            allowed_operators: ALLOWED_OPERATORS.iter().map(|o| o.to_string()).collect(),
            blocked_patterns: DEFAULT_BLOCKED.clone(),
        }
    }
}

/// One command segment and the chain operator that followed it
#[derive(Debug, Clone, PartialEq)]
struct Segment {
    text: String,
    operator: Option<&'static str>,
}

#[derive(Debug, PartialEq)]
enum SplitError {
    Operator(String),
    UnbalancedQuotes,
}

/// Fail-closed policy check for build and format commands
///
/// False positives (rejecting a benign command) are acceptable; anything the
/// tokenizer cannot account for is rejected rather than guessed at.
#[derive(Debug, Clone, Default)]
pub struct CommandValidator {
    policy: CommandPolicy,
}

impl CommandValidator {
    pub fn new() -> Self {
        Self::with_policy(CommandPolicy::default())
    }

    pub fn with_policy(policy: CommandPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &CommandPolicy {
        &self.policy
    }

    /// Validate a command; `label` names the setting in error messages
    pub fn validate(&self, label: &str, command: &str) -> Result<(), ValidationError> {
        if command.trim().is_empty() {
            return Err(ValidationError::EmptyCommand { label: label.to_string() });
        }

        let command = normalize_continuations(command);

        if let Some(pattern) = self.policy.blocked_pattern(&command) {
            return Err(ValidationError::DangerousPattern {
                label: label.to_string(),
                pattern: pattern.to_string(),
            });
        }

        let segments = split_command_chain(&command).map_err(|e| match e {
            SplitError::Operator(operator) => ValidationError::DisallowedOperator {
                label: label.to_string(),
                operator,
            },
            SplitError::UnbalancedQuotes => ValidationError::UnbalancedQuotes { label: label.to_string() },
        })?;

        let mut saw_executable = false;

        for segment in &segments {
            if let Some(operator) = segment.operator {
                if !self.policy.allows_operator(operator) {
                    return Err(ValidationError::DisallowedOperator {
                        label: label.to_string(),
                        operator: operator.to_string(),
                    });
                }
            }

            let (executable, args) = parse_segment(&segment.text);

            if !executable.is_empty() {
                saw_executable = true;

                if !self.policy.allows_command(&executable) {
                    return Err(ValidationError::DisallowedCommand {
                        label: label.to_string(),
                        executable,
                    });
                }

                if !is_valid_shell_invocation(&executable, &args) {
                    return Err(ValidationError::ShellMisuse {
                        label: label.to_string(),
                        segment: segment.text.clone(),
                    });
                }
            }

            // redirect-only segments still get their targets checked
            for target in extract_redirects(&segment.text) {
                if !is_safe_redirect(&target) {
                    return Err(ValidationError::UnsafeRedirect {
                        label: label.to_string(),
                        target,
                    });
                }
            }
        }

        if !saw_executable {
            return Err(ValidationError::EmptyCommand { label: label.to_string() });
        }

        Ok(())
    }

    /// Convenience wrapper for callers that only need a yes/no answer
    pub fn is_allowed(&self, command: &str) -> bool {
        self.validate("command", command).is_ok()
    }
}

/// Join backslash-newline continuations into a single line
fn normalize_continuations(command: &str) -> Cow<'_, str> {
    LINE_CONTINUATION.replace_all(command, " ")
}

/// Split on chain operators outside quotes, remembering which operator
/// followed each segment
fn split_command_chain(command: &str) -> Result<Vec<Segment>, SplitError> {
    let chars: Vec<char> = command.chars().collect();
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        if let Some(open) = quote {
            current.push(c);
            if c == open {
                quote = None;
            } else if open == '"' && c == '\\' {
                if let Some(escaped) = next {
                    current.push(escaped);
                    i += 1;
                }
            }
            i += 1;
            continue;
        }

        let operator = match (c, next) {
            ('&', Some('&')) => Some("&&"),
            ('|', Some('|')) => Some("||"),
            ('|', _) => Some("|"),
            (';', _) => Some(";"),
            _ => None,
        };

        if let Some(op) = operator {
            push_segment(&mut segments, &mut current, Some(op));
            i += op.len();
            continue;
        }

        match c {
            '\'' | '"' => {
                quote = Some(c);
                current.push(c);
            }
            '\\' => {
                current.push(c);
                if let Some(escaped) = next {
                    current.push(escaped);
                    i += 1;
                }
            }
            // part of a redirect: 2>&1, >&2, &>file
            '&' if current.ends_with('>') || next == Some('>') => current.push(c),
            '&' => return Err(SplitError::Operator("&".to_string())),
            '\n' | '\r' => return Err(SplitError::Operator("newline".to_string())),
            '(' | ')' => return Err(SplitError::Operator(c.to_string())),
            _ => current.push(c),
        }
        i += 1;
    }

    if quote.is_some() {
        return Err(SplitError::UnbalancedQuotes);
    }

    push_segment(&mut segments, &mut current, None);
    Ok(segments)
}

fn push_segment(segments: &mut Vec<Segment>, current: &mut String, operator: Option<&'static str>) {
    let text = current.trim();
    if !text.is_empty() {
        segments.push(Segment {
            text: text.to_string(),
            operator,
        });
    }
    current.clear();
}

/// Split a segment into executable and arguments, ignoring redirects
fn parse_segment(segment: &str) -> (String, Vec<String>) {
    let without_redirects = REDIRECT.replace_all(segment, " ");

    let parts = shell_words::split(&without_redirects).unwrap_or_else(|_| {
        without_redirects
            .split_whitespace()
            .map(str::to_string)
            .collect()
    });

    let mut parts = parts.into_iter();
    match parts.next() {
        Some(executable) => (executable, parts.collect()),
        None => (String::new(), Vec::new()),
    }
}

/// File targets of every redirect in `segment`
///
/// `>&N` and `>&-` only duplicate or close descriptors and are skipped. Any
/// other word after `>&` is a file, as bash treats `>& path` like `&> path`.
/// A redirect with no word at all comes back as the bare expression.
fn extract_redirects(segment: &str) -> Vec<String> {
    REDIRECT
        .captures_iter(segment)
        .filter_map(|caps| {
            let duplicates = !caps[1].is_empty();
            let word = &caps[2];
            if word.is_empty() {
                return Some(caps[0].trim().to_string());
            }
            if duplicates && is_descriptor(word) {
                return None;
            }
            Some(word.to_string())
        })
        .collect()
}

fn is_descriptor(word: &str) -> bool {
    let digits = word.strip_suffix('-').unwrap_or(word);
    word == "-" || (!digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()))
}

fn is_safe_redirect(target: &str) -> bool {
    let target = target.trim_matches(|c| c == '"' || c == '\'');

    !(target.is_empty()
        || target.contains('>')
        || target.starts_with('/')
        || target.starts_with('\\')
        || target.starts_with('~')
        || target.contains("..")
        || target.contains('$')
        || Path::new(target).is_absolute())
}

/// `sh`/`bash` may only run a script: no inline `-c`, and the first
/// non-flag argument must be a `.sh` file
fn is_valid_shell_invocation(executable: &str, args: &[String]) -> bool {
    if !SHELL_INTERPRETERS.contains(&executable) {
        return true;
    }

    if args.iter().any(|arg| is_inline_script_flag(arg)) {
        return false;
    }

    args.iter()
        .find(|arg| !arg.starts_with('-'))
        .is_some_and(|script| script.ends_with(".sh"))
}

// -c, and short-flag clusters carrying it such as -xc or -ec
fn is_inline_script_flag(arg: &str) -> bool {
    arg.starts_with('-') && !arg.starts_with("--") && arg[1..].contains('c')
}
