#![allow(dead_code)]

use async_trait::async_trait;
use buildscout::config::DetectionConfig;
use buildscout::detection::{DetectionOrchestrator, ToolCheck};
use buildscout::error_translation::BuildErrorExtractor;
use buildscout::exec::{BuildExecutor, CommandOutput, ExecError};
use buildscout::llm::{LLMClient, LLMError, SuggestedCommand};
use buildscout::security::CommandValidator;
use std::collections::{HashSet, VecDeque};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Create a throwaway repository containing the given files
///
/// Paths may include directories; files get empty content unless they are
/// listed in `contents`.
pub fn create_repo(files: &[&str]) -> TempDir {
    create_repo_with(files, &[])
}

pub fn create_repo_with(files: &[&str], contents: &[(&str, &str)]) -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    for file in files {
        let path = temp_dir.path().join(file);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, "").unwrap();
    }
    for (file, content) in contents {
        let path = temp_dir.path().join(file);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
    }
    temp_dir
}

/// Tool check that reports every tool installed except the listed ones
#[derive(Default)]
pub struct MockToolCheck {
    missing: HashSet<String>,
    checked: Mutex<Vec<String>>,
}

impl MockToolCheck {
    pub fn all_installed() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn missing(tools: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            missing: tools.iter().map(|t| t.to_string()).collect(),
            checked: Mutex::new(Vec::new()),
        })
    }

    pub fn checked(&self) -> Vec<String> {
        self.checked.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolCheck for MockToolCheck {
    async fn is_installed(&self, executable: &str, _cwd: &Path) -> bool {
        self.checked.lock().unwrap().push(executable.to_string());
        !self.missing.contains(executable)
    }
}

/// Executor that succeeds only for the listed commands and records every run
pub struct ScriptedExecutor {
    succeeding: HashSet<String>,
    failure_output: String,
    runs: Mutex<Vec<String>>,
}

impl ScriptedExecutor {
    pub fn succeeding(commands: &[&str]) -> Arc<Self> {
        Self::with_failure_output(commands, "ERROR: tests failed")
    }

    pub fn failing() -> Arc<Self> {
        Self::succeeding(&[])
    }

    pub fn with_failure_output(commands: &[&str], output: &str) -> Arc<Self> {
        Arc::new(Self {
            succeeding: commands.iter().map(|c| c.to_string()).collect(),
            failure_output: output.to_string(),
            runs: Mutex::new(Vec::new()),
        })
    }

    pub fn runs(&self) -> Vec<String> {
        self.runs.lock().unwrap().clone()
    }

    pub fn run_count(&self) -> usize {
        self.runs.lock().unwrap().len()
    }
}

#[async_trait]
impl BuildExecutor for ScriptedExecutor {
    async fn run(&self, command: &str, _cwd: &Path, _timeout: Duration) -> Result<CommandOutput, ExecError> {
        self.runs.lock().unwrap().push(command.to_string());

        if self.succeeding.contains(command) {
            Ok(CommandOutput {
                output: "BUILD SUCCESS".to_string(),
                exit_code: Some(0),
                success: true,
            })
        } else {
            Ok(CommandOutput {
                output: self.failure_output.clone(),
                exit_code: Some(1),
                success: false,
            })
        }
    }
}

/// Executor that panics on the listed commands and otherwise behaves like
/// [`ScriptedExecutor`]
pub struct PanickingExecutor {
    panics_on: HashSet<String>,
    inner: Arc<ScriptedExecutor>,
}

impl PanickingExecutor {
    pub fn new(panics_on: &[&str], succeeding: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            panics_on: panics_on.iter().map(|c| c.to_string()).collect(),
            inner: ScriptedExecutor::succeeding(succeeding),
        })
    }

    /// Commands that reached the executor without panicking
    pub fn runs(&self) -> Vec<String> {
        self.inner.runs()
    }
}

#[async_trait]
impl BuildExecutor for PanickingExecutor {
    async fn run(&self, command: &str, cwd: &Path, timeout: Duration) -> Result<CommandOutput, ExecError> {
        if self.panics_on.contains(command) {
            panic!("executor blew up on {}", command);
        }
        self.inner.run(command, cwd, timeout).await
    }
}

/// Reasoning collaborator that replays queued responses
///
/// Once the queue is drained it keeps returning `default`, or an error when
/// there is no default.
pub struct ScriptedLLM {
    responses: Mutex<VecDeque<String>>,
    default: Option<String>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLLM {
    pub fn with_responses(responses: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.iter().map(|r| r.to_string()).collect()),
            default: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn repeating(response: &str) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(VecDeque::new()),
            default: Some(response.to_string()),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LLMClient for ScriptedLLM {
    async fn suggest_command(
        &self,
        prompt: &str,
        _target_dir: &Path,
        _session_id: &str,
    ) -> Result<SuggestedCommand, LLMError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());

        let next = self.responses.lock().unwrap().pop_front();
        match next.or_else(|| self.default.clone()) {
            Some(command) => Ok(SuggestedCommand {
                command,
                explanation: None,
            }),
            None => Err(LLMError::ApiError("no scripted response left".to_string())),
        }
    }
}

/// Collaborator that reports a rate limit on the listed calls, then answers from `inner`
pub struct RateLimitedLLM {
    limited_calls: HashSet<usize>,
    wait_secs: u64,
    calls: AtomicUsize,
    inner: Arc<ScriptedLLM>,
}

impl RateLimitedLLM {
    pub fn new(limited_calls: &[usize], wait_secs: u64, inner: Arc<ScriptedLLM>) -> Arc<Self> {
        Arc::new(Self {
            limited_calls: limited_calls.iter().copied().collect(),
            wait_secs,
            calls: AtomicUsize::new(0),
            inner,
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LLMClient for RateLimitedLLM {
    async fn suggest_command(
        &self,
        prompt: &str,
        target_dir: &Path,
        session_id: &str,
    ) -> Result<SuggestedCommand, LLMError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.limited_calls.contains(&call) {
            return Err(LLMError::RateLimitExceeded(self.wait_secs));
        }
        self.inner.suggest_command(prompt, target_dir, session_id).await
    }
}

/// Collaborator that panics on every call
pub struct PanickingLLM;

#[async_trait]
impl LLMClient for PanickingLLM {
    async fn suggest_command(
        &self,
        _prompt: &str,
        _target_dir: &Path,
        _session_id: &str,
    ) -> Result<SuggestedCommand, LLMError> {
        panic!("collaborator exploded");
    }
}

/// Collaborator that never answers
pub struct HangingLLM;

#[async_trait]
impl LLMClient for HangingLLM {
    async fn suggest_command(
        &self,
        _prompt: &str,
        _target_dir: &Path,
        _session_id: &str,
    ) -> Result<SuggestedCommand, LLMError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Err(LLMError::Timeout)
    }
}

pub fn test_config() -> DetectionConfig {
    DetectionConfig {
        llm_timeout_secs: 1,
        ..DetectionConfig::default()
    }
}

/// Orchestrator wired with test doubles and the default policy
pub fn orchestrator(tool_check: Arc<dyn ToolCheck>, executor: Arc<dyn BuildExecutor>) -> DetectionOrchestrator {
    orchestrator_with_validator(CommandValidator::new(), tool_check, executor)
}

pub fn orchestrator_with_validator(
    validator: CommandValidator,
    tool_check: Arc<dyn ToolCheck>,
    executor: Arc<dyn BuildExecutor>,
) -> DetectionOrchestrator {
    DetectionOrchestrator::new(
        validator,
        tool_check,
        executor,
        Arc::new(BuildErrorExtractor::new()),
        test_config(),
    )
}
