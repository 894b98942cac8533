use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, warn};

use crate::detection::ecosystem::MarkerFile;
use crate::detection::history::AttemptHistory;
use crate::util::text::truncate_chars;

pub const DEFAULT_TREE_DEPTH: usize = 3;
pub const DEFAULT_TREE_CHARS: usize = 8000;
/// Prompt budget; the directory tree is cut first when it is exceeded
pub const MAX_PROMPT_TOKENS: usize = 12_000;

const TREE_UNAVAILABLE: &str = "[Directory tree unavailable]";
const SKIPPED_DIRS: &[&str] = &["node_modules", "__pycache__", "target", "build", "dist", ".venv", "venv"];

const TASK: &str = "Suggest a build/test command that will successfully run tests \
based on the project structure and error patterns above.\n";

/// Phase 2 prompt pieces with token budget tracking
#[derive(Debug, Clone)]
pub struct PromptContext {
    pub project_structure: String,
    pub directory_tree: String,
    pub attempt_history: Option<String>,
    pub estimated_tokens: usize,
}

impl PromptContext {
    /// Render the full prompt
    pub fn render(&self) -> String {
        let mut prompt = String::new();
        prompt.push_str(&self.project_structure);
        prompt.push_str("## Repository Directory Tree\n\n```\n");
        prompt.push_str(&self.directory_tree);
        prompt.push_str("\n```\n\n");
        if let Some(ref history) = self.attempt_history {
            prompt.push_str(history);
        }
        prompt.push_str("## Task\n");
        prompt.push_str(TASK);
        prompt
    }
}

/// Builds the reasoning collaborator's prompt from repository facts
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    max_depth: usize,
    max_chars: usize,
    max_tokens: usize,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_TREE_DEPTH, DEFAULT_TREE_CHARS)
    }
}

impl ContextBuilder {
    pub fn new(max_depth: usize, max_chars: usize) -> Self {
        Self {
            max_depth,
            max_chars,
            max_tokens: MAX_PROMPT_TOKENS,
        }
    }

    pub fn with_token_budget(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn build_context(&self, repo_root: &Path, markers: &[MarkerFile], history: &AttemptHistory) -> PromptContext {
        let mut ctx = PromptContext {
            project_structure: Self::render_markers(markers),
            directory_tree: self.directory_tree(repo_root),
            attempt_history: Self::render_history(history),
            estimated_tokens: 0,
        };
        ctx.estimated_tokens = Self::estimate_tokens(&ctx.render());

        if ctx.estimated_tokens > self.max_tokens {
            self.truncate_to_budget(&mut ctx);
        }

        ctx
    }

    pub fn build_prompt(&self, repo_root: &Path, markers: &[MarkerFile], history: &AttemptHistory) -> String {
        self.build_context(repo_root, markers, history).render()
    }

    pub fn render_markers(markers: &[MarkerFile]) -> String {
        let mut section = String::from("## Project Structure\n");
        section.push_str("Build system files detected:\n");
        if markers.is_empty() {
            section.push_str("- (none)\n");
        }
        for marker in markers {
            section.push_str(&format!("- {}\n", marker));
        }
        section.push('\n');
        section
    }

    /// `None` when nothing has been tried yet
    pub fn render_history(history: &AttemptHistory) -> Option<String> {
        if history.is_empty() {
            return None;
        }

        let mut section = String::from("## Previous attempts\n");
        section.push_str("The following commands have already been tried and failed:\n\n");
        for (i, attempt) in history.iter().enumerate() {
            section.push_str(&format!("### Attempt {}\n", i + 1));
            section.push_str(&format!("Command: `{}`\n", attempt.command));
            section.push_str(&format!("Error: {}\n\n", attempt.error()));
        }
        Some(section)
    }

    /// Directory tree of `root`, bounded by depth and size
    pub fn directory_tree(&self, root: &Path) -> String {
        let mut lines = Vec::new();
        if let Err(err) = render_tree(root, self.max_depth, 0, "", &mut lines) {
            debug!(root = %root.display(), error = %err, "Failed to generate directory tree");
            return TREE_UNAVAILABLE.to_string();
        }

        Self::cap_chars(lines.join("\n"), self.max_chars)
    }

    fn cap_chars(text: String, max_chars: usize) -> String {
        let total = text.chars().count();
        if total <= max_chars {
            return text;
        }
        format!(
            "{}\n... [truncated, {} chars omitted]",
            truncate_chars(&text, max_chars),
            total - max_chars
        )
    }

    /// Estimate tokens using 4 characters ≈ 1 token heuristic
    pub fn estimate_tokens(text: &str) -> usize {
        text.len().div_ceil(4)
    }

    /// Shrink the directory tree so the prompt fits the token budget
    fn truncate_to_budget(&self, ctx: &mut PromptContext) {
        warn!(
            estimated = ctx.estimated_tokens,
            budget = self.max_tokens,
            "Prompt exceeds token budget, truncating directory tree"
        );

        let tree_tokens = Self::estimate_tokens(&ctx.directory_tree);
        let other_tokens = ctx.estimated_tokens.saturating_sub(tree_tokens);
        let available_chars = self.max_tokens.saturating_sub(other_tokens) * 4;

        ctx.directory_tree = if available_chars == 0 {
            TREE_UNAVAILABLE.to_string()
        } else {
            Self::cap_chars(std::mem::take(&mut ctx.directory_tree), available_chars)
        };
        ctx.estimated_tokens = Self::estimate_tokens(&ctx.render());
    }
}

fn render_tree(dir: &Path, max_depth: usize, depth: usize, prefix: &str, lines: &mut Vec<String>) -> io::Result<()> {
    if depth >= max_depth {
        return Ok(());
    }

    let mut entries: Vec<_> = fs::read_dir(dir)?
        .filter_map(Result::ok)
        .filter(|entry| {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            !name.starts_with('.') && !SKIPPED_DIRS.contains(&name.as_ref())
        })
        .collect();
    entries.sort_by_key(|entry| entry.file_name());

    let count = entries.len();
    for (i, entry) in entries.iter().enumerate() {
        let is_last = i + 1 == count;
        let branch = if is_last { "└── " } else { "├── " };
        lines.push(format!("{}{}{}", prefix, branch, entry.file_name().to_string_lossy()));

        let path = entry.path();
        if path.is_dir() && depth + 1 < max_depth {
            let extension = if is_last { "    " } else { "│   " };
            // unreadable subdirectories are left out
            let _ = render_tree(&path, max_depth, depth + 1, &format!("{}{}", prefix, extension), lines);
        }
    }

    Ok(())
}
