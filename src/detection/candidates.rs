use regex::Regex;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use super::ecosystem::{Ecosystem, classify};

/// Make targets tried before any other target, in this order
pub const PRIORITY_MAKE_TARGETS: &[&str] = &["test", "check", "build", "all", "default"];

// A target declaration is a name at column zero followed by `:` but not `:=`
static MAKE_TARGET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9_][A-Za-z0-9_.\-]*)\s*:(?:[^=]|$)").expect("make target regex is valid")
});

/// Generates ordered build and format command candidates for a repository
#[derive(Debug, Clone)]
pub struct CandidateGenerator {
    repo_root: PathBuf,
    search_dir: PathBuf,
    /// Unquoted project directory relative to the root, `None` at the root itself
    rel_path: Option<String>,
}

impl CandidateGenerator {
    /// Create a generator for `repo_root`, optionally scoped to a sub-project
    ///
    /// A relative `project_dir` is resolved against `repo_root`.
    pub fn new(repo_root: &Path, project_dir: Option<&Path>) -> Self {
        let search_dir = match project_dir {
            Some(dir) if dir.is_absolute() => dir.to_path_buf(),
            Some(dir) => repo_root.join(dir),
            None => repo_root.to_path_buf(),
        };

        let rel_path = if search_dir == repo_root {
            None
        } else {
            let rel = search_dir.strip_prefix(repo_root).unwrap_or(search_dir.as_path());
            let rel = rel.to_string_lossy().replace('\\', "/");
            let rel = rel.trim_end_matches('/');
            (!rel.is_empty()).then(|| rel.to_string())
        };

        Self {
            repo_root: repo_root.to_path_buf(),
            search_dir,
            rel_path,
        }
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    /// Directory whose marker files drive generation
    pub fn search_dir(&self) -> &Path {
        &self.search_dir
    }

    pub fn ecosystems(&self) -> io::Result<Vec<Ecosystem>> {
        classify(&self.search_dir)
    }

    fn gradle_command(&self) -> &'static str {
        if self.repo_root.join("gradlew").exists() {
            "./gradlew"
        } else {
            "gradle"
        }
    }

    /// Build/test candidates in priority order
    ///
    /// Monorepo sub-projects are addressed with each tool's own directory
    /// flag so every candidate can run from the repository root.
    pub fn build_candidates(&self) -> io::Result<Vec<String>> {
        let mut candidates = Vec::new();
        let rel_path = self.rel_path.as_deref().map(|rel| shell_words::quote(rel).into_owned());

        for ecosystem in self.ecosystems()? {
            match ecosystem {
                Ecosystem::Maven => {
                    let goals = ["test", "verify", "clean install"];
                    match &self.rel_path {
                        Some(rel) => {
                            let pom = shell_words::quote(&format!("{}/pom.xml", rel)).into_owned();
                            candidates.extend(goals.iter().map(|goal| format!("mvn -f {} {}", pom, goal)));
                        }
                        None => candidates.extend(goals.iter().map(|goal| format!("mvn {}", goal))),
                    }
                }
                Ecosystem::Gradle => {
                    let gradle = self.gradle_command();
                    let tasks = ["test", "build", "check"];
                    match &rel_path {
                        Some(rel) => {
                            candidates.extend(tasks.iter().map(|task| format!("{} -p {} {}", gradle, rel, task)))
                        }
                        None => candidates.extend(tasks.iter().map(|task| format!("{} {}", gradle, task))),
                    }
                }
                Ecosystem::Python => {
                    candidates.extend(
                        ["pytest", "python -m pytest", "python setup.py test"]
                            .iter()
                            .map(|c| c.to_string()),
                    );
                }
                Ecosystem::Node => {
                    let scripts = ["test", "run build", "run test"];
                    match &rel_path {
                        Some(rel) => {
                            candidates.extend(scripts.iter().map(|script| format!("npm --prefix {} {}", rel, script)))
                        }
                        None => candidates.extend(scripts.iter().map(|script| format!("npm {}", script))),
                    }
                }
                Ecosystem::Php => {
                    candidates.extend(
                        ["composer test", "phpunit", "./vendor/bin/phpunit"]
                            .iter()
                            .map(|c| c.to_string()),
                    );
                }
                Ecosystem::DotNet => {
                    candidates.extend(["dotnet test", "dotnet build"].iter().map(|c| c.to_string()));
                }
                Ecosystem::Make => {
                    let targets = inspect_makefile_targets(&self.search_dir.join("Makefile"));
                    candidates.extend(targets.iter().map(|target| format!("make {}", target)));
                }
                Ecosystem::Unknown => {}
            }
        }

        Ok(candidates)
    }

    /// Formatter candidates, for repositories that want a formatting pass
    pub fn format_candidates(&self) -> io::Result<Vec<String>> {
        let ecosystems = self.ecosystems()?;
        let has = |eco: Ecosystem| ecosystems.contains(&eco);
        let mut candidates: Vec<String> = Vec::new();

        // setup.py or pyproject.toml only; a lone pytest.ini says nothing about formatting
        if self.search_dir.join("pyproject.toml").exists() || self.search_dir.join("setup.py").exists() {
            candidates.extend(
                ["black .", "ruff format .", "autopep8 --in-place --recursive ."]
                    .iter()
                    .map(|c| c.to_string()),
            );
        }
        if has(Ecosystem::Node) {
            candidates.extend(
                ["prettier --write .", "npm run format", "yarn format"]
                    .iter()
                    .map(|c| c.to_string()),
            );
        }
        if has(Ecosystem::Maven) {
            candidates.extend(
                ["mvn spotless:apply", "mvn com.coveo:fmt-maven-plugin:format"]
                    .iter()
                    .map(|c| c.to_string()),
            );
        }
        if has(Ecosystem::Gradle) {
            candidates.push(format!("{} spotlessApply", self.gradle_command()));
        }
        if has(Ecosystem::DotNet) {
            candidates.extend(["dotnet format", "csharpier ."].iter().map(|c| c.to_string()));
        }
        if has(Ecosystem::Php) {
            candidates.extend(
                ["php-cs-fixer fix", "./vendor/bin/php-cs-fixer fix"]
                    .iter()
                    .map(|c| c.to_string()),
            );
        }

        Ok(candidates)
    }
}

/// Generate build candidates for `repo_root` and an optional sub-project
pub fn generate_build_candidates(repo_root: &Path, project_dir: Option<&Path>) -> io::Result<Vec<String>> {
    CandidateGenerator::new(repo_root, project_dir).build_candidates()
}

/// Read a Makefile and return its targets, priority targets first
///
/// An unreadable or missing Makefile yields no targets.
pub fn inspect_makefile_targets(path: &Path) -> Vec<String> {
    match fs::read_to_string(path) {
        Ok(contents) => parse_makefile_targets(&contents),
        Err(err) => {
            tracing::debug!(path = %path.display(), error = %err, "Could not read Makefile");
            Vec::new()
        }
    }
}

/// Extract target names from Makefile text
pub fn parse_makefile_targets(contents: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();

    for line in contents.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        if let Some(caps) = MAKE_TARGET.captures(line) {
            let target = caps[1].to_string();
            if !found.contains(&target) {
                found.push(target);
            }
        }
    }

    let mut ordered: Vec<String> = PRIORITY_MAKE_TARGETS
        .iter()
        .filter(|priority| found.iter().any(|t| t == *priority))
        .map(|priority| priority.to_string())
        .collect();
    ordered.extend(
        found
            .into_iter()
            .filter(|target| !PRIORITY_MAKE_TARGETS.contains(&target.as_str())),
    );

    ordered
}
