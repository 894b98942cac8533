use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

/// Build ecosystems recognised from marker files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ecosystem {
    Maven,
    Gradle,
    Python,
    Node,
    Php,
    DotNet,
    Make,
    Unknown,
}

impl Ecosystem {
    /// Order in which ecosystems are scanned and their candidates emitted
    pub const SCAN_ORDER: [Ecosystem; 7] = [
        Ecosystem::Maven,
        Ecosystem::Gradle,
        Ecosystem::Python,
        Ecosystem::Node,
        Ecosystem::Php,
        Ecosystem::DotNet,
        Ecosystem::Make,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Ecosystem::Maven => "Maven",
            Ecosystem::Gradle => "Gradle",
            Ecosystem::Python => "Python",
            Ecosystem::Node => "Node",
            Ecosystem::Php => "PHP",
            Ecosystem::DotNet => ".NET",
            Ecosystem::Make => "Make",
            Ecosystem::Unknown => "Unknown",
        }
    }

    /// Exact file names that mark this ecosystem
    fn marker_names(&self) -> &'static [&'static str] {
        match self {
            Ecosystem::Maven => &["pom.xml"],
            Ecosystem::Gradle => &["build.gradle", "build.gradle.kts"],
            Ecosystem::Python => &["pytest.ini", "setup.py", "pyproject.toml"],
            Ecosystem::Node => &["package.json"],
            Ecosystem::Php => &["composer.json"],
            Ecosystem::DotNet => &[],
            Ecosystem::Make => &["Makefile"],
            Ecosystem::Unknown => &[],
        }
    }

    /// File extensions that mark this ecosystem
    fn marker_extensions(&self) -> &'static [&'static str] {
        match self {
            Ecosystem::DotNet => &["sln", "csproj"],
            _ => &[],
        }
    }

    pub fn is_marker(&self, file_name: &str) -> bool {
        if self.marker_names().contains(&file_name) {
            return true;
        }

        Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.marker_extensions().contains(&ext))
    }
}

impl fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Node package manager inferred from lock files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodePackageManager {
    Npm,
    Yarn,
    Pnpm,
    Bun,
}

impl NodePackageManager {
    /// Lock files win; a bare package.json means npm
    pub fn detect(dir: &Path) -> Option<Self> {
        if dir.join("package-lock.json").exists() {
            Some(Self::Npm)
        } else if dir.join("yarn.lock").exists() {
            Some(Self::Yarn)
        } else if dir.join("pnpm-lock.yaml").exists() {
            Some(Self::Pnpm)
        } else if dir.join("bun.lockb").exists() {
            Some(Self::Bun)
        } else if dir.join("package.json").exists() {
            Some(Self::Npm)
        } else {
            None
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Npm => "npm",
            Self::Yarn => "yarn",
            Self::Pnpm => "pnpm",
            Self::Bun => "bun",
        }
    }
}

/// A marker file found in the target directory
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerFile {
    /// Path relative to the repository root, `/`-separated
    pub path: String,
    pub ecosystem: Ecosystem,
    pub detail: Option<&'static str>,
}

impl fmt::Display for MarkerFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.detail {
            Some(detail) => write!(f, "{} ({}, {})", self.path, self.ecosystem, detail),
            None => write!(f, "{} ({})", self.path, self.ecosystem),
        }
    }
}

/// Sorted names of the regular files directly inside `dir`
pub fn list_file_names(dir: &Path) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

/// Classify a directory into every ecosystem whose markers it contains
///
/// Returns `[Unknown]` when no marker matched.
pub fn classify(dir: &Path) -> io::Result<Vec<Ecosystem>> {
    let names = list_file_names(dir)?;

    let found: Vec<Ecosystem> = Ecosystem::SCAN_ORDER
        .iter()
        .copied()
        .filter(|eco| names.iter().any(|name| eco.is_marker(name)))
        .collect();

    if found.is_empty() {
        Ok(vec![Ecosystem::Unknown])
    } else {
        Ok(found)
    }
}

/// List the marker files in `search_dir`, in scan order
pub fn discover_marker_files(repo_root: &Path, search_dir: &Path) -> io::Result<Vec<MarkerFile>> {
    let names = list_file_names(search_dir)?;
    let prefix = search_dir
        .strip_prefix(repo_root)
        .ok()
        .filter(|rel| !rel.as_os_str().is_empty())
        .map(|rel| format!("{}/", rel.to_string_lossy().replace('\\', "/")))
        .unwrap_or_default();

    let mut markers = Vec::new();
    for ecosystem in Ecosystem::SCAN_ORDER {
        for name in names.iter().filter(|name| ecosystem.is_marker(name)) {
            let detail = match ecosystem {
                Ecosystem::Node => NodePackageManager::detect(search_dir).map(|pm| pm.name()),
                Ecosystem::Gradle if repo_root.join("gradlew").exists() => Some("wrapper"),
                _ => None,
            };
            markers.push(MarkerFile {
                path: format!("{}{}", prefix, name),
                ecosystem,
                detail,
            });
        }
    }

    Ok(markers)
}
