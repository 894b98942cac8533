pub mod validator;

pub use validator::{CommandPolicy, CommandValidator, ValidationError};

/// Allowlist of executables permitted as the first token of a command segment
///
/// This list backs the default `CommandPolicy` and is shared by candidate
/// validation (Phase 1) and suggestion validation (Phase 2) so both phases
/// enforce the same boundary.
///
/// Adding a new executable requires careful security review.
pub const ALLOWED_COMMANDS: &[&str] = &[
    // .NET
    "dotnet",
    "msbuild",
    "nuget",
    "nunit-console",
    "nunit3-console",
    "xunit.console",
    "vstest.console",
    "mstest",
    "csharpier",
    // Java
    "mvn",
    "gradle",
    "ant",
    "junit",
    "testng",
    "./gradlew",
    "./mvnw",
    "gradlew",
    "mvnw",
    "google-java-format",
    "checkstyle",
    // Python
    "pip",
    "pip3",
    "python",
    "python3",
    "pytest",
    "nose2",
    "unittest",
    "coverage",
    "poetry",
    "pipenv",
    "uv",
    "tox",
    "virtualenv",
    "black",
    "autopep8",
    "yapf",
    "isort",
    "ruff",
    "flake8",
    "pylint",
    // Node.js / JavaScript / TypeScript
    "npm",
    "npx",
    "yarn",
    "node",
    "pnpm",
    "bun",
    "jest",
    "mocha",
    "jasmine",
    "karma",
    "ava",
    "vitest",
    "nyc",
    "prettier",
    "eslint",
    "standard",
    // PHP
    "composer",
    "php",
    "phpunit",
    "pest",
    "codeception",
    "php-cs-fixer",
    "phpcbf",
    // Multi-language formatters
    "clang-format",
    // Build tools
    "make",
    "cmake",
    "ninja",
    "bazel",
    "ctest",
    // Shell utilities
    "echo",
    "sh",
    "bash",
    "grep",
    "sed",
    "awk",
    "cat",
    "tee",
];

/// Operators allowed between command segments
pub const ALLOWED_OPERATORS: &[&str] = &["&&", "||", ";", "|"];

/// Patterns that disqualify a command outright
pub const BLOCKED_PATTERNS: &[&str] = &[
    r"\$\(",        // command substitution $(...)
    r"`",           // backtick substitution
    r"\$\{",        // variable expansion ${...}
    r"\beval\s",    // eval
    r"\bexec\s",    // exec
    r"\brm\s+-rf",  // recursive delete
    r"\bcurl.*\|",  // curl piped onward
    r"\bwget.*\|",  // wget piped onward
    r">\s*/dev/",   // writes to devices
    r";\s*rm\b",    // rm after a separator
    r"\|\s*sh\b",   // piping into sh
    r"\|\s*bash\b", // piping into bash
];

/// Shell interpreters that may only run a `.sh` script
pub const SHELL_INTERPRETERS: &[&str] = &["sh", "bash"];
