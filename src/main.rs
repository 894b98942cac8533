use buildscout::config::Config;
use buildscout::detection::DetectionOrchestrator;
use buildscout::error::AppResult;
use buildscout::util::logging;
use clap::Parser;
use std::path::PathBuf;
use std::process;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "buildscout", version, about = "Detect a working build/test command for a repository")]
struct CliArgs {
    /// Repository root to inspect
    #[arg(default_value = ".")]
    repo_root: PathBuf,

    /// Sub-project directory for monorepos, relative to the repository root
    #[arg(long)]
    project_dir: Option<PathBuf>,

    /// Maximum LLM refinement attempts (overrides the config file).
    /// The Anthropic client allows ten requests a minute; later attempts wait for a free slot.
    #[arg(long)]
    max_llm_attempts: Option<usize>,

    /// Session identifier used in logs and the audit trail
    #[arg(long)]
    session_id: Option<String>,

    /// Config file (defaults to ~/.config/buildscout/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Detect a formatter command instead of a build command
    #[arg(long)]
    format: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Write a default config file to the config path and exit
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();

    match run(args).await {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(2);
        }
    }
}

async fn run(args: CliArgs) -> AppResult<i32> {
    if args.init_config {
        let path = match &args.config {
            Some(path) => path.clone(),
            None => Config::config_path()?,
        };
        Config::default_config().save_to(&path)?;
        eprintln!("Wrote default config to {}", path.display());
        return Ok(0);
    }

    let mut config = Config::load_or_default(args.config.as_deref())?;
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    logging::init_logging(&config.logging);
    debug!(?args, "Parsed arguments");

    // a missing root still goes through detection and ends in the fallback
    let repo_root = std::fs::canonicalize(&args.repo_root).unwrap_or_else(|_| args.repo_root.clone());
    let session_id = args
        .session_id
        .clone()
        .unwrap_or_else(|| format!("session-{}", chrono::Utc::now().format("%Y%m%dT%H%M%S")));
    let max_llm_attempts = args.max_llm_attempts.unwrap_or(config.detection.max_llm_attempts);

    let orchestrator = DetectionOrchestrator::from_config(&config);

    if args.format {
        return Ok(
            match orchestrator
                .detect_format(&repo_root, args.project_dir.as_deref(), &session_id)
                .await
            {
                Some(command) => {
                    println!("{}", command);
                    0
                }
                None => {
                    info!(session_id = %session_id, "No format command detected");
                    1
                }
            },
        );
    }

    let report = orchestrator
        .detect_with_report(&repo_root, args.project_dir.as_deref(), max_llm_attempts, &session_id)
        .await;
    info!(
        session_id = %session_id,
        phase = %report.phase,
        failed_attempts = report.history.len(),
        llm_attempts = report.llm_attempts,
        "Detection finished"
    );

    println!("{}", report.command);
    Ok(0)
}
