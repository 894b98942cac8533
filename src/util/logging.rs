//! Structured logging setup
//!
//! Logs go to stderr so stdout carries only the detected command. Output is
//! pretty by default or JSON when `[logging] json = true`; `RUST_LOG`
//! overrides the configured level.

use std::env;
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;

/// Ensures logging is only initialized once
static INIT: Once = Once::new();

/// Parses a log level from a string, `None` when unrecognised
pub fn parse_level(level_str: &str) -> Option<Level> {
    match level_str.trim().to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

fn build_filter(level: Level) -> EnvFilter {
    if env::var("RUST_LOG").is_ok() {
        return EnvFilter::from_default_env();
    }

    // Quiet the HTTP stack unless asked otherwise
    EnvFilter::new(format!("{},h2=warn,hyper=warn,reqwest=warn", level))
}

/// Initializes the logging system; later calls are ignored
pub fn init_logging(config: &LoggingConfig) {
    INIT.call_once(|| {
        let level = parse_level(&config.level).unwrap_or(Level::INFO);
        let filter = build_filter(level);

        let result = if config.json {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(std::io::stderr)
                        .with_target(config.with_target)
                        .with_file(config.with_location)
                        .with_line_number(config.with_location),
                )
                .try_init()
        } else {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(config.with_target)
                        .with_file(config.with_location)
                        .with_line_number(config.with_location),
                )
                .try_init()
        };

        if let Err(err) = result {
            eprintln!("Logging already initialised elsewhere: {}", err);
        }
    });
}

/// Initializes logging with default configuration
pub fn init_default() {
    init_logging(&LoggingConfig::default());
}
