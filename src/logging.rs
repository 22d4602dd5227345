// src/logging.rs

//! Logging setup for `dataflow-transfer` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the log level:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `DATAFLOW_TRANSFER_LOG` environment variable (e.g. "info", "debug")
//! 3. `[log] level` from the configuration file
//! 4. default to `info`
//!
//! When `[log] file` is configured, output goes to that file in append mode
//! (one file shared by every scheduled invocation); otherwise logs are sent
//! to STDERR so cron mails capture them.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::fmt;

use crate::cli::LogLevel;
use crate::config::LogSection;

/// Initialise the global logging subscriber.
///
/// Safe to call once at startup, after the configuration has been loaded
/// (the `[log]` section decides the writer).
pub fn init_logging(cli_level: Option<LogLevel>, log_config: &LogSection) -> Result<()> {
    let level = resolve_level(cli_level, log_config.level.as_deref());

    match &log_config.file {
        Some(path) => init_file_logging(level, path),
        None => {
            // Send logs to stderr; keep stdout free for --dry-run output.
            fmt()
                .with_max_level(level)
                .with_target(true)
                .with_thread_ids(false)
                .with_thread_names(false)
                .with_writer(std::io::stderr)
                .init();
            Ok(())
        }
    }
}

fn init_file_logging(level: tracing::Level, path: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))?;

    fmt()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();

    Ok(())
}

fn resolve_level(cli_level: Option<LogLevel>, config_level: Option<&str>) -> tracing::Level {
    if let Some(lvl) = cli_level {
        return level_from_log_level(lvl);
    }
    if let Some(lvl) = std::env::var("DATAFLOW_TRANSFER_LOG")
        .ok()
        .and_then(|s| parse_level_str(&s))
    {
        return lvl;
    }
    config_level
        .and_then(parse_level_str)
        .unwrap_or(tracing::Level::INFO)
}

fn level_from_log_level(lvl: LogLevel) -> tracing::Level {
    match lvl {
        LogLevel::Error => tracing::Level::ERROR,
        LogLevel::Warn => tracing::Level::WARN,
        LogLevel::Info => tracing::Level::INFO,
        LogLevel::Debug => tracing::Level::DEBUG,
        LogLevel::Trace => tracing::Level::TRACE,
    }
}

fn parse_level_str(s: &str) -> Option<tracing::Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(tracing::Level::ERROR),
        "warn" | "warning" => Some(tracing::Level::WARN),
        "info" => Some(tracing::Level::INFO),
        "debug" => Some(tracing::Level::DEBUG),
        "trace" => Some(tracing::Level::TRACE),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_flag_beats_config_level() {
        let level = resolve_level(Some(LogLevel::Debug), Some("error"));
        assert_eq!(level, tracing::Level::DEBUG);
    }

    #[test]
    fn unknown_level_strings_are_rejected() {
        assert_eq!(parse_level_str("verbose"), None);
        assert_eq!(parse_level_str("  DEBUG "), Some(tracing::Level::DEBUG));
    }
}
