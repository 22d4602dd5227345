// src/cli.rs

//! CLI argument parsing using `clap`.
//!
//! NOTE: this expects `clap` to be built with the `derive` feature, e.g.:
//! `clap = { version = "4.5.53", features = ["derive"] }` in `Cargo.toml`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `dataflow-transfer`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "dataflow-transfer",
    version,
    about = "Move finished sequencing runs to the compute cluster.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `dataflow-transfer.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "dataflow-transfer.toml")]
    pub config: String,

    /// Process a single run directory instead of scanning all data dirs.
    ///
    /// Requires `--run-type` so the right naming rules and destination
    /// are applied.
    #[arg(long, value_name = "PATH", requires = "run_type")]
    pub run: Option<String>,

    /// Instrument family of the run given with `--run` (e.g. NovaSeqXPlus).
    #[arg(long, value_name = "FAMILY", requires = "run")]
    pub run_type: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `DATAFLOW_TRANSFER_LOG`, the config `[log]` section or a
    /// default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Report what would be done for each run, but launch nothing and write
    /// no status events.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
