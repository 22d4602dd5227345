// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Unknown run type: {0}")]
    UnknownRunType(String),

    #[error("Run id '{run_id}' does not match the {run_type} format {pattern}")]
    InvalidRunIdentifier {
        run_id: String,
        run_type: String,
        pattern: String,
    },

    #[error("Not a valid run directory: {0}")]
    InvalidRunDirectory(String),

    #[error("Failed to launch sync process: {0}")]
    Launch(String),

    #[error("Status ledger request failed: {0}")]
    LedgerHttp(#[from] reqwest::Error),

    #[error(
        "Final sync for run '{run_id}' exited with status {exit_code} and no transfer \
         is running; clear the exit-code sentinel to retry"
    )]
    FinalSyncFailed { run_id: String, exit_code: String },

    #[error("{failed} of {processed} runs failed to process")]
    BatchFailures { failed: usize, processed: usize },

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, TransferError>;
