// src/transfer/launcher.rs

//! Launching sync processes and checking for ones already running.

use std::process::{Command, Stdio};

use tracing::{info, warn};

use crate::errors::{Result, TransferError};
use crate::transfer::command::SyncCommand;

/// Trait abstracting how sync commands are started and observed.
///
/// Production code uses [`RsyncLauncher`]; scenario tests provide their own
/// implementation that records launches and fakes the process table.
pub trait Launcher {
    /// Best-effort check for an rsync already copying `source` to
    /// `destination`. False negatives are tolerated; `run-one` inside the
    /// command line is the stricter second layer.
    fn is_in_flight(&self, source: &str, destination: &str) -> bool;

    /// Start the command detached. Returns as soon as the process exists;
    /// completion is only ever observed through the exit-code sentinel.
    fn launch(&self, command: &SyncCommand) -> Result<()>;
}

/// Pattern for matching a running rsync by its command line.
///
/// Anchoring the destination at the end keeps the bulk transfer and the
/// metadata sync of the same run from shadowing one another: the metadata
/// destination carries the run id suffix and the bulk one does not. Both
/// paths are escaped so dots in hostnames and the odd metacharacter in a
/// path stay literal in the ERE handed to pgrep.
pub fn in_flight_pattern(source: &str, destination: &str) -> String {
    format!(
        "rsync.*{}.*{}$",
        regex::escape(source),
        regex::escape(destination)
    )
}

/// Real launcher used in production.
#[derive(Debug, Clone, Default)]
pub struct RsyncLauncher;

impl Launcher for RsyncLauncher {
    fn is_in_flight(&self, source: &str, destination: &str) -> bool {
        let pattern = in_flight_pattern(source, destination);
        let status = Command::new("pgrep")
            .arg("-f")
            .arg(&pattern)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match status {
            Ok(status) => status.success(),
            Err(err) => {
                warn!(error = %err, "pgrep failed; assuming no sync in flight");
                false
            }
        }
    }

    fn launch(&self, command: &SyncCommand) -> Result<()> {
        info!(cmd = %command.cmdline, "launching detached sync process");
        let child = Command::new("sh")
            .arg("-c")
            .arg(&command.cmdline)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|err| {
                TransferError::Launch(format!("`{}`: {}", command.cmdline, err))
            })?;
        // No wait: the shell outlives this invocation and writes the
        // sentinel when rsync exits.
        drop(child);
        Ok(())
    }
}
