// src/transfer/mod.rs

//! Building and launching the detached rsync processes that move run data.
//!
//! Responsibilities:
//! - Assemble command lines, including the exit-code sentinel suffix
//!   (`command.rs`).
//! - Spawn them detached and probe for already-running instances
//!   (`launcher.rs`).

pub mod command;
pub mod launcher;

pub use command::{SyncCommand, bulk_command, metadata_command};
pub use launcher::{Launcher, RsyncLauncher, in_flight_pattern};

use tracing::info;

use crate::errors::Result;

/// Launch `command` unless a matching sync is already running.
///
/// Returns whether a process was actually started; callers only record a
/// launch event when it was.
pub fn start_sync(launcher: &dyn Launcher, command: &SyncCommand) -> Result<bool> {
    if launcher.is_in_flight(&command.source, &command.destination) {
        info!(
            source = %command.source,
            destination = %command.destination,
            "sync already in flight; not starting another"
        );
        return Ok(false);
    }
    launcher.launch(command)?;
    Ok(true)
}
