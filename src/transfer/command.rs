// src/transfer/command.rs

//! Assembly of the rsync command lines this tool launches.
//!
//! Every command is wrapped in `run-one`, so an identical command line
//! refuses to start while a previous instance is still running. Commands
//! that must leave a completion record append `; echo $? > <sentinel>`;
//! that sentinel write is the only completion signal later invocations
//! can observe.

use crate::runs::Run;

/// A fully assembled sync invocation.
///
/// `source` and `destination` are kept separately from the command line so
/// the in-flight guard can match on them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncCommand {
    /// Full command line handed to `sh -c`.
    pub cmdline: String,
    /// Local rsync source argument.
    pub source: String,
    /// Remote rsync destination argument.
    pub destination: String,
}

/// Build the bulk transfer command for a run.
///
/// The source is the run directory itself (no trailing slash), so the run
/// id becomes a subdirectory of the family destination on the remote side.
/// Only the final transfer writes the exit-code sentinel; background syncs
/// of an unfinished run leave no record and are simply repeated.
pub fn bulk_command(run: &Run, final_sync: bool) -> SyncCommand {
    let source = run.run_dir.display().to_string();
    let destination = run.remote_target();

    let mut cmdline = format!(
        "run-one rsync -av --log-file={}",
        run.transfer_log().display()
    );
    for option in &run.rsync_options {
        cmdline.push(' ');
        cmdline.push_str(option);
    }
    cmdline.push_str(&format!(" {} {}", source, destination));
    if final_sync {
        cmdline.push_str(&format!(
            " ; echo $? > {}",
            run.final_sync_sentinel().display()
        ));
    }

    SyncCommand {
        cmdline,
        source,
        destination,
    }
}

/// Build the metadata sync command for a run.
///
/// Copies only the manifest files, via include filters over the run
/// directory contents, into `<destination>/<run_id>` so the metadata is
/// browsable remotely before the bulk data lands. Always sentinel-bearing.
pub fn metadata_command(run: &Run) -> SyncCommand {
    let source = format!("{}/", run.run_dir.display());
    let destination = run.remote_metadata_target();

    let mut cmdline = format!(
        "run-one rsync -av --log-file={}",
        run.metadata_log().display()
    );
    for option in &run.rsync_options {
        cmdline.push(' ');
        cmdline.push_str(option);
    }
    for name in &run.metadata_manifest {
        cmdline.push_str(&format!(" --include='{}'", name));
    }
    cmdline.push_str(&format!(" --exclude='*' {} {}", source, destination));
    cmdline.push_str(&format!(
        " ; echo $? > {}",
        run.metadata_sync_sentinel().display()
    ));

    SyncCommand {
        cmdline,
        source,
        destination,
    }
}
