// src/runs/mod.rs

//! Run construction and per-run filesystem probes.
//!
//! A [`Run`] binds a concrete run directory to its family policy and the
//! config sections that apply to it. It is rebuilt fresh on every
//! invocation; nothing about a run is cached between invocations, the
//! directory and the status ledger are the only state.

pub mod policy;

pub use policy::{FlowCellRule, Registry, RunPolicy, RunType};

use std::path::PathBuf;

use crate::config::{SequencerSection, TransferSection};
use crate::errors::{Result, TransferError};
use crate::fs::{self, SentinelState};

/// Exit-code sentinel written by the final bulk transfer.
pub const FINAL_SYNC_SENTINEL: &str = ".final_sync_exitcode";
/// Exit-code sentinel written by the metadata sync.
pub const METADATA_SYNC_SENTINEL: &str = ".metadata_sync_exitcode";
/// rsync log for bulk transfers; non-final and final runs share it.
pub const TRANSFER_LOG: &str = "transfer.rsync.log";
/// rsync log for metadata syncs.
pub const METADATA_LOG: &str = "metadata.rsync.log";

/// A run directory bound to its family policy and transfer settings.
#[derive(Debug, Clone)]
pub struct Run {
    pub run_id: String,
    pub run_dir: PathBuf,
    pub flow_cell_id: String,
    policy: RunPolicy,
    user: String,
    host: String,
    /// Destination path on the receiving cluster, without user/host.
    destination: String,
    pub metadata_manifest: Vec<String>,
    /// Global `[transfer].options` followed by the family's own options.
    pub rsync_options: Vec<String>,
}

impl Run {
    pub fn new(
        run_dir: impl Into<PathBuf>,
        policy: &RunPolicy,
        section: &SequencerSection,
        transfer: &TransferSection,
    ) -> Result<Self> {
        let run_dir = run_dir.into();
        let run_id = run_dir
            .file_name()
            .and_then(|n| n.to_str())
            .map(|s| s.to_string())
            .ok_or_else(|| TransferError::InvalidRunDirectory(run_dir.display().to_string()))?;

        let flow_cell_id = policy.flow_cell_rule.apply(&run_id);

        let mut rsync_options = transfer.options.clone();
        rsync_options.extend(section.rsync_options.iter().cloned());

        Ok(Self {
            run_id,
            run_dir,
            flow_cell_id,
            policy: policy.clone(),
            user: transfer.user.clone(),
            host: transfer.host.clone(),
            destination: section.destination.trim_end_matches('/').to_string(),
            metadata_manifest: section.metadata.clone(),
            rsync_options,
        })
    }

    pub fn run_type(&self) -> RunType {
        self.policy.run_type
    }

    /// Check that the directory name matches the family's run-id format.
    ///
    /// Must pass before any sentinel or ledger access; a mismatch is a hard
    /// per-run failure.
    pub fn confirm_run_type(&self) -> Result<()> {
        if self.policy.run_id_format.is_match(&self.run_id) {
            return Ok(());
        }
        Err(TransferError::InvalidRunIdentifier {
            run_id: self.run_id.clone(),
            run_type: self.policy.run_type.to_string(),
            pattern: self.policy.run_id_format.as_str().to_string(),
        })
    }

    /// True while the instrument has not yet written its completion marker.
    pub fn sequencing_ongoing(&self) -> bool {
        !self.run_dir.join(self.policy.completion_marker).exists()
    }

    /// True once a metadata sync has finished with exit status 0.
    pub fn metadata_synced(&self) -> bool {
        fs::exit_sentinel_ok(&self.metadata_sync_sentinel())
    }

    /// Tri-state view of the final transfer's exit-code sentinel.
    pub fn final_sync_state(&self) -> SentinelState {
        fs::read_exit_sentinel(&self.final_sync_sentinel())
    }

    /// True once a final transfer has finished with exit status 0.
    pub fn final_sync_successful(&self) -> bool {
        fs::exit_sentinel_ok(&self.final_sync_sentinel())
    }

    pub fn final_sync_sentinel(&self) -> PathBuf {
        self.run_dir.join(FINAL_SYNC_SENTINEL)
    }

    pub fn metadata_sync_sentinel(&self) -> PathBuf {
        self.run_dir.join(METADATA_SYNC_SENTINEL)
    }

    pub fn transfer_log(&self) -> PathBuf {
        self.run_dir.join(TRANSFER_LOG)
    }

    pub fn metadata_log(&self) -> PathBuf {
        self.run_dir.join(METADATA_LOG)
    }

    /// Bulk transfer destination, `user@host:destination`.
    ///
    /// The run directory itself is the rsync source, so the run id ends up
    /// as a subdirectory of this path on the remote side.
    pub fn remote_target(&self) -> String {
        format!("{}@{}:{}", self.user, self.host, self.destination)
    }

    /// Metadata destination, `user@host:destination/<run_id>`.
    ///
    /// Distinct from [`Run::remote_target`] so the in-flight guard can tell
    /// the two operations apart by their end-anchored destination.
    pub fn remote_metadata_target(&self) -> String {
        format!("{}/{}", self.remote_target(), self.run_id)
    }

    /// Metadata files from the manifest that actually exist in the run dir.
    pub fn locate_metadata(&self) -> Vec<PathBuf> {
        fs::locate_metadata(&self.run_dir, &self.metadata_manifest)
    }
}
