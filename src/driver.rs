// src/driver.rs

//! The run lifecycle state machine.
//!
//! The core is a pure decision function: [`RunObservation`] (a snapshot of
//! completion marker, sentinel files and one guarded ledger read) goes in,
//! a [`Plan`] comes out. [`process_run`] is the IO shell around it that
//! gathers the observation, appends ledger events and launches syncs.
//!
//! A run's state is never stored; it is reduced from the observation on
//! every invocation, so re-running at any time is safe. The first matching
//! rule wins:
//!
//! 1. transferred recorded + final sentinel ok + metadata synced → done.
//! 2. sequencing ongoing → record `sequencing_started`, mirror in background.
//! 3. metadata not synced → launch the metadata sync; fall through.
//! 4. final sentinel missing → record `sequencing_finished`, launch the
//!    final transfer.
//! 5. final sentinel ok → record `transferred_to_hpc`.
//! 6. final sentinel failed with nothing in flight → fatal for this run.

use serde_json::json;
use tracing::{debug, info};

use crate::errors::{Result, TransferError};
use crate::fs::{self, SentinelState};
use crate::runs::Run;
use crate::statusdb::{EventKind, LedgerStore, StatusLedger};
use crate::transfer::{self, Launcher, bulk_command, metadata_command};

/// Everything the decision needs to know about one run, gathered once per
/// invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunObservation {
    pub sequencing_ongoing: bool,
    pub metadata_synced: bool,
    pub final_sync: SentinelState,
    /// Ledger says `transferred_to_hpc` was recorded. Only consulted when
    /// both sentinels already confirm success; degrades to `false` when the
    /// ledger is unreachable.
    pub transferred_recorded: bool,
}

impl RunObservation {
    pub fn observe<S: LedgerStore>(run: &Run, ledger: &StatusLedger<S>) -> Self {
        let sequencing_ongoing = run.sequencing_ongoing();
        let metadata_synced = run.metadata_synced();
        let final_sync = run.final_sync_state();
        let transferred_recorded = final_sync == SentinelState::Success
            && metadata_synced
            && ledger.has_event(&run.run_id, EventKind::TransferredToHpc);
        Self {
            sequencing_ongoing,
            metadata_synced,
            final_sync,
            transferred_recorded,
        }
    }
}

/// The single lifecycle step chosen for this invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleStep {
    /// Terminal; nothing left to do for this run.
    Done,
    /// Instrument still writing: record the start, mirror in background.
    Sequencing,
    /// Record `sequencing_finished` and launch the final transfer.
    FinalTransfer,
    /// Final sentinel confirms success: record `transferred_to_hpc`.
    MarkTransferred,
    /// Final sentinel holds a non-zero exit code.
    FinalFailed { exit_code: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub step: LifecycleStep,
    /// Launch a metadata sync before the step. Never set while sequencing
    /// is ongoing or once the run is done.
    pub sync_metadata: bool,
}

/// Map an observation to a plan. Pure; identical observations always yield
/// the identical plan.
pub fn decide(observation: &RunObservation) -> Plan {
    if observation.transferred_recorded
        && observation.final_sync == SentinelState::Success
        && observation.metadata_synced
    {
        return Plan {
            step: LifecycleStep::Done,
            sync_metadata: false,
        };
    }

    if observation.sequencing_ongoing {
        return Plan {
            step: LifecycleStep::Sequencing,
            sync_metadata: false,
        };
    }

    let sync_metadata = !observation.metadata_synced;
    let step = match &observation.final_sync {
        SentinelState::Missing => LifecycleStep::FinalTransfer,
        SentinelState::Success => LifecycleStep::MarkTransferred,
        SentinelState::Failed(code) => LifecycleStep::FinalFailed {
            exit_code: code.clone(),
        },
    };
    Plan {
        step,
        sync_metadata,
    }
}

/// Drive one run one step forward.
///
/// Validates the run id first; a mismatch aborts before any sentinel or
/// ledger access. Launches go through the in-flight guard, and the
/// launch-audit events (`transfer_started`, `final_transfer_started`,
/// `metadata_sync_started`) are only recorded when a process was actually
/// started.
pub fn process_run<S: LedgerStore>(
    run: &Run,
    ledger: &StatusLedger<S>,
    launcher: &dyn Launcher,
) -> Result<()> {
    run.confirm_run_type()?;

    let observation = RunObservation::observe(run, ledger);
    let plan = decide(&observation);
    debug!(run_id = %run.run_id, ?plan, "decided next step");

    match &plan.step {
        LifecycleStep::Done => {
            debug!(run_id = %run.run_id, "run fully transferred; nothing to do");
            return Ok(());
        }
        LifecycleStep::Sequencing => {
            let files = fs::parse_metadata_files(&run.locate_metadata());
            ledger.append_event(
                &run.run_id,
                &run.flow_cell_id,
                EventKind::SequencingStarted,
                json!({}),
                &files,
            )?;
            let command = bulk_command(run, false);
            if transfer::start_sync(launcher, &command)? {
                info!(run_id = %run.run_id, "started background transfer of ongoing run");
                ledger.append_event(
                    &run.run_id,
                    &run.flow_cell_id,
                    EventKind::TransferStarted,
                    json!({ "destination": command.destination }),
                    &files,
                )?;
            }
            return Ok(());
        }
        _ => {}
    }

    // Sequencing is finished from here on; the full metadata set exists.
    let files = fs::parse_metadata_files(&run.locate_metadata());

    if plan.sync_metadata {
        let command = metadata_command(run);
        if transfer::start_sync(launcher, &command)? {
            info!(run_id = %run.run_id, "started metadata sync");
            ledger.append_event(
                &run.run_id,
                &run.flow_cell_id,
                EventKind::MetadataSyncStarted,
                json!({ "destination": command.destination }),
                &files,
            )?;
        }
    }

    match plan.step {
        LifecycleStep::FinalTransfer => {
            ledger.append_event(
                &run.run_id,
                &run.flow_cell_id,
                EventKind::SequencingFinished,
                json!({}),
                &files,
            )?;
            let command = bulk_command(run, true);
            if transfer::start_sync(launcher, &command)? {
                info!(run_id = %run.run_id, "started final transfer");
                ledger.append_event(
                    &run.run_id,
                    &run.flow_cell_id,
                    EventKind::FinalTransferStarted,
                    json!({ "destination": command.destination }),
                    &files,
                )?;
            }
            Ok(())
        }
        LifecycleStep::MarkTransferred => {
            info!(run_id = %run.run_id, "final sync reported success");
            ledger.append_event(
                &run.run_id,
                &run.flow_cell_id,
                EventKind::TransferredToHpc,
                json!({}),
                &files,
            )?;
            Ok(())
        }
        LifecycleStep::FinalFailed { exit_code } => {
            let command = bulk_command(run, true);
            if launcher.is_in_flight(&command.source, &command.destination) {
                info!(
                    run_id = %run.run_id,
                    exit_code = %exit_code,
                    "previous final sync failed but a transfer is running; waiting for its sentinel"
                );
                Ok(())
            } else {
                // Raised rather than retried: an operator must clear the
                // sentinel to get a fresh attempt.
                Err(TransferError::FinalSyncFailed {
                    run_id: run.run_id.clone(),
                    exit_code,
                })
            }
        }
        // Handled by the early returns above.
        LifecycleStep::Done | LifecycleStep::Sequencing => Ok(()),
    }
}
