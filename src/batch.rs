// src/batch.rs

//! Scanning the configured data directories and driving every run found.
//!
//! One failing run never stops the scan: its error is logged with the run
//! identifier and counted, and the batch moves on. Single-run mode skips
//! enumeration and surfaces errors directly.

use std::path::{Path, PathBuf};

use tracing::{error, info};

use crate::config::{Config, SequencerSection};
use crate::driver;
use crate::errors::{Result, TransferError};
use crate::fs;
use crate::runs::{Registry, Run, RunPolicy};
use crate::statusdb::{LedgerStore, StatusLedger};
use crate::transfer::Launcher;

/// Outcome of one batch invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub processed: usize,
    pub failed: usize,
}

impl BatchSummary {
    /// The process exit outcome: any failed run fails the invocation.
    pub fn into_result(self) -> Result<()> {
        if self.failed == 0 {
            Ok(())
        } else {
            Err(TransferError::BatchFailures {
                failed: self.failed,
                processed: self.processed,
            })
        }
    }

    fn record(&mut self, run_label: &str, result: Result<()>) {
        self.processed += 1;
        if let Err(err) = result {
            error!(run = %run_label, error = %err, "run failed to process");
            self.failed += 1;
        }
    }
}

/// Process every run of every configured sequencer family.
pub fn process_all<S: LedgerStore>(
    config: &Config,
    registry: &Registry,
    ledger: &StatusLedger<S>,
    launcher: &dyn Launcher,
) -> BatchSummary {
    let mut summary = BatchSummary::default();

    for (tag, section) in config.sequencer.iter() {
        let (policy, run_dirs) = match enumerate_family(registry, tag, section) {
            Ok(found) => found,
            Err(err) => {
                // Unknown family tag or unreadable data dir: the section is
                // skipped, the other families still run.
                error!(family = %tag, error = %err, "skipping sequencer section");
                summary.processed += 1;
                summary.failed += 1;
                continue;
            }
        };

        info!(
            family = %tag,
            data_dir = %section.data_dir.display(),
            runs = run_dirs.len(),
            "scanning data directory"
        );

        for run_dir in run_dirs {
            let label = run_dir.display().to_string();
            let result = Run::new(&run_dir, policy, section, &config.transfer)
                .and_then(|run| driver::process_run(&run, ledger, launcher));
            summary.record(&label, result);
        }
    }

    summary
}

/// Process exactly one named run, bypassing directory enumeration.
pub fn process_single<S: LedgerStore>(
    config: &Config,
    registry: &Registry,
    ledger: &StatusLedger<S>,
    launcher: &dyn Launcher,
    run_dir: &Path,
    tag: &str,
) -> Result<()> {
    let policy = registry.resolve(tag)?;
    let section = config
        .sequencer
        .get(&policy.run_type.to_string())
        .ok_or_else(|| {
            TransferError::ConfigError(format!(
                "no [sequencer.{}] section configured",
                policy.run_type
            ))
        })?;

    let run = Run::new(run_dir, policy, section, &config.transfer)?;
    info!(run_id = %run.run_id, family = %tag, "processing single run");
    driver::process_run(&run, ledger, launcher)
}

fn enumerate_family<'r>(
    registry: &'r Registry,
    tag: &str,
    section: &SequencerSection,
) -> Result<(&'r RunPolicy, Vec<PathBuf>)> {
    let policy = registry.resolve(tag)?;
    let ignore = fs::build_ignore_set(&section.ignore)?;
    let run_dirs = fs::find_runs(&section.data_dir, &ignore)?;
    Ok((policy, run_dirs))
}
