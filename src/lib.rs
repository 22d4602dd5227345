// src/lib.rs

pub mod batch;
pub mod cli;
pub mod config;
pub mod driver;
pub mod errors;
pub mod fs;
pub mod logging;
pub mod runs;
pub mod statusdb;
pub mod transfer;

use std::path::{Path, PathBuf};

use tracing::info;

use crate::cli::CliArgs;
use crate::config::{Config, load_and_validate};
use crate::errors::Result;
use crate::runs::{Registry, Run};
use crate::statusdb::{CouchDbStore, StatusLedger};
use crate::transfer::RsyncLauncher;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and logging
/// - the sequencer family registry
/// - the status ledger client
/// - the rsync launcher
///
/// and then processes either the single run named on the command line or
/// every configured data directory.
pub fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;

    // Logging comes up after config loading so `[log] file` can take
    // effect; config errors still reach stderr through main.
    logging::init_logging(args.log_level, &cfg.log)?;

    let registry = Registry::standard()?;

    if args.dry_run {
        print_dry_run(&cfg, &registry);
        return Ok(());
    }

    let store = CouchDbStore::from_config(&cfg.statusdb)?;
    let ledger = StatusLedger::new(store);
    let launcher = RsyncLauncher;

    match (&args.run, &args.run_type) {
        (Some(run_dir), Some(tag)) => {
            batch::process_single(&cfg, &registry, &ledger, &launcher, Path::new(run_dir), tag)
        }
        _ => {
            let summary = batch::process_all(&cfg, &registry, &ledger, &launcher);
            info!(
                processed = summary.processed,
                failed = summary.failed,
                "batch finished"
            );
            summary.into_result()
        }
    }
}

/// Dry-run output: enumerate runs and report their local state, touching
/// neither the ledger nor the process table.
fn print_dry_run(cfg: &Config, registry: &Registry) {
    println!("dataflow-transfer dry-run");
    println!("  transfer account: {}@{}", cfg.transfer.user, cfg.transfer.host);
    println!(
        "  status ledger: {} (database {})",
        cfg.statusdb.url, cfg.statusdb.database
    );

    for (tag, section) in cfg.sequencer.iter() {
        println!();
        println!(
            "[sequencer.{tag}] {} -> {}",
            section.data_dir.display(),
            section.destination
        );

        let policy = match registry.resolve(tag) {
            Ok(policy) => policy,
            Err(err) => {
                println!("  ! {err}");
                continue;
            }
        };

        let run_dirs = fs::build_ignore_set(&section.ignore)
            .and_then(|ignore| fs::find_runs(&section.data_dir, &ignore));
        let run_dirs = match run_dirs {
            Ok(run_dirs) => run_dirs,
            Err(err) => {
                println!("  ! {err:#}");
                continue;
            }
        };

        for run_dir in run_dirs {
            match Run::new(&run_dir, policy, section, &cfg.transfer) {
                Ok(run) => println!("  - {} ({})", run.run_id, describe_run(&run)),
                Err(err) => println!("  - {} (! {err})", run_dir.display()),
            }
        }
    }
}

fn describe_run(run: &Run) -> String {
    if run.confirm_run_type().is_err() {
        return "invalid run id".to_string();
    }
    if run.sequencing_ongoing() {
        return "sequencing ongoing".to_string();
    }
    format!(
        "sequencing finished, final sync {}, metadata synced: {}",
        run.final_sync_state(),
        run.metadata_synced()
    )
}
