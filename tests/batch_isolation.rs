// tests/batch_isolation.rs

//! One bad run (or one bad config section) must never stop the batch.

mod common;

use std::fs::{self, File};

use common::init_tracing;

use dataflow_transfer::batch::{BatchSummary, process_all, process_single};
use dataflow_transfer::errors::TransferError;
use dataflow_transfer::runs::{FINAL_SYNC_SENTINEL, METADATA_SYNC_SENTINEL};
use dataflow_transfer::statusdb::{EventKind, MemoryStore, StatusLedger};
use dataflow_transfer_test_utils::builders::{ConfigBuilder, sequencer_section};
use dataflow_transfer_test_utils::fake_launcher::FakeLauncher;

const HEALTHY_RUN: &str = "20251010_LH00202_0284_B22CVHTLT1";
const BROKEN_RUN: &str = "20251011_LH00202_0285_B22CVHTLT2";

#[test]
fn failing_run_does_not_stop_the_scan() {
    init_tracing();
    let data_dir = tempfile::tempdir().unwrap();

    // BROKEN_RUN: finished, metadata synced, final sync failed → fatal.
    let broken = data_dir.path().join(BROKEN_RUN);
    fs::create_dir(&broken).unwrap();
    File::create(broken.join("RTAComplete.txt")).unwrap();
    fs::write(broken.join(METADATA_SYNC_SENTINEL), "0\n").unwrap();
    fs::write(broken.join(FINAL_SYNC_SENTINEL), "1\n").unwrap();

    // HEALTHY_RUN: still sequencing → background mirror.
    fs::create_dir(data_dir.path().join(HEALTHY_RUN)).unwrap();

    // Ignored entry, never visited.
    fs::create_dir(data_dir.path().join("nosync")).unwrap();

    let config = ConfigBuilder::new()
        .with_sequencer(
            "NovaSeqXPlus",
            sequencer_section(data_dir.path(), "/proj/incoming/novaseqxplus"),
        )
        .build();
    let registry = dataflow_transfer::runs::Registry::standard().unwrap();
    let ledger = StatusLedger::new(MemoryStore::new());
    let launcher = FakeLauncher::new();

    let summary = process_all(&config, &registry, &ledger, &launcher);

    assert_eq!(
        summary,
        BatchSummary {
            processed: 2,
            failed: 1
        }
    );

    // The healthy run was still driven forward.
    let document = ledger.store().document(HEALTHY_RUN).unwrap();
    assert!(document.has_event(EventKind::SequencingStarted));
    assert!(ledger.store().document(BROKEN_RUN).is_none());

    // And the batch as a whole reports the failure.
    let err = summary.into_result().unwrap_err();
    assert!(matches!(
        err,
        TransferError::BatchFailures {
            failed: 1,
            processed: 2
        }
    ));
}

/// A ledger outage makes each affected run fail individually; the scan
/// still visits every run and no copy is started without its record.
#[test]
fn ledger_outage_fails_runs_without_stopping_the_scan() {
    init_tracing();
    let data_dir = tempfile::tempdir().unwrap();
    fs::create_dir(data_dir.path().join(HEALTHY_RUN)).unwrap();
    fs::create_dir(data_dir.path().join(BROKEN_RUN)).unwrap();

    let config = ConfigBuilder::new()
        .with_sequencer(
            "NovaSeqXPlus",
            sequencer_section(data_dir.path(), "/proj/incoming/novaseqxplus"),
        )
        .build();
    let registry = dataflow_transfer::runs::Registry::standard().unwrap();
    let ledger = StatusLedger::new(MemoryStore::new());
    let launcher = FakeLauncher::new();

    ledger.store().fail_requests("connection refused");

    let summary = process_all(&config, &registry, &ledger, &launcher);

    assert_eq!(
        summary,
        BatchSummary {
            processed: 2,
            failed: 2
        }
    );
    assert_eq!(launcher.launch_count(), 0);
    assert!(summary.into_result().is_err());
}

#[test]
fn unknown_family_section_is_skipped_not_fatal() {
    init_tracing();
    let known_dir = tempfile::tempdir().unwrap();
    fs::create_dir(known_dir.path().join(HEALTHY_RUN)).unwrap();
    let unknown_dir = tempfile::tempdir().unwrap();

    let config = ConfigBuilder::new()
        .with_sequencer(
            "NovaSeqXPlus",
            sequencer_section(known_dir.path(), "/proj/incoming/novaseqxplus"),
        )
        .with_sequencer(
            "HiSeq",
            sequencer_section(unknown_dir.path(), "/proj/incoming/hiseq"),
        )
        .build();
    let registry = dataflow_transfer::runs::Registry::standard().unwrap();
    let ledger = StatusLedger::new(MemoryStore::new());
    let launcher = FakeLauncher::new();

    let summary = process_all(&config, &registry, &ledger, &launcher);

    // The HiSeq section counts as one failure; the NovaSeqXPlus run still
    // gets processed.
    assert_eq!(summary.failed, 1);
    assert!(ledger.store().document(HEALTHY_RUN).is_some());
}

#[test]
fn single_run_mode_surfaces_errors_directly() {
    init_tracing();
    let data_dir = tempfile::tempdir().unwrap();
    let run_dir = data_dir.path().join("not_a_run");
    fs::create_dir(&run_dir).unwrap();

    let config = ConfigBuilder::new()
        .with_sequencer(
            "NovaSeqXPlus",
            sequencer_section(data_dir.path(), "/proj/incoming/novaseqxplus"),
        )
        .build();
    let registry = dataflow_transfer::runs::Registry::standard().unwrap();
    let ledger = StatusLedger::new(MemoryStore::new());
    let launcher = FakeLauncher::new();

    let err = process_single(
        &config,
        &registry,
        &ledger,
        &launcher,
        &run_dir,
        "NovaSeqXPlus",
    )
    .unwrap_err();
    assert!(matches!(err, TransferError::InvalidRunIdentifier { .. }));

    let err = process_single(
        &config,
        &registry,
        &ledger,
        &launcher,
        &run_dir,
        "HiSeq",
    )
    .unwrap_err();
    assert!(matches!(err, TransferError::UnknownRunType(tag) if tag == "HiSeq"));
}

#[test]
fn single_run_without_matching_section_is_a_config_error() {
    init_tracing();
    let data_dir = tempfile::tempdir().unwrap();
    let run_dir = data_dir.path().join(HEALTHY_RUN);
    fs::create_dir(&run_dir).unwrap();

    let config = ConfigBuilder::new()
        .with_sequencer(
            "MiSeq",
            sequencer_section(data_dir.path(), "/proj/incoming/miseq"),
        )
        .build();
    let registry = dataflow_transfer::runs::Registry::standard().unwrap();
    let ledger = StatusLedger::new(MemoryStore::new());
    let launcher = FakeLauncher::new();

    let err = process_single(
        &config,
        &registry,
        &ledger,
        &launcher,
        &run_dir,
        "NovaSeqXPlus",
    )
    .unwrap_err();
    match err {
        TransferError::ConfigError(msg) => assert!(msg.contains("sequencer.NovaSeqXPlus")),
        other => panic!("Expected ConfigError, got: {other:?}"),
    }
}
