// tests/scenarios.rs

//! End-to-end lifecycle scenarios over a real run directory (tempdir), a
//! fake launcher and an in-memory ledger store.

mod common;

use common::init_tracing;

use dataflow_transfer::driver::process_run;
use dataflow_transfer::errors::TransferError;
use dataflow_transfer::runs::Run;
use dataflow_transfer::statusdb::{EventKind, MemoryStore, RunDocument, StatusLedger};
use dataflow_transfer::transfer::{bulk_command, metadata_command};
use dataflow_transfer_test_utils::builders::{
    RunDir, RunDirBuilder, build_run, sequencer_section, transfer_section,
};
use dataflow_transfer_test_utils::fake_launcher::FakeLauncher;

const NOVASEQ_RUN: &str = "20251010_LH00202_0284_B22CVHTLT1";

fn novaseq_run(run_dir: &RunDir) -> Run {
    let section = sequencer_section(run_dir.data_dir(), "/proj/incoming/novaseqxplus");
    build_run(run_dir.path(), "NovaSeqXPlus", &section, &transfer_section())
}

fn event_kinds(document: &RunDocument) -> Vec<EventKind> {
    document.events.iter().map(|e| e.kind).collect()
}

/// Scenario A: sequencing still ongoing.
#[test]
fn ongoing_run_records_start_once_and_mirrors_in_background() {
    init_tracing();
    let run_dir = RunDirBuilder::new(NOVASEQ_RUN)
        .with_file("RunInfo.xml", "<RunInfo><Run>1</Run></RunInfo>")
        .build();
    let run = novaseq_run(&run_dir);
    let ledger = StatusLedger::new(MemoryStore::new());
    let launcher = FakeLauncher::new();

    process_run(&run, &ledger, &launcher).unwrap();

    let launched = launcher.launched();
    assert_eq!(launched.len(), 1);
    let background = bulk_command(&run, false);
    assert_eq!(launched[0], background);
    assert!(!launched[0].cmdline.contains("echo $?"));

    let document = ledger.store().document(NOVASEQ_RUN).unwrap();
    assert_eq!(
        event_kinds(&document),
        vec![EventKind::SequencingStarted, EventKind::TransferStarted]
    );
    assert_eq!(document.flowcell_id, "B22CVHTLT1");
    assert!(document.files.contains_key("RunInfo.xml"));

    // Re-invoking while the mirror is still running must not launch a
    // second copy nor duplicate any event.
    launcher.set_in_flight(&background.source, &background.destination);
    process_run(&run, &ledger, &launcher).unwrap();

    assert_eq!(launcher.launch_count(), 1);
    let document = ledger.store().document(NOVASEQ_RUN).unwrap();
    assert_eq!(
        event_kinds(&document),
        vec![EventKind::SequencingStarted, EventKind::TransferStarted]
    );
}

/// Scenario B: sequencing finished, nothing synced yet.
#[test]
fn finished_run_syncs_metadata_and_starts_final_transfer() {
    init_tracing();
    let run_dir = RunDirBuilder::new(NOVASEQ_RUN)
        .completed("RTAComplete.txt")
        .with_file("RunInfo.xml", "<RunInfo><Run>1</Run></RunInfo>")
        .build();
    let run = novaseq_run(&run_dir);
    let ledger = StatusLedger::new(MemoryStore::new());
    let launcher = FakeLauncher::new();

    process_run(&run, &ledger, &launcher).unwrap();

    let launched = launcher.launched();
    assert_eq!(launched.len(), 2);
    assert_eq!(launched[0], metadata_command(&run));
    assert_eq!(launched[1], bulk_command(&run, true));
    assert!(launched[1].cmdline.ends_with(&format!(
        " ; echo $? > {}",
        run.final_sync_sentinel().display()
    )));

    let document = ledger.store().document(NOVASEQ_RUN).unwrap();
    assert_eq!(
        event_kinds(&document),
        vec![
            EventKind::MetadataSyncStarted,
            EventKind::SequencingFinished,
            EventKind::FinalTransferStarted,
        ]
    );
}

/// Scenario C: final sentinel reports success.
#[test]
fn successful_final_sync_marks_run_transferred_then_goes_quiet() {
    init_tracing();
    let run_dir = RunDirBuilder::new(NOVASEQ_RUN)
        .completed("RTAComplete.txt")
        .metadata_exit_code("0")
        .final_exit_code("0")
        .build();
    let run = novaseq_run(&run_dir);
    let ledger = StatusLedger::new(MemoryStore::new());
    let launcher = FakeLauncher::new();

    process_run(&run, &ledger, &launcher).unwrap();

    let document = ledger.store().document(NOVASEQ_RUN).unwrap();
    assert_eq!(event_kinds(&document), vec![EventKind::TransferredToHpc]);
    assert_eq!(launcher.launch_count(), 0);

    // Terminal: every later invocation is a no-op.
    process_run(&run, &ledger, &launcher).unwrap();
    process_run(&run, &ledger, &launcher).unwrap();

    let document = ledger.store().document(NOVASEQ_RUN).unwrap();
    assert_eq!(event_kinds(&document), vec![EventKind::TransferredToHpc]);
    assert_eq!(launcher.launch_count(), 0);
}

/// Scenario D: final sentinel reports failure, nothing in flight.
#[test]
fn failed_final_sync_with_nothing_in_flight_is_fatal_for_the_run() {
    init_tracing();
    let run_dir = RunDirBuilder::new(NOVASEQ_RUN)
        .completed("RTAComplete.txt")
        .metadata_exit_code("0")
        .final_exit_code("1")
        .build();
    let run = novaseq_run(&run_dir);
    let ledger = StatusLedger::new(MemoryStore::new());
    let launcher = FakeLauncher::new();

    let err = process_run(&run, &ledger, &launcher).unwrap_err();
    match err {
        TransferError::FinalSyncFailed { run_id, exit_code } => {
            assert_eq!(run_id, NOVASEQ_RUN);
            assert_eq!(exit_code, "1");
        }
        other => panic!("Expected FinalSyncFailed, got: {other:?}"),
    }
    assert_eq!(launcher.launch_count(), 0);
}

/// A failed sentinel with a retry already running is not fatal; the driver
/// waits for the new attempt's sentinel instead.
#[test]
fn failed_final_sync_with_retry_in_flight_waits() {
    init_tracing();
    let run_dir = RunDirBuilder::new(NOVASEQ_RUN)
        .completed("RTAComplete.txt")
        .metadata_exit_code("0")
        .final_exit_code("1")
        .build();
    let run = novaseq_run(&run_dir);
    let ledger = StatusLedger::new(MemoryStore::new());
    let launcher = FakeLauncher::new();

    let final_sync = bulk_command(&run, true);
    launcher.set_in_flight(&final_sync.source, &final_sync.destination);

    process_run(&run, &ledger, &launcher).unwrap();
    assert_eq!(launcher.launch_count(), 0);
}

/// Scenario E: a bad run id fails before any ledger or launcher access.
#[test]
fn invalid_run_id_fails_before_ledger_and_launcher_are_touched() {
    init_tracing();
    let run_dir = RunDirBuilder::new("invalid_run_id").build();
    let run = novaseq_run(&run_dir);
    let ledger = StatusLedger::new(MemoryStore::new());
    let launcher = FakeLauncher::new();

    let err = process_run(&run, &ledger, &launcher).unwrap_err();
    assert!(matches!(
        err,
        TransferError::InvalidRunIdentifier { run_id, .. } if run_id == "invalid_run_id"
    ));
    assert_eq!(ledger.store().fetch_count(), 0);
    assert_eq!(launcher.launch_count(), 0);
}

/// Removing the final sentinel is the operator escape hatch: the next
/// invocation attempts a fresh final transfer.
#[test]
fn clearing_the_sentinel_retries_the_final_transfer() {
    init_tracing();
    let run_dir = RunDirBuilder::new(NOVASEQ_RUN)
        .completed("RTAComplete.txt")
        .metadata_exit_code("0")
        .final_exit_code("1")
        .build();
    let run = novaseq_run(&run_dir);
    let ledger = StatusLedger::new(MemoryStore::new());
    let launcher = FakeLauncher::new();

    assert!(process_run(&run, &ledger, &launcher).is_err());

    std::fs::remove_file(run.final_sync_sentinel()).unwrap();
    process_run(&run, &ledger, &launcher).unwrap();

    let launched = launcher.launched();
    assert_eq!(launched.len(), 1);
    assert_eq!(launched[0], bulk_command(&run, true));
}

/// A metadata sync in flight must not suppress the final transfer (and
/// vice versa): the guard matches source and destination.
#[test]
fn metadata_sync_in_flight_does_not_shadow_the_final_transfer() {
    init_tracing();
    let run_dir = RunDirBuilder::new(NOVASEQ_RUN)
        .completed("RTAComplete.txt")
        .build();
    let run = novaseq_run(&run_dir);
    let ledger = StatusLedger::new(MemoryStore::new());
    let launcher = FakeLauncher::new();

    let metadata = metadata_command(&run);
    launcher.set_in_flight(&metadata.source, &metadata.destination);

    process_run(&run, &ledger, &launcher).unwrap();

    let launched = launcher.launched();
    assert_eq!(launched.len(), 1);
    assert_eq!(launched[0], bulk_command(&run, true));

    let document = ledger.store().document(NOVASEQ_RUN).unwrap();
    // No metadata_sync_started: nothing was actually launched for it.
    assert_eq!(
        event_kinds(&document),
        vec![EventKind::SequencingFinished, EventKind::FinalTransferStarted]
    );
}

/// With the store down, the terminal-state read degrades to "not
/// recorded" instead of erroring; the run then fails on the append, not
/// on the read, and nothing is launched.
#[test]
fn ledger_outage_degrades_reads_and_surfaces_on_the_append() {
    init_tracing();
    let run_dir = RunDirBuilder::new(NOVASEQ_RUN)
        .completed("RTAComplete.txt")
        .metadata_exit_code("0")
        .final_exit_code("0")
        .build();
    let run = novaseq_run(&run_dir);
    let ledger = StatusLedger::new(MemoryStore::new());
    let launcher = FakeLauncher::new();

    ledger.store().fail_requests("connection refused");

    let err = process_run(&run, &ledger, &launcher).unwrap_err();
    assert!(err.to_string().contains("connection refused"));
    assert_eq!(launcher.launch_count(), 0);
}

/// A launch failure propagates as a per-run error.
#[test]
fn launch_failure_is_propagated() {
    init_tracing();
    let run_dir = RunDirBuilder::new(NOVASEQ_RUN).build();
    let run = novaseq_run(&run_dir);
    let ledger = StatusLedger::new(MemoryStore::new());
    let launcher = FakeLauncher::new();
    launcher.fail_launches();

    let err = process_run(&run, &ledger, &launcher).unwrap_err();
    assert!(matches!(err, TransferError::Launch(_)));
}
