// src/statusdb/mod.rs

//! Append-only status ledger for run lifecycle events.
//!
//! Every run has one document in the remote store, keyed by its run id.
//! Milestones are recorded by appending events; the current state of a run
//! is always derived by reducing the event sequence, never stored. Two
//! event kinds are once-only: appending a duplicate of those is a no-op.
//!
//! Responsibilities:
//! - Document and event data model (this file).
//! - Ledger semantics: seed-if-absent, once-only guard, first-write-wins
//!   file merge, chronological append (this file).
//! - The CouchDB-backed store with retry (`couch.rs`) and the in-memory
//!   store used by tests and fakes (`memory.rs`).

pub mod couch;
pub mod memory;

pub use couch::CouchDbStore;
pub use memory::MemoryStore;

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;

/// Lifecycle milestones recorded in a run's ledger document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    SequencingStarted,
    SequencingFinished,
    TransferStarted,
    FinalTransferStarted,
    MetadataSyncStarted,
    TransferredToHpc,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::SequencingStarted => "sequencing_started",
            EventKind::SequencingFinished => "sequencing_finished",
            EventKind::TransferStarted => "transfer_started",
            EventKind::FinalTransferStarted => "final_transfer_started",
            EventKind::MetadataSyncStarted => "metadata_sync_started",
            EventKind::TransferredToHpc => "transferred_to_hpc",
        }
    }

    /// Whether a second event of this kind must never be recorded.
    pub fn once_only(self) -> bool {
        matches!(
            self,
            EventKind::SequencingStarted | EventKind::SequencingFinished
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded lifecycle transition. Never mutated after the append.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub payload: Value,
}

/// The per-run ledger document as stored remotely.
///
/// `_id`/`_rev` are the store's own bookkeeping; fresh documents carry
/// neither and are addressed by `runfolder_id` through a lookup view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunDocument {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    pub runfolder_id: String,
    pub flowcell_id: String,
    #[serde(default)]
    pub events: Vec<Event>,
    #[serde(default)]
    pub files: BTreeMap<String, Value>,
}

impl RunDocument {
    /// Fresh document for a run the ledger has never seen.
    pub fn seed(run_id: &str, flow_cell_id: &str) -> Self {
        Self {
            id: None,
            rev: None,
            runfolder_id: run_id.to_string(),
            flowcell_id: flow_cell_id.to_string(),
            events: Vec::new(),
            files: BTreeMap::new(),
        }
    }

    /// Reduce the event sequence: did this milestone happen at least once?
    pub fn has_event(&self, kind: EventKind) -> bool {
        self.events.iter().any(|event| event.kind == kind)
    }
}

/// How a document store must behave for the ledger to sit on top of it.
///
/// Production uses [`CouchDbStore`]; tests use [`MemoryStore`].
pub trait LedgerStore {
    /// Look up the document for `run_id`; `None` when the run is unknown.
    fn fetch(&self, run_id: &str) -> Result<Option<RunDocument>>;

    /// Persist the whole document, replacing the stored version.
    fn save(&self, document: &RunDocument) -> Result<()>;
}

/// Append-only event recording over a [`LedgerStore`].
#[derive(Debug)]
pub struct StatusLedger<S> {
    store: S,
}

impl<S: LedgerStore> StatusLedger<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Read-only milestone check.
    ///
    /// Degrades to `false` with a warning when the store is unreachable:
    /// sentinel files, not the ledger, guard launches, so a degraded read
    /// can never double-start a copy.
    pub fn has_event(&self, run_id: &str, kind: EventKind) -> bool {
        match self.store.fetch(run_id) {
            Ok(document) => document.map(|d| d.has_event(kind)).unwrap_or(false),
            Err(err) => {
                warn!(
                    run_id,
                    kind = %kind,
                    error = %err,
                    "status ledger unreachable; treating milestone as not recorded"
                );
                false
            }
        }
    }

    /// Record a lifecycle transition for `run_id`.
    ///
    /// Fetches the current document (seeding a fresh one when absent),
    /// short-circuits duplicate once-only kinds, merges `files` without
    /// overwriting already-recorded names, appends the event and saves the
    /// document back. Store failures propagate to the caller after the
    /// store's own retries are exhausted.
    pub fn append_event(
        &self,
        run_id: &str,
        flow_cell_id: &str,
        kind: EventKind,
        payload: Value,
        files: &BTreeMap<String, Value>,
    ) -> Result<()> {
        let mut document = self
            .store
            .fetch(run_id)?
            .unwrap_or_else(|| RunDocument::seed(run_id, flow_cell_id));

        if kind.once_only() && document.has_event(kind) {
            debug!(run_id, kind = %kind, "once-only event already recorded; skipping");
            return Ok(());
        }

        for (name, value) in files {
            document
                .files
                .entry(name.clone())
                .or_insert_with(|| value.clone());
        }

        document.events.push(Event {
            kind,
            timestamp: Utc::now(),
            payload,
        });

        debug!(run_id, kind = %kind, "appending ledger event");
        self.store.save(&document)
    }
}
