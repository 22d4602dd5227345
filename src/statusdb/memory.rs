// src/statusdb/memory.rs

//! In-memory [`LedgerStore`] used by unit and scenario tests.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::anyhow;

use crate::errors::Result;
use crate::statusdb::{LedgerStore, RunDocument};

/// A ledger store backed by a map, with a fetch counter so tests can assert
/// that validation failures never reach the ledger, and a switchable
/// fail-mode simulating an unreachable store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: Mutex<BTreeMap<String, RunDocument>>,
    fetches: AtomicUsize,
    failing: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent request fail with `reason`, as if the store
    /// had become unreachable.
    pub fn fail_requests(&self, reason: &str) {
        *self.failing.lock().unwrap() = Some(reason.to_string());
    }

    /// Number of `fetch` calls seen so far, failed ones included.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Copy of the stored document for `run_id`, if any.
    pub fn document(&self, run_id: &str) -> Option<RunDocument> {
        self.documents.lock().unwrap().get(run_id).cloned()
    }

    /// Pre-seed a document, bypassing ledger semantics.
    pub fn insert(&self, document: RunDocument) {
        self.documents
            .lock()
            .unwrap()
            .insert(document.runfolder_id.clone(), document);
    }
}

impl MemoryStore {
    fn check_reachable(&self) -> Result<()> {
        match self.failing.lock().unwrap().as_deref() {
            Some(reason) => Err(anyhow!("{reason}").into()),
            None => Ok(()),
        }
    }
}

impl LedgerStore for MemoryStore {
    fn fetch(&self, run_id: &str) -> Result<Option<RunDocument>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;
        Ok(self.documents.lock().unwrap().get(run_id).cloned())
    }

    fn save(&self, document: &RunDocument) -> Result<()> {
        self.check_reachable()?;
        self.documents
            .lock()
            .unwrap()
            .insert(document.runfolder_id.clone(), document.clone());
        Ok(())
    }
}
