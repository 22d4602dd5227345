// src/statusdb/couch.rs

//! CouchDB-backed [`LedgerStore`] with bounded retry.
//!
//! Documents are looked up through a view keyed on `runfolder_id` and
//! written back whole with `PUT /db/{id}`. Every remote call is retried
//! with linear backoff a fixed number of times; after that the original
//! error propagates and becomes a per-run failure.

use std::fmt;
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::warn;

use crate::config::StatusDbSection;
use crate::errors::Result;
use crate::statusdb::{LedgerStore, RunDocument};

const RETRY_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_secs(2);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const LOOKUP_VIEW: &str = "_design/dataflow/_view/runfolder_id";

/// Connection to the status ledger database.
#[derive(Debug, Clone)]
pub struct CouchDbStore {
    client: Client,
    base_url: String,
    database: String,
    username: String,
    password: String,
}

impl CouchDbStore {
    pub fn from_config(section: &StatusDbSection) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: normalise_url(&section.url),
            database: section.database.clone(),
            username: section.username.clone(),
            password: section.password.clone(),
        })
    }

    fn with_retry<T>(&self, what: &str, call: impl Fn() -> reqwest::Result<T>) -> Result<T> {
        retry_with_backoff(what, RETRY_DELAY, call).map_err(Into::into)
    }
}

/// Run a remote call up to [`RETRY_ATTEMPTS`] times, sleeping
/// `attempt * delay` between failures. The last error is returned once the
/// attempts are exhausted.
fn retry_with_backoff<T, E: fmt::Display>(
    what: &str,
    delay: Duration,
    call: impl Fn() -> std::result::Result<T, E>,
) -> std::result::Result<T, E> {
    let mut attempt = 1;
    loop {
        match call() {
            Ok(value) => return Ok(value),
            Err(err) if attempt < RETRY_ATTEMPTS => {
                warn!(attempt, error = %err, "{what} failed; retrying");
                thread::sleep(delay * attempt);
                attempt += 1;
            }
            Err(err) => {
                warn!(attempt, error = %err, "{what} failed; giving up");
                return Err(err);
            }
        }
    }
}

impl LedgerStore for CouchDbStore {
    fn fetch(&self, run_id: &str) -> Result<Option<RunDocument>> {
        let url = format!("{}/{}/{}", self.base_url, self.database, LOOKUP_VIEW);
        let key = format!("\"{run_id}\"");

        let view: ViewResponse = self.with_retry("run document lookup", || {
            self.client
                .get(&url)
                .basic_auth(&self.username, Some(&self.password))
                .query(&[("key", key.as_str()), ("include_docs", "true")])
                .send()?
                .error_for_status()?
                .json()
        })?;

        Ok(view.rows.into_iter().next().and_then(|row| row.doc))
    }

    fn save(&self, document: &RunDocument) -> Result<()> {
        // New documents have no _id yet; the run id becomes the document id.
        let id = document
            .id
            .as_deref()
            .unwrap_or(&document.runfolder_id);
        let url = format!("{}/{}/{}", self.base_url, self.database, id);

        self.with_retry("run document save", || {
            self.client
                .put(&url)
                .basic_auth(&self.username, Some(&self.password))
                .json(document)
                .send()?
                .error_for_status()
                .map(|_| ())
        })
    }
}

fn normalise_url(url: &str) -> String {
    let url = url.trim_end_matches('/');
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}

#[derive(Debug, Deserialize)]
struct ViewResponse {
    #[serde(default)]
    rows: Vec<ViewRow>,
}

#[derive(Debug, Deserialize)]
struct ViewRow {
    doc: Option<RunDocument>,
}
