// src/fs/mod.rs

//! Local filesystem probes shared by the run model and the batch driver.
//!
//! Everything here reads the instrument-side disk only. Exit-code sentinel
//! files under each run directory are the crash-safe record of finished
//! sync attempts; they survive restarts of this tool and of the host.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde_json::Value;
use tracing::{debug, warn};

/// State recorded by an exit-code sentinel file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentinelState {
    /// No attempt has finished: the file is absent or not yet written.
    Missing,
    /// The recorded attempt exited with status 0.
    Success,
    /// The recorded attempt exited with the contained non-zero status.
    Failed(String),
}

impl std::fmt::Display for SentinelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SentinelState::Missing => f.write_str("missing"),
            SentinelState::Success => f.write_str("ok"),
            SentinelState::Failed(code) => write!(f, "failed with exit code {code}"),
        }
    }
}

/// Read an exit-code sentinel.
///
/// The file is written by the launched shell as `; echo $? > <sentinel>`
/// once rsync finishes. An existing-but-empty file means the code has not
/// landed yet and is treated the same as an absent file.
pub fn read_exit_sentinel(path: &Path) -> SentinelState {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) => {
            if err.kind() != ErrorKind::NotFound {
                warn!(file = %path.display(), error = %err, "could not read exit-code sentinel");
            }
            return SentinelState::Missing;
        }
    };

    let code = contents.trim();
    if code.is_empty() {
        SentinelState::Missing
    } else if code == "0" {
        SentinelState::Success
    } else {
        SentinelState::Failed(code.to_string())
    }
}

/// True when the sentinel records a successful attempt.
pub fn exit_sentinel_ok(path: &Path) -> bool {
    read_exit_sentinel(path) == SentinelState::Success
}

/// Compile ignore patterns into a `GlobSet` matched against entry names.
pub fn build_ignore_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .with_context(|| format!("invalid ignore pattern {:?}", pattern))?;
        builder.add(glob);
    }
    builder.build().context("building ignore globs")
}

/// List run-directory candidates under `data_dir`.
///
/// Returns every subdirectory whose name does not match the ignore set.
/// Plain files are skipped. Sorted so repeated scans visit runs in a
/// stable order.
pub fn find_runs(data_dir: &Path, ignore: &GlobSet) -> Result<Vec<PathBuf>> {
    let mut runs = Vec::new();
    let entries =
        fs::read_dir(data_dir).with_context(|| format!("reading data dir {:?}", data_dir))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("reading entry in {:?}", data_dir))?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        if ignore.is_match(Path::new(&entry.file_name())) {
            continue;
        }
        runs.push(path);
    }
    runs.sort();
    Ok(runs)
}

/// Resolve which of the configured metadata files exist in `run_dir`.
///
/// Missing names are silently skipped; while the instrument is still
/// writing, most of the manifest legitimately does not exist yet. The
/// caller syncs and summarises whatever is present.
pub fn locate_metadata(run_dir: &Path, manifest: &[String]) -> Vec<PathBuf> {
    let mut found = Vec::new();
    for name in manifest {
        let path = run_dir.join(name);
        if path.is_file() {
            found.push(path);
        } else {
            debug!(file = %path.display(), "metadata file not present yet");
        }
    }
    found
}

/// Parse located metadata files into JSON values for the status ledger.
///
/// Supported formats: `.json`, `.xml` and `key=value` style `.txt`. A file
/// that fails to parse is logged and left out rather than failing the run.
pub fn parse_metadata_files(paths: &[PathBuf]) -> BTreeMap<String, Value> {
    let mut parsed = BTreeMap::new();
    for path in paths {
        match parse_metadata_file(path) {
            Ok(value) => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                parsed.insert(name, value);
            }
            Err(err) => {
                warn!(file = %path.display(), error = %err, "skipping unparsable metadata file");
            }
        }
    }
    parsed
}

fn parse_metadata_file(path: &Path) -> Result<Value> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("reading metadata file {:?}", path))?;
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "json" => serde_json::from_str(&contents)
            .with_context(|| format!("parsing JSON metadata {:?}", path)),
        "xml" => quick_xml::de::from_str(&contents)
            .with_context(|| format!("parsing XML metadata {:?}", path)),
        "txt" => Ok(parse_keyword_lines(&contents)),
        other => bail!("unsupported metadata format {:?}", other),
    }
}

// Instrument summary files use one `key=value` pair per line; anything
// else on a line is ignored.
fn parse_keyword_lines(contents: &str) -> Value {
    let mut map = serde_json::Map::new();
    for line in contents.lines() {
        if let Some((key, value)) = line.split_once('=') {
            map.insert(
                key.trim().to_string(),
                Value::String(value.trim().to_string()),
            );
        }
    }
    Value::Object(map)
}
