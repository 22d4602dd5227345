#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use dataflow_transfer::config::{
    Config, LogSection, RawConfig, SequencerSection, StatusDbSection, TransferSection,
};
use dataflow_transfer::runs::{FINAL_SYNC_SENTINEL, METADATA_SYNC_SENTINEL, Registry, Run};

/// `[transfer]` section used across the scenario tests.
pub fn transfer_section() -> TransferSection {
    TransferSection {
        user: "funk".to_string(),
        host: "miarka.example.org".to_string(),
        options: vec!["--chown=:ngi2016003".to_string()],
    }
}

/// `[statusdb]` section pointing nowhere; tests use in-memory stores.
pub fn statusdb_section() -> StatusDbSection {
    StatusDbSection {
        url: "statusdb.example.org".to_string(),
        username: "dataflow".to_string(),
        password: "secret".to_string(),
        database: "dataflow".to_string(),
    }
}

/// A `[sequencer.<family>]` section rooted at `data_dir`.
pub fn sequencer_section(data_dir: &Path, destination: &str) -> SequencerSection {
    SequencerSection {
        data_dir: data_dir.to_path_buf(),
        destination: destination.to_string(),
        metadata: vec!["RunInfo.xml".to_string(), "RunParameters.xml".to_string()],
        ignore: vec!["nosync".to_string()],
        rsync_options: vec![],
    }
}

/// Builder for a validated [`Config`] with test defaults.
pub struct ConfigBuilder {
    sequencer: BTreeMap<String, SequencerSection>,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            sequencer: BTreeMap::new(),
        }
    }

    pub fn with_sequencer(mut self, tag: &str, section: SequencerSection) -> Self {
        self.sequencer.insert(tag.to_string(), section);
        self
    }

    pub fn build(self) -> Config {
        let raw = RawConfig {
            log: LogSection::default(),
            transfer: transfer_section(),
            statusdb: statusdb_section(),
            sequencer: self.sequencer,
        };
        Config::try_from(raw).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A run directory inside its own temp dir, with markers, sentinels and
/// metadata files laid out ahead of the test.
pub struct RunDir {
    // Held so the directory outlives the test body.
    _base: TempDir,
    pub run_dir: PathBuf,
}

impl RunDir {
    pub fn path(&self) -> &Path {
        &self.run_dir
    }

    /// The data directory containing this run (the temp dir root).
    pub fn data_dir(&self) -> &Path {
        self._base.path()
    }
}

/// Builder for [`RunDir`].
pub struct RunDirBuilder {
    run_id: String,
    marker: Option<String>,
    final_exit_code: Option<String>,
    metadata_exit_code: Option<String>,
    files: Vec<(String, String)>,
}

impl RunDirBuilder {
    pub fn new(run_id: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            marker: None,
            final_exit_code: None,
            metadata_exit_code: None,
            files: Vec::new(),
        }
    }

    /// Write the completion marker, so sequencing counts as finished.
    pub fn completed(mut self, marker: &str) -> Self {
        self.marker = Some(marker.to_string());
        self
    }

    /// Pre-write the final transfer's exit-code sentinel.
    pub fn final_exit_code(mut self, code: &str) -> Self {
        self.final_exit_code = Some(code.to_string());
        self
    }

    /// Pre-write the metadata sync's exit-code sentinel.
    pub fn metadata_exit_code(mut self, code: &str) -> Self {
        self.metadata_exit_code = Some(code.to_string());
        self
    }

    /// Drop an arbitrary file into the run directory.
    pub fn with_file(mut self, name: &str, contents: &str) -> Self {
        self.files.push((name.to_string(), contents.to_string()));
        self
    }

    pub fn build(self) -> RunDir {
        let base = TempDir::new().expect("Failed to create temp dir");
        let run_dir = base.path().join(&self.run_id);
        fs::create_dir(&run_dir).expect("Failed to create run dir");

        if let Some(marker) = &self.marker {
            File::create(run_dir.join(marker)).expect("Failed to create completion marker");
        }
        if let Some(code) = &self.final_exit_code {
            fs::write(run_dir.join(FINAL_SYNC_SENTINEL), format!("{code}\n"))
                .expect("Failed to write final sync sentinel");
        }
        if let Some(code) = &self.metadata_exit_code {
            fs::write(run_dir.join(METADATA_SYNC_SENTINEL), format!("{code}\n"))
                .expect("Failed to write metadata sync sentinel");
        }
        for (name, contents) in &self.files {
            fs::write(run_dir.join(name), contents).expect("Failed to write run file");
        }

        RunDir {
            _base: base,
            run_dir,
        }
    }
}

/// Construct a [`Run`] for a directory, resolving the family policy from
/// the standard registry.
pub fn build_run(
    run_dir: &Path,
    family: &str,
    section: &SequencerSection,
    transfer: &TransferSection,
) -> Run {
    let registry = Registry::standard().expect("Failed to build registry");
    let policy = registry
        .resolve(family)
        .unwrap_or_else(|err| panic!("Unknown family {family}: {err}"));
    Run::new(run_dir, policy, section, transfer).expect("Failed to build run")
}
