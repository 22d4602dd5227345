// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

/// Top-level configuration as read from a TOML file, before validation.
///
/// This is a direct mapping of the config layout:
///
/// ```toml
/// [log]
/// file = "/var/log/dataflow-transfer.log"
/// level = "info"
///
/// [transfer]
/// user = "funk"
/// host = "miarka.example.org"
/// options = ["--chown=:ngi2016003", "--chmod=Dg+s,g+rw"]
///
/// [statusdb]
/// url = "statusdb.example.org"
/// username = "dataflow"
/// password = "secret"
/// database = "dataflow"
///
/// [sequencer.NovaSeqXPlus]
/// data_dir = "/data/novaseqxplus"
/// destination = "/proj/incoming/novaseqxplus"
/// metadata = ["RunInfo.xml", "RunParameters.xml"]
/// ignore = ["nosync/**"]
/// rsync_options = ["--exclude=Thumbnail_Images"]
/// ```
///
/// Only `[log]` is optional as a whole; use [`Config::try_from`] to get the
/// validated form.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfig {
    /// Log file and level from `[log]`.
    #[serde(default)]
    pub log: LogSection,

    /// Remote account and global rsync options from `[transfer]`.
    pub transfer: TransferSection,

    /// Status ledger connection details from `[statusdb]`.
    pub statusdb: StatusDbSection,

    /// All instrument families from `[sequencer.<family>]`.
    ///
    /// Keys are the *family tags* (e.g. `"NovaSeqXPlus"`, `"PromethION"`).
    #[serde(default)]
    pub sequencer: BTreeMap<String, SequencerSection>,
}

/// `[log]` section.
///
/// Both keys are optional; an absent section means stderr logging at the
/// default level.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct LogSection {
    /// Log file path; when set, output is appended there instead of stderr.
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Log level name ("error", "warn", "info", "debug", "trace").
    #[serde(default)]
    pub level: Option<String>,
}

/// `[transfer]` section.
///
/// Describes the account on the receiving cluster and rsync options shared
/// by every family.
#[derive(Debug, Clone, Deserialize)]
pub struct TransferSection {
    /// Remote user name.
    pub user: String,

    /// Remote host name.
    pub host: String,

    /// rsync options applied to every sync, before per-family options.
    #[serde(default)]
    pub options: Vec<String>,
}

/// `[statusdb]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusDbSection {
    /// Server name or URL; a bare host gets `https://` prepended.
    pub url: String,

    /// Basic-auth user name.
    pub username: String,

    /// Basic-auth password.
    pub password: String,

    /// Database holding the run documents.
    pub database: String,
}

/// `[sequencer.<family>]` section.
///
/// One section per instrument family the deployment watches.
#[derive(Debug, Clone, Deserialize)]
pub struct SequencerSection {
    /// Directory under which this family's run directories appear.
    pub data_dir: PathBuf,

    /// Destination path on the receiving cluster.
    pub destination: String,

    /// File names (relative to the run directory) synced ahead of the run
    /// and summarised into the status ledger.
    #[serde(default)]
    pub metadata: Vec<String>,

    /// Glob patterns for entries under `data_dir` that are never runs.
    #[serde(default)]
    pub ignore: Vec<String>,

    /// Family-specific rsync options, appended after `[transfer].options`.
    #[serde(default)]
    pub rsync_options: Vec<String>,
}

/// Validated configuration.
///
/// Construct via `Config::try_from(raw)`; the fields mirror [`RawConfig`]
/// but the invariants in `validate.rs` are known to hold.
#[derive(Debug, Clone)]
pub struct Config {
    pub log: LogSection,
    pub transfer: TransferSection,
    pub statusdb: StatusDbSection,
    pub sequencer: BTreeMap<String, SequencerSection>,
}

impl Config {
    /// Build a `Config` without re-running validation.
    ///
    /// Only `validate.rs` should call this, after its checks pass.
    pub(crate) fn new_unchecked(raw: RawConfig) -> Self {
        Self {
            log: raw.log,
            transfer: raw.transfer,
            statusdb: raw.statusdb,
            sequencer: raw.sequencer,
        }
    }
}
