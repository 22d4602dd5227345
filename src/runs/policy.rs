// src/runs/policy.rs

//! Naming and completion rules per instrument family.
//!
//! Each family owns a run-id format, the marker file its instrument writes
//! when sequencing finishes, and a rule for deriving the flow cell id from
//! the run id. The rules live here so the rest of the crate never matches
//! on family names.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use regex::Regex;

use crate::errors::{Result, TransferError};

/// Instrument families this tool knows how to handle.
///
/// The `[sequencer.<family>]` config keys must spell these the same way
/// `Display` does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunType {
    NovaSeqXPlus,
    NextSeq,
    MiSeq,
    MiSeqI100,
    PromethIon,
    MinIon,
    Aviti,
}

impl fmt::Display for RunType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            RunType::NovaSeqXPlus => "NovaSeqXPlus",
            RunType::NextSeq => "NextSeq",
            RunType::MiSeq => "MiSeq",
            RunType::MiSeqI100 => "MiSeqi100",
            RunType::PromethIon => "PromethION",
            RunType::MinIon => "MinION",
            RunType::Aviti => "Aviti",
        };
        f.write_str(tag)
    }
}

impl FromStr for RunType {
    type Err = TransferError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "NovaSeqXPlus" => Ok(RunType::NovaSeqXPlus),
            "NextSeq" => Ok(RunType::NextSeq),
            "MiSeq" => Ok(RunType::MiSeq),
            "MiSeqi100" => Ok(RunType::MiSeqI100),
            "PromethION" => Ok(RunType::PromethIon),
            "MinION" => Ok(RunType::MinIon),
            "Aviti" => Ok(RunType::Aviti),
            other => Err(TransferError::UnknownRunType(other.to_string())),
        }
    }
}

/// How to derive the flow cell id from an underscore-separated run id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowCellRule {
    /// The field at this zero-based position.
    Field(usize),
    /// The last field.
    LastField,
}

impl FlowCellRule {
    /// Apply the rule; falls back to the whole run id when the field is
    /// out of range (only reachable for ids that fail the format check).
    pub fn apply(&self, run_id: &str) -> String {
        let fields: Vec<&str> = run_id.split('_').collect();
        let picked = match self {
            FlowCellRule::Field(index) => fields.get(*index).copied(),
            FlowCellRule::LastField => fields.last().copied(),
        };
        picked.unwrap_or(run_id).to_string()
    }
}

/// Static per-family rules.
#[derive(Debug, Clone)]
pub struct RunPolicy {
    pub run_type: RunType,
    /// Anchored pattern every run id of this family must match.
    pub run_id_format: Regex,
    /// File the instrument writes into the run directory when sequencing
    /// is finished.
    pub completion_marker: &'static str,
    pub flow_cell_rule: FlowCellRule,
}

/// Lookup table from family tag to [`RunPolicy`].
#[derive(Debug, Clone)]
pub struct Registry {
    policies: BTreeMap<RunType, RunPolicy>,
}

impl Registry {
    /// Build the registry of all supported families.
    pub fn standard() -> Result<Self> {
        let mut policies = BTreeMap::new();
        for policy in [
            policy(
                RunType::NovaSeqXPlus,
                r"^\d{8}_[A-Z0-9]+_\d{4}_[A-Z0-9]+$",
                "RTAComplete.txt",
                FlowCellRule::LastField,
            )?,
            policy(
                RunType::NextSeq,
                r"^\d{6}_[A-Z0-9]+_\d{3}_[A-Z0-9]+$",
                "RTAComplete.txt",
                FlowCellRule::LastField,
            )?,
            policy(
                RunType::MiSeq,
                r"^\d{6}_[A-Z0-9]+_\d{4}_[A-Z0-9\-]+$",
                "RTAComplete.txt",
                FlowCellRule::LastField,
            )?,
            policy(
                RunType::MiSeqI100,
                r"^\d{8}_[A-Z0-9]+_\d{4}_[A-Z0-9\-]+$",
                "RTAComplete.txt",
                FlowCellRule::LastField,
            )?,
            // ONT ids: date_time_position_flowcell_hash; the flow cell is
            // the fourth field, not the last.
            policy(
                RunType::PromethIon,
                r"^\d{8}_\d{4}_[A-Za-z0-9\-]+_[A-Z0-9]+_[0-9a-f]+$",
                "final_summary.txt",
                FlowCellRule::Field(3),
            )?,
            policy(
                RunType::MinIon,
                r"^\d{8}_\d{4}_[A-Za-z0-9\-]+_[A-Z0-9]+_[0-9a-f]+$",
                "final_summary.txt",
                FlowCellRule::Field(3),
            )?,
            policy(
                RunType::Aviti,
                r"^\d{8}_AV[0-9]+_[A-Z0-9\-]+$",
                "RunUploaded.json",
                FlowCellRule::LastField,
            )?,
        ] {
            policies.insert(policy.run_type, policy);
        }
        Ok(Self { policies })
    }

    /// Resolve a config family tag into its policy.
    pub fn resolve(&self, tag: &str) -> Result<&RunPolicy> {
        let run_type: RunType = tag.parse()?;
        self.policies
            .get(&run_type)
            .ok_or_else(|| TransferError::UnknownRunType(tag.to_string()))
    }
}

fn policy(
    run_type: RunType,
    pattern: &str,
    completion_marker: &'static str,
    flow_cell_rule: FlowCellRule,
) -> Result<RunPolicy> {
    let run_id_format = Regex::new(pattern)
        .map_err(|e| TransferError::ConfigError(format!("bad run id pattern for {run_type}: {e}")))?;
    Ok(RunPolicy {
        run_type,
        run_id_format,
        completion_marker,
        flow_cell_rule,
    })
}
