// src/config/validate.rs

use crate::config::model::{Config, RawConfig, SequencerSection};
use crate::errors::{Result, TransferError};

impl TryFrom<RawConfig> for Config {
    type Error = TransferError;

    fn try_from(raw: RawConfig) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(Config::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfig) -> Result<()> {
    validate_transfer(cfg)?;
    validate_statusdb(cfg)?;
    ensure_has_sequencers(cfg)?;
    validate_sequencers(cfg)?;
    Ok(())
}

fn validate_transfer(cfg: &RawConfig) -> Result<()> {
    if cfg.transfer.user.trim().is_empty() {
        return Err(TransferError::ConfigError(
            "[transfer].user must not be empty".to_string(),
        ));
    }
    if cfg.transfer.host.trim().is_empty() {
        return Err(TransferError::ConfigError(
            "[transfer].host must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_statusdb(cfg: &RawConfig) -> Result<()> {
    if cfg.statusdb.url.trim().is_empty() {
        return Err(TransferError::ConfigError(
            "[statusdb].url must not be empty".to_string(),
        ));
    }
    if cfg.statusdb.database.trim().is_empty() {
        return Err(TransferError::ConfigError(
            "[statusdb].database must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn ensure_has_sequencers(cfg: &RawConfig) -> Result<()> {
    if cfg.sequencer.is_empty() {
        return Err(TransferError::ConfigError(
            "config must contain at least one [sequencer.<family>] section".to_string(),
        ));
    }
    Ok(())
}

// Family tags are *not* checked against the known instrument families here;
// an unrecognised tag is reported when that family is processed, so one bad
// section cannot block transfers for the others.
fn validate_sequencers(cfg: &RawConfig) -> Result<()> {
    for (tag, section) in cfg.sequencer.iter() {
        validate_sequencer(tag, section)?;
    }
    Ok(())
}

fn validate_sequencer(tag: &str, section: &SequencerSection) -> Result<()> {
    if section.data_dir.as_os_str().is_empty() {
        return Err(TransferError::ConfigError(format!(
            "[sequencer.{}].data_dir must not be empty",
            tag
        )));
    }
    if section.destination.trim().is_empty() {
        return Err(TransferError::ConfigError(format!(
            "[sequencer.{}].destination must not be empty",
            tag
        )));
    }
    Ok(())
}
