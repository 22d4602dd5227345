use std::sync::Mutex;

use dataflow_transfer::errors::{Result, TransferError};
use dataflow_transfer::transfer::{Launcher, SyncCommand};

/// A fake launcher that:
/// - records every command it "launched"
/// - answers the in-flight check from a scriptable set of
///   (source, destination) pairs
/// - can be told to fail all launches.
#[derive(Debug, Default)]
pub struct FakeLauncher {
    launched: Mutex<Vec<SyncCommand>>,
    in_flight: Mutex<Vec<(String, String)>>,
    fail_launches: Mutex<bool>,
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a (source, destination) pair as already running.
    pub fn set_in_flight(&self, source: &str, destination: &str) {
        self.in_flight
            .lock()
            .unwrap()
            .push((source.to_string(), destination.to_string()));
    }

    /// Make every subsequent launch fail, as if the tool were missing.
    pub fn fail_launches(&self) {
        *self.fail_launches.lock().unwrap() = true;
    }

    /// Everything launched so far, in order.
    pub fn launched(&self) -> Vec<SyncCommand> {
        self.launched.lock().unwrap().clone()
    }

    pub fn launch_count(&self) -> usize {
        self.launched.lock().unwrap().len()
    }
}

impl Launcher for FakeLauncher {
    fn is_in_flight(&self, source: &str, destination: &str) -> bool {
        self.in_flight
            .lock()
            .unwrap()
            .iter()
            .any(|(s, d)| s == source && d == destination)
    }

    fn launch(&self, command: &SyncCommand) -> Result<()> {
        if *self.fail_launches.lock().unwrap() {
            return Err(TransferError::Launch(format!(
                "`{}`: fake launcher told to fail",
                command.cmdline
            )));
        }
        self.launched.lock().unwrap().push(command.clone());
        Ok(())
    }
}
