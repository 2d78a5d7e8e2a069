//! Scripted emulator fake (testing only).

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::device::PeripheralBinding;
use crate::emulator::Emulator;
use crate::error::Result;

/// One recorded emulator interaction, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmulatorCall {
    Install(String),
    Attach(PeripheralBinding),
    Mount(PathBuf),
    Exec(String),
    Teardown,
}

/// Emulator that records every call and returns scripted exit codes for
/// `exec` (consumed in order; exhausted scripts return 0).
#[derive(Default)]
pub struct ScriptedEmulator {
    calls: Mutex<Vec<EmulatorCall>>,
    exit_codes: Mutex<Vec<i32>>,
}

impl ScriptedEmulator {
    /// Every command exits 0.
    pub fn all_passing() -> Self {
        Self::default()
    }

    /// Commands exit with the given codes, in order.
    pub fn with_exit_codes(codes: Vec<i32>) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            exit_codes: Mutex::new(codes),
        }
    }

    /// Full call log, in order.
    pub fn calls(&self) -> Vec<EmulatorCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Packages installed, in order.
    pub fn installed(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                EmulatorCall::Install(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    /// Peripherals attached, in order.
    pub fn attached(&self) -> Vec<PeripheralBinding> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                EmulatorCall::Attach(b) => Some(b),
                _ => None,
            })
            .collect()
    }

    /// Commands executed, in order.
    pub fn executed(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                EmulatorCall::Exec(cmd) => Some(cmd),
                _ => None,
            })
            .collect()
    }

    /// Whether teardown was called.
    pub fn torn_down(&self) -> bool {
        self.calls().contains(&EmulatorCall::Teardown)
    }

    fn record(&self, call: EmulatorCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Emulator for ScriptedEmulator {
    async fn install_package(&self, package: &str) -> Result<()> {
        self.record(EmulatorCall::Install(package.to_string()));
        Ok(())
    }

    async fn attach_peripheral(&self, binding: &PeripheralBinding) -> Result<()> {
        self.record(EmulatorCall::Attach(binding.clone()));
        Ok(())
    }

    async fn mount_shared_dir(&self, host_path: &Path) -> Result<()> {
        self.record(EmulatorCall::Mount(host_path.to_path_buf()));
        Ok(())
    }

    async fn exec(&self, command: &str) -> Result<i32> {
        self.record(EmulatorCall::Exec(command.to_string()));
        let mut codes = self.exit_codes.lock().unwrap();
        if codes.is_empty() {
            Ok(0)
        } else {
            Ok(codes.remove(0))
        }
    }

    async fn teardown(&self) -> Result<()> {
        self.record(EmulatorCall::Teardown);
        Ok(())
    }
}
