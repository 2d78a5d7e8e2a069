//! The hardware-in-the-loop test orchestrator.

use std::sync::Mutex;

use async_trait::async_trait;
use relforge_core::{HardwareTests, StageStatus};
use tracing::{info, warn};

use crate::device::PeripheralBinding;
use crate::emulator::Emulator;
use crate::error::{HilError, Result};
use crate::spec::TestSpec;

/// Orchestrator lifecycle. Provisioning always precedes DeviceAttachment,
/// and DeviceAttachment always precedes Running; the whole stage is a single
/// pass with no retry of a failed command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HilState {
    Idle,
    Provisioning,
    DeviceAttachment,
    Running,
    Succeeded,
    Failed,
}

impl std::fmt::Display for HilState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            HilState::Idle => "idle",
            HilState::Provisioning => "provisioning",
            HilState::DeviceAttachment => "device_attachment",
            HilState::Running => "running",
            HilState::Succeeded => "succeeded",
            HilState::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

/// How auxiliary packages are provisioned.
///
/// Constrained environments (local dry-runs) may assume packages are already
/// present. The skip is always explicit in the logs and never changes the
/// pass/fail semantics of the command sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionMode {
    Install,
    AssumePresent,
}

/// Drives one test stage against an emulated machine:
/// provision packages, attach peripherals in declared order, bind the shared
/// directory, then run the command sequence stop-on-first-failure.
pub struct TestOrchestrator<E: Emulator> {
    emulator: E,
    spec: TestSpec,
    provision_mode: ProvisionMode,
    state: Mutex<HilState>,
}

impl<E: Emulator> TestOrchestrator<E> {
    pub fn new(emulator: E, spec: TestSpec, provision_mode: ProvisionMode) -> Self {
        Self {
            emulator,
            spec,
            provision_mode,
            state: Mutex::new(HilState::Idle),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> HilState {
        *self.state.lock().unwrap()
    }

    /// The emulated machine this orchestrator drives.
    pub fn emulator(&self) -> &E {
        &self.emulator
    }

    fn transition(&self, next: HilState) {
        let mut state = self.state.lock().unwrap();
        info!(from = %*state, to = %next, "orchestrator transition");
        *state = next;
    }

    /// Run the whole stage once. Emulator infrastructure errors and failing
    /// commands both end in `Failed`; teardown runs on every path.
    pub async fn run_stage(&self) -> StageStatus {
        let outcome = self.drive().await;

        if let Err(e) = self.emulator.teardown().await {
            warn!(error = %e, "emulator teardown failed");
        }

        match outcome {
            Ok(()) => {
                self.transition(HilState::Succeeded);
                StageStatus::Succeeded
            }
            Err(e) => {
                self.transition(HilState::Failed);
                StageStatus::Failed(e.to_string())
            }
        }
    }

    async fn drive(&self) -> Result<()> {
        self.provision().await?;
        self.attach_devices().await?;
        self.run_commands().await
    }

    async fn provision(&self) -> Result<()> {
        self.transition(HilState::Provisioning);

        for package in &self.spec.packages {
            match self.provision_mode {
                ProvisionMode::Install => {
                    info!(package, "installing auxiliary package");
                    self.emulator.install_package(package).await?;
                }
                ProvisionMode::AssumePresent => {
                    // Explicit skip; silence here would hide missing packages.
                    warn!(package, "assuming package present, skipping install");
                }
            }
        }
        Ok(())
    }

    async fn attach_devices(&self) -> Result<()> {
        self.transition(HilState::DeviceAttachment);

        // Resolve every descriptor first so a malformed entry fails the
        // stage before any device is attached.
        let bindings = self
            .spec
            .devices
            .iter()
            .map(|d| d.resolve())
            .collect::<Result<Vec<PeripheralBinding>>>()?;

        for binding in &bindings {
            info!(device = %binding, "attaching virtual peripheral");
            self.emulator.attach_peripheral(binding).await?;
        }

        self.emulator.mount_shared_dir(&self.spec.shared_dir).await?;
        Ok(())
    }

    async fn run_commands(&self) -> Result<()> {
        self.transition(HilState::Running);

        for command in &self.spec.commands {
            info!(command, "executing test command");
            let code = self.emulator.exec(command).await?;
            if code != 0 {
                return Err(HilError::Emulator(format!(
                    "command `{command}` exited with code {code}"
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl<E: Emulator> HardwareTests for TestOrchestrator<E> {
    async fn run(&self) -> StageStatus {
        self.run_stage().await
    }
}
