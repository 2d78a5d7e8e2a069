//! The emulated-machine contract.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::device::PeripheralBinding;
use crate::error::{HilError, Result};

/// An emulated machine standing in for physical hardware.
///
/// The engine behind it is a black box; this contract covers exactly what
/// the orchestrator needs: provisioning, peripheral attachment, shared
/// directory binding, command execution, and teardown.
#[async_trait]
pub trait Emulator: Send + Sync {
    /// Provision one auxiliary runtime package into the test environment.
    async fn install_package(&self, package: &str) -> Result<()>;

    /// Attach a resolved virtual peripheral.
    async fn attach_peripheral(&self, binding: &PeripheralBinding) -> Result<()>;

    /// Bind a host directory for bidirectional file exchange.
    async fn mount_shared_dir(&self, host_path: &Path) -> Result<()>;

    /// Execute one command inside the emulated environment, returning its
    /// exit code.
    async fn exec(&self, command: &str) -> Result<i32>;

    /// Tear the emulated environment down and release all bindings.
    async fn teardown(&self) -> Result<()>;
}

/// Emulator driven through an external launcher command.
///
/// Every operation is delegated to the launcher with a subcommand, e.g.
/// `renode-shell exec -- <command>`. Exit codes from `exec` propagate
/// verbatim; nonzero launcher exits on control operations are errors.
#[derive(Debug, Clone)]
pub struct ProcessEmulator {
    /// Launcher executable plus fixed leading arguments.
    launcher: Vec<String>,
}

impl ProcessEmulator {
    pub fn new(launcher: Vec<String>) -> Self {
        Self { launcher }
    }

    async fn control(&self, args: &[&str]) -> Result<()> {
        let output = self.spawn(args).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(HilError::Emulator(format!(
                "{} failed: {}",
                args.join(" "),
                stderr.trim()
            )));
        }
        Ok(())
    }

    async fn spawn(&self, args: &[&str]) -> Result<std::process::Output> {
        let exe = self
            .launcher
            .first()
            .ok_or_else(|| HilError::Emulator("empty launcher command".to_string()))?;

        debug!(launcher = %exe, ?args, "invoking emulator launcher");

        Command::new(exe)
            .args(&self.launcher[1..])
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| HilError::Emulator(format!("failed to run {exe}: {e}")))
    }
}

#[async_trait]
impl Emulator for ProcessEmulator {
    async fn install_package(&self, package: &str) -> Result<()> {
        self.control(&["install", package])
            .await
            .map_err(|e| HilError::Provisioning {
                package: package.to_string(),
                reason: e.to_string(),
            })
    }

    async fn attach_peripheral(&self, binding: &PeripheralBinding) -> Result<()> {
        let spec = binding.to_string();
        self.control(&["attach", &spec]).await
    }

    async fn mount_shared_dir(&self, host_path: &Path) -> Result<()> {
        let path = host_path.to_string_lossy();
        self.control(&["mount", &path])
            .await
            .map_err(|e| HilError::SharedDirectory(e.to_string()))
    }

    async fn exec(&self, command: &str) -> Result<i32> {
        let output = self.spawn(&["exec", "--", command]).await?;
        Ok(output.status.code().unwrap_or(-1))
    }

    async fn teardown(&self) -> Result<()> {
        self.control(&["teardown"]).await
    }
}
