//! The test specification consumed by the orchestrator.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::device::DeviceDescriptor;
use crate::error::Result;

/// Declared inputs of one hardware-in-the-loop test run.
///
/// Command order is significant and preserved; every device is attached
/// before the first command executes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSpec {
    /// Host directory shared bidirectionally with the emulated environment.
    pub shared_dir: PathBuf,

    /// Ordered shell instructions run inside the emulated environment,
    /// stop-on-first-failure.
    pub commands: Vec<String>,

    /// Virtual peripherals to attach, in listed order.
    pub devices: Vec<DeviceDescriptor>,

    /// Auxiliary runtime packages (names or source URIs) to provision before
    /// any command runs.
    pub packages: Vec<String>,
}

impl TestSpec {
    /// Build a spec from the one-entry-per-line wire format of the pipeline
    /// inputs: one command per line, one device descriptor per line, one
    /// package identifier per line. Blank lines are skipped; order is kept.
    pub fn from_lines(
        shared_dir: impl Into<PathBuf>,
        commands: &str,
        devices: &str,
        packages: &str,
    ) -> Result<Self> {
        let devices = non_blank_lines(devices)
            .map(DeviceDescriptor::parse)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            shared_dir: shared_dir.into(),
            commands: non_blank_lines(commands).map(str::to_string).collect(),
            devices,
            packages: non_blank_lines(packages).map(str::to_string).collect(),
        })
    }
}

fn non_blank_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines().map(str::trim).filter(|l| !l.is_empty())
}
