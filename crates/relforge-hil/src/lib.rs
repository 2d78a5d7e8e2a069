//! relforge-hil - hardware-in-the-loop test orchestration
//!
//! Drives a declared test specification against an emulated machine:
//! - Provisions auxiliary runtime packages
//! - Attaches virtual peripherals (video capture, GPIO banks, I2C devices)
//!   in declared order before any command runs
//! - Binds a shared host directory into the emulated environment
//! - Executes the command sequence strictly in order, stop-on-first-failure

pub mod device;
pub mod emulator;
pub mod error;
pub mod fakes;
pub mod orchestrator;
pub mod spec;

// Re-export key types
pub use device::{DeviceDescriptor, PeripheralBinding};
pub use emulator::{Emulator, ProcessEmulator};
pub use error::{HilError, Result};
pub use orchestrator::{HilState, ProvisionMode, TestOrchestrator};
pub use spec::TestSpec;
