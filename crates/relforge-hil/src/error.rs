//! Error types for hardware-in-the-loop testing.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HilError {
    #[error("unknown device type: {0}")]
    UnknownDevice(String),

    #[error("device {device}: {reason}")]
    InvalidDeviceParams { device: String, reason: String },

    #[error("empty device descriptor")]
    EmptyDescriptor,

    #[error("package provisioning failed for {package}: {reason}")]
    Provisioning { package: String, reason: String },

    #[error("emulator error: {0}")]
    Emulator(String),

    #[error("shared directory error: {0}")]
    SharedDirectory(String),
}

/// Result type for HIL operations.
pub type Result<T> = std::result::Result<T, HilError>;
