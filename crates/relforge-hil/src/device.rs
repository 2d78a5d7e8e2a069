//! Virtual peripheral descriptors and their resolution.

use serde::{Deserialize, Serialize};

use crate::error::{HilError, Result};

/// A declared virtual peripheral: a device type name plus zero or more
/// positional parameters, as written in the test spec (one per line).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub name: String,
    pub params: Vec<String>,
}

impl DeviceDescriptor {
    /// Parse a `"<name> [param...]"` line.
    pub fn parse(line: &str) -> Result<Self> {
        let mut parts = line.split_whitespace();
        let name = parts.next().ok_or(HilError::EmptyDescriptor)?;
        Ok(Self {
            name: name.to_string(),
            params: parts.map(str::to_string).collect(),
        })
    }

    /// Resolve the descriptor to a concrete peripheral binding, validating
    /// parameter counts and ranges. Resolution happens before the emulator is
    /// touched so a bad descriptor never leaves a half-attached device set.
    pub fn resolve(&self) -> Result<PeripheralBinding> {
        match self.name.as_str() {
            "vivid" => {
                if !self.params.is_empty() {
                    return Err(HilError::InvalidDeviceParams {
                        device: self.name.clone(),
                        reason: "vivid takes no parameters".to_string(),
                    });
                }
                Ok(PeripheralBinding::VideoCapture)
            }
            "gpio" => {
                let lines = self
                    .params
                    .first()
                    .ok_or_else(|| HilError::InvalidDeviceParams {
                        device: self.name.clone(),
                        reason: "gpio requires a line count".to_string(),
                    })?
                    .parse::<u32>()
                    .map_err(|_| HilError::InvalidDeviceParams {
                        device: self.name.clone(),
                        reason: format!("invalid line count: {:?}", self.params[0]),
                    })?;
                if lines == 0 {
                    return Err(HilError::InvalidDeviceParams {
                        device: self.name.clone(),
                        reason: "gpio line count must be positive".to_string(),
                    });
                }
                Ok(PeripheralBinding::GpioBank { lines })
            }
            "i2c" => {
                let raw = self
                    .params
                    .first()
                    .ok_or_else(|| HilError::InvalidDeviceParams {
                        device: self.name.clone(),
                        reason: "i2c requires a bus address".to_string(),
                    })?;
                let address = parse_address(raw).ok_or_else(|| {
                    HilError::InvalidDeviceParams {
                        device: self.name.clone(),
                        reason: format!("invalid bus address: {raw:?}"),
                    }
                })?;
                // Reserved 7-bit address ranges are rejected.
                if !(0x08..=0x77).contains(&address) {
                    return Err(HilError::InvalidDeviceParams {
                        device: self.name.clone(),
                        reason: format!("address {address:#04x} outside 0x08..=0x77"),
                    });
                }
                Ok(PeripheralBinding::I2cDevice { address })
            }
            other => Err(HilError::UnknownDevice(other.to_string())),
        }
    }
}

fn parse_address(raw: &str) -> Option<u8> {
    if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        u8::from_str_radix(hex, 16).ok()
    } else {
        raw.parse::<u8>().ok()
    }
}

/// A descriptor resolved to a concrete virtual peripheral to attach.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PeripheralBinding {
    /// Virtual video-capture device.
    VideoCapture,

    /// GPIO bank with a declared number of lines.
    GpioBank { lines: u32 },

    /// I2C device at a declared 7-bit bus address.
    I2cDevice { address: u8 },
}

impl std::fmt::Display for PeripheralBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PeripheralBinding::VideoCapture => write!(f, "vivid"),
            PeripheralBinding::GpioBank { lines } => write!(f, "gpio({lines})"),
            PeripheralBinding::I2cDevice { address } => write!(f, "i2c({address:#04x})"),
        }
    }
}
