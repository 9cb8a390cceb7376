// ── Device commands ──
//
// Every write the engine makes to a target flows through `DeviceCommand`.
// The proxy turns each variant into exactly one acknowledged call.

use std::fmt;

use serde::Serialize;

use crate::model::HvacMode;

/// Temperature setpoint(s) to command.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Setpoint {
    /// Single target (heat / cool).
    Single { temperature: f64 },
    /// Heat/cool range; either bound may be absent when the source
    /// reports only one of them.
    Range {
        low: Option<f64>,
        high: Option<f64>,
    },
}

/// One write against a target device.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", content = "value", rename_all = "snake_case")]
pub enum DeviceCommand {
    SetHvacMode(HvacMode),
    SetTemperature(Setpoint),
    SetFanMode(String),
    SetSwingMode(String),
}

impl DeviceCommand {
    /// Short attribute name, used in logs and errors.
    pub fn attribute(&self) -> &'static str {
        match self {
            Self::SetHvacMode(_) => "hvac_mode",
            Self::SetTemperature(_) => "temperature",
            Self::SetFanMode(_) => "fan_mode",
            Self::SetSwingMode(_) => "swing_mode",
        }
    }
}

impl fmt::Display for Setpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single { temperature } => write!(f, "{temperature}"),
            Self::Range { low, high } => {
                let bound = |v: &Option<f64>| v.map_or_else(|| "-".to_owned(), |t| t.to_string());
                write!(f, "{}..{}", bound(low), bound(high))
            }
        }
    }
}

impl fmt::Display for DeviceCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetHvacMode(mode) => write!(f, "hvac_mode={mode}"),
            Self::SetTemperature(setpoint) => write!(f, "temperature={setpoint}"),
            Self::SetFanMode(fan) => write!(f, "fan_mode={fan}"),
            Self::SetSwingMode(swing) => write!(f, "swing_mode={swing}"),
        }
    }
}
