// ── Climate domain types ──

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::entity_id::EntityId;

/// Target range reported when the device does not expose `min_temp` / `max_temp`.
pub const DEFAULT_MIN_TEMP: f64 = 16.0;
pub const DEFAULT_MAX_TEMP: f64 = 30.0;

/// Configured operating mode (intent).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum HvacMode {
    Off,
    Heat,
    Cool,
    HeatCool,
    Auto,
    Dry,
    FanOnly,
}

/// What the device is actually doing right now.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum HvacAction {
    Off,
    Preheating,
    Heating,
    Cooling,
    Drying,
    Fan,
    Idle,
    Defrosting,
}

impl HvacAction {
    /// `true` only while the compressor/burner is running.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Heating | Self::Cooling)
    }
}

/// `supported_features` bit set of a climate entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SupportedFeatures(pub u32);

impl SupportedFeatures {
    pub const TARGET_TEMPERATURE: u32 = 1;
    pub const TARGET_TEMPERATURE_RANGE: u32 = 2;
    pub const FAN_MODE: u32 = 8;
    pub const SWING_MODE: u32 = 32;

    pub fn contains(self, flag: u32) -> bool {
        self.0 & flag == flag
    }
}

/// Point-in-time view of one device, re-read every cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    pub entity_id: EntityId,
    pub mode: HvacMode,
    pub hvac_action: Option<HvacAction>,
    pub current_temperature: Option<f64>,
    /// Single setpoint (heat / cool).
    pub target_temperature: Option<f64>,
    pub target_temp_low: Option<f64>,
    pub target_temp_high: Option<f64>,
    pub min_temp: Option<f64>,
    pub max_temp: Option<f64>,
    pub fan_mode: Option<String>,
    /// In the order the device reports them.
    pub fan_modes: Vec<String>,
    pub swing_mode: Option<String>,
    pub swing_modes: Vec<String>,
    pub supported_features: SupportedFeatures,
}

impl DeviceSnapshot {
    /// An otherwise empty snapshot in the given mode.
    pub fn new(entity_id: impl Into<EntityId>, mode: HvacMode) -> Self {
        Self {
            entity_id: entity_id.into(),
            mode,
            hvac_action: None,
            current_temperature: None,
            target_temperature: None,
            target_temp_low: None,
            target_temp_high: None,
            min_temp: None,
            max_temp: None,
            fan_mode: None,
            fan_modes: Vec::new(),
            swing_mode: None,
            swing_modes: Vec::new(),
            supported_features: SupportedFeatures::default(),
        }
    }

    /// Settable temperature range, falling back to 16–30 when unreported.
    pub fn temperature_range(&self) -> (f64, f64) {
        (
            self.min_temp.unwrap_or(DEFAULT_MIN_TEMP),
            self.max_temp.unwrap_or(DEFAULT_MAX_TEMP),
        )
    }

    pub fn supports_fan_mode(&self, fan_mode: &str) -> bool {
        self.fan_modes.iter().any(|m| m == fan_mode)
    }

    pub fn supports_swing(&self) -> bool {
        self.supported_features.contains(SupportedFeatures::SWING_MODE)
            || !self.swing_modes.is_empty()
    }

    pub fn supports_swing_mode(&self, swing_mode: &str) -> bool {
        self.swing_modes.iter().any(|m| m == swing_mode)
    }
}
