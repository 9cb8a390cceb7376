// Home Assistant wire types
//
// Raw shapes returned by `/api/states/*` and carried inside WebSocket
// `state_changed` events. Attribute maps stay loosely typed here; the
// climate subset is pulled out on demand via `climate_attributes()`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;

/// A single entity state object, as served by `GET /api/states/{entity_id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityState {
    pub entity_id: String,
    /// Primary state string. For climate entities this is the HVAC mode
    /// (`heat`, `cool`, `heat_cool`, ...), or `unavailable` / `unknown`.
    pub state: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default)]
    pub last_changed: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

impl EntityState {
    /// `true` when Home Assistant has no usable state for the entity.
    pub fn is_unavailable(&self) -> bool {
        matches!(self.state.as_str(), "unavailable" | "unknown")
    }

    /// Decode the climate-platform attribute subset.
    pub fn climate_attributes(&self) -> Result<ClimateAttributes, Error> {
        serde_json::from_value(Value::Object(self.attributes.clone())).map_err(|e| {
            Error::Deserialization {
                message: format!("climate attributes of {}: {e}", self.entity_id),
                body: Value::Object(self.attributes.clone()).to_string(),
            }
        })
    }
}

/// Attributes exposed by entities of the `climate` platform.
///
/// Every field is optional: integrations report only what the device
/// supports, and several report explicit `null`s.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClimateAttributes {
    #[serde(default)]
    pub hvac_action: Option<String>,
    #[serde(default)]
    pub hvac_modes: Option<Vec<String>>,
    #[serde(default)]
    pub current_temperature: Option<f64>,
    /// Single setpoint (heat / cool modes).
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub target_temp_low: Option<f64>,
    #[serde(default)]
    pub target_temp_high: Option<f64>,
    #[serde(default)]
    pub min_temp: Option<f64>,
    #[serde(default)]
    pub max_temp: Option<f64>,
    #[serde(default)]
    pub fan_mode: Option<String>,
    #[serde(default)]
    pub fan_modes: Option<Vec<String>>,
    #[serde(default)]
    pub swing_mode: Option<String>,
    #[serde(default)]
    pub swing_modes: Option<Vec<String>>,
    #[serde(default)]
    pub supported_features: Option<u32>,
}

/// Body for `climate.set_temperature`.
///
/// Either `temperature` or the low/high pair is sent, never both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemperatureTarget {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_temp_low: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_temp_high: Option<f64>,
}

/// Response body of `GET /api/`.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiStatus {
    pub message: String,
}
