// ── Runtime configuration ──
//
// These types describe *what* to synchronize and *how* to reach Home
// Assistant. They carry the access token but never touch disk; the CLI
// builds a `ControllerConfig` through climsync-config and hands it in.

use std::collections::HashSet;
use std::ops::RangeInclusive;
use std::time::Duration;

use secrecy::SecretString;
use serde::Serialize;
use url::Url;

use crate::error::CoreError;
use crate::model::EntityId;

/// Accepted values for [`SyncOptions::offset_sensitivity`].
pub const SENSITIVITY_RANGE: RangeInclusive<f64> = 0.1..=5.0;

/// Per-pair behaviour switches. Replaced wholesale on reload, never patched.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SyncOptions {
    pub offset_enabled: bool,
    pub offset_sensitivity: f64,
    pub boost_enabled: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            offset_enabled: true,
            offset_sensitivity: 1.0,
            boost_enabled: true,
        }
    }
}

/// One source → target pair, identified by a unique name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairConfig {
    pub name: String,
    pub source: EntityId,
    pub target: EntityId,
    pub options: SyncOptions,
}

impl PairConfig {
    pub fn new(name: impl Into<String>, source: impl Into<EntityId>, target: impl Into<EntityId>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            target: target.into(),
            options: SyncOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    /// Reject pairs the engine must never see.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.name.trim().is_empty() {
            return Err(CoreError::invalid_config("pair name must not be empty"));
        }
        if self.source.is_empty() || self.target.is_empty() {
            return Err(CoreError::invalid_config(format!(
                "pair '{}': source and target entity ids are required",
                self.name
            )));
        }
        if self.source == self.target {
            return Err(CoreError::invalid_config(format!(
                "pair '{}': source and target must differ (both are {})",
                self.name, self.source
            )));
        }
        let sensitivity = self.options.offset_sensitivity;
        if !SENSITIVITY_RANGE.contains(&sensitivity) {
            return Err(CoreError::invalid_config(format!(
                "pair '{}': offset_sensitivity {sensitivity} outside {}..={}",
                self.name,
                SENSITIVITY_RANGE.start(),
                SENSITIVITY_RANGE.end()
            )));
        }
        Ok(())
    }

    /// `true` if switching to `other` must reset boost state.
    pub fn devices_differ(&self, other: &PairConfig) -> bool {
        self.source != other.source || self.target != other.target
    }
}

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(std::path::PathBuf),
    /// Skip verification (self-signed certs).
    DangerAcceptInvalid,
}

/// How to reach Home Assistant.
#[derive(Debug, Clone)]
pub struct HassConfig {
    /// Base URL (e.g., `http://homeassistant.local:8123`).
    pub url: Url,
    /// Long-lived access token.
    pub token: SecretString,
    pub tls: TlsVerification,
    /// Per-request timeout. Bounds every command acknowledgement.
    pub timeout: Duration,
    /// Subscribe to `state_changed` over the WebSocket API.
    pub websocket_enabled: bool,
}

/// Everything a running controller needs.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub hass: HassConfig,
    pub pairs: Vec<PairConfig>,
    /// Periodic resync of every pair. Zero disables it.
    pub resync_interval: Duration,
}

impl ControllerConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_pairs(&self.pairs)
    }
}

/// Validate each pair and check that names are unique.
pub fn validate_pairs(pairs: &[PairConfig]) -> Result<(), CoreError> {
    let mut seen = HashSet::new();
    for pair in pairs {
        pair.validate()?;
        if !seen.insert(pair.name.as_str()) {
            return Err(CoreError::invalid_config(format!(
                "duplicate pair name '{}'",
                pair.name
            )));
        }
    }
    Ok(())
}
