//! Configuration for climsync.
//!
//! TOML file + `CLIMSYNC_*` environment overrides, access-token resolution
//! (env → keyring → plaintext), and translation to
//! `climsync_core::ControllerConfig`. The CLI adds flag-aware wrappers on top.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use climsync_core::{
    ControllerConfig, CoreError, EntityId, HassConfig, PairConfig, SyncOptions, TlsVerification,
};

/// Keyring service name for the access token.
pub const KEYRING_SERVICE: &str = "climsync";
/// Keyring user name for the access token.
pub const KEYRING_USER: &str = "homeassistant/token";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no Home Assistant access token configured")]
    NoToken,

    #[error("config file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl From<CoreError> for ConfigError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidConfiguration { message } => Self::Validation {
                field: "pairs".into(),
                reason: message,
            },
            other => Self::Validation {
                field: "config".into(),
                reason: other.to_string(),
            },
        }
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub homeassistant: HomeAssistant,

    /// Options applied to every pair unless overridden.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named source → target pairs.
    #[serde(default)]
    pub pairs: BTreeMap<String, PairEntry>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HomeAssistant {
    /// Base URL (e.g., "http://homeassistant.local:8123").
    #[serde(default = "default_url")]
    pub url: String,

    /// Access token (plaintext; prefer keyring or env var).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Environment variable name containing the access token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_env: Option<String>,

    /// Path to custom CA certificate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<PathBuf>,

    #[serde(default)]
    pub insecure: bool,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Subscribe to state changes over the WebSocket API.
    #[serde(default = "default_true")]
    pub websocket: bool,
}

impl Default for HomeAssistant {
    fn default() -> Self {
        Self {
            url: default_url(),
            token: None,
            token_env: None,
            ca_cert: None,
            insecure: false,
            timeout: default_timeout(),
            websocket: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_true")]
    pub offset_enabled: bool,

    #[serde(default = "default_sensitivity")]
    pub offset_sensitivity: f64,

    #[serde(default = "default_true")]
    pub boost_enabled: bool,

    /// Minutes between full resyncs. 0 disables.
    #[serde(default = "default_resync_interval")]
    pub resync_interval: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            offset_enabled: true,
            offset_sensitivity: default_sensitivity(),
            boost_enabled: true,
            resync_interval: default_resync_interval(),
        }
    }
}

/// One `[pairs.<name>]` table. Unset options fall back to `[defaults]`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PairEntry {
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset_sensitivity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boost_enabled: Option<bool>,
}

fn default_url() -> String {
    "http://homeassistant.local:8123".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_true() -> bool {
    true
}
fn default_sensitivity() -> f64 {
    1.0
}
fn default_resync_interval() -> u64 {
    5
}

impl Config {
    /// Effective pair configurations, sorted by name. Not yet validated.
    pub fn pair_configs(&self) -> Vec<PairConfig> {
        self.pairs
            .iter()
            .map(|(name, entry)| PairConfig {
                name: name.clone(),
                source: EntityId::from(entry.source.as_str()),
                target: EntityId::from(entry.target.as_str()),
                options: SyncOptions {
                    offset_enabled: entry.offset_enabled.unwrap_or(self.defaults.offset_enabled),
                    offset_sensitivity: entry
                        .offset_sensitivity
                        .unwrap_or(self.defaults.offset_sensitivity),
                    boost_enabled: entry.boost_enabled.unwrap_or(self.defaults.boost_enabled),
                },
            })
            .collect()
    }

    /// Validated pair configurations.
    pub fn validated_pairs(&self) -> Result<Vec<PairConfig>, ConfigError> {
        let pairs = self.pair_configs();
        climsync_core::config::validate_pairs(&pairs)?;
        Ok(pairs)
    }

    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.defaults.resync_interval.saturating_mul(60))
    }

    /// Connection settings alone, for commands that never touch pairs.
    pub fn to_hass_config(&self, token: SecretString) -> Result<HassConfig, ConfigError> {
        let ha = &self.homeassistant;
        let url: url::Url = ha.url.parse().map_err(|_| ConfigError::Validation {
            field: "homeassistant.url".into(),
            reason: format!("invalid URL: {}", ha.url),
        })?;

        let tls = if ha.insecure {
            TlsVerification::DangerAcceptInvalid
        } else if let Some(ref ca_path) = ha.ca_cert {
            TlsVerification::CustomCa(ca_path.clone())
        } else {
            TlsVerification::SystemDefaults
        };

        Ok(HassConfig {
            url,
            token,
            tls,
            timeout: Duration::from_secs(ha.timeout),
            websocket_enabled: ha.websocket,
        })
    }

    /// Build the runtime config. `token` comes from [`resolve_token`] or a
    /// CLI flag.
    pub fn to_controller_config(&self, token: SecretString) -> Result<ControllerConfig, ConfigError> {
        Ok(ControllerConfig {
            hass: self.to_hass_config(token)?,
            pairs: self.validated_pairs()?,
            resync_interval: self.resync_interval(),
        })
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("", "climsync", "climsync").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("climsync");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load config from the canonical path (if present) + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    extract(&config_path())
}

/// Load config from an explicit file, which must exist.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    extract(path)
}

fn extract(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading config");
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("CLIMSYNC_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Token resolution (without CLI flags) ────────────────────────────

/// Resolve the access token: `token_env` → system keyring → plaintext.
pub fn resolve_token(ha: &HomeAssistant) -> Result<SecretString, ConfigError> {
    let from_env = ha
        .token_env
        .as_deref()
        .and_then(|name| std::env::var(name).ok());

    // Skip the keyring lookup when the env var already answered.
    let from_keyring = if from_env.is_some() {
        None
    } else {
        keyring::Entry::new(KEYRING_SERVICE, KEYRING_USER)
            .and_then(|entry| entry.get_password())
            .ok()
    };

    pick_token(ha, from_env, from_keyring)
}

/// Store the access token in the system keyring.
pub fn store_token(token: &str) -> Result<(), ConfigError> {
    keyring::Entry::new(KEYRING_SERVICE, KEYRING_USER)?.set_password(token)?;
    Ok(())
}

fn pick_token(
    ha: &HomeAssistant,
    from_env: Option<String>,
    from_keyring: Option<String>,
) -> Result<SecretString, ConfigError> {
    from_env
        .or(from_keyring)
        .or_else(|| ha.token.clone())
        .filter(|t| !t.trim().is_empty())
        .map(SecretString::from)
        .ok_or(ConfigError::NoToken)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn token_chain_prefers_env_then_keyring_then_plaintext() {
        let ha = HomeAssistant {
            token: Some("plain".into()),
            ..HomeAssistant::default()
        };

        let t = pick_token(&ha, Some("env".into()), Some("ring".into())).unwrap();
        assert_eq!(t.expose_secret(), "env");

        let t = pick_token(&ha, None, Some("ring".into())).unwrap();
        assert_eq!(t.expose_secret(), "ring");

        let t = pick_token(&ha, None, None).unwrap();
        assert_eq!(t.expose_secret(), "plain");
    }

    #[test]
    fn missing_token_is_an_error() {
        let ha = HomeAssistant::default();
        assert!(matches!(pick_token(&ha, None, None), Err(ConfigError::NoToken)));

        let blank = HomeAssistant {
            token: Some("   ".into()),
            ..HomeAssistant::default()
        };
        assert!(matches!(pick_token(&blank, None, None), Err(ConfigError::NoToken)));
    }

    #[test]
    fn resync_interval_is_minutes() {
        let mut cfg = Config::default();
        assert_eq!(cfg.resync_interval(), Duration::from_secs(300));

        cfg.defaults.resync_interval = 0;
        assert!(cfg.resync_interval().is_zero());
    }
}
