//! CLI configuration: thin wrapper around `climsync_config`.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides
//! (--config, --url, --token).

use std::path::PathBuf;

use secrecy::SecretString;

use climsync_core::{ControllerConfig, HassConfig};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use climsync_config::{Config, HomeAssistant, PairEntry};

/// The file `--config` names, or the platform default.
pub fn active_path(global: &GlobalOpts) -> PathBuf {
    global.config.clone().unwrap_or_else(climsync_config::config_path)
}

/// Load the config file plus `CLIMSYNC_*` overrides, then apply `--url`.
///
/// An explicit `--config` file must exist; the default path may be absent.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    let mut cfg = match global.config {
        Some(ref path) => climsync_config::load_config_from(path)?,
        None => climsync_config::load_config()?,
    };
    if let Some(ref url) = global.url {
        cfg.homeassistant.url.clone_from(url);
    }
    Ok(cfg)
}

/// `--token` first, then the shared env → keyring → plaintext chain.
pub fn resolve_token(global: &GlobalOpts, cfg: &Config) -> Result<SecretString, CliError> {
    if let Some(ref token) = global.token {
        if !token.trim().is_empty() {
            return Ok(SecretString::from(token.clone()));
        }
    }
    Ok(climsync_config::resolve_token(&cfg.homeassistant)?)
}

pub fn controller_config(global: &GlobalOpts, cfg: &Config) -> Result<ControllerConfig, CliError> {
    // Pair errors are usage errors; report them before asking for a token.
    cfg.validated_pairs()?;
    let token = resolve_token(global, cfg)?;
    Ok(cfg.to_controller_config(token)?)
}

pub fn hass_config(global: &GlobalOpts, cfg: &Config) -> Result<HassConfig, CliError> {
    let token = resolve_token(global, cfg)?;
    Ok(cfg.to_hass_config(token)?)
}
