//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use climsync_config::ConfigError;
use climsync_core::CoreError;

/// Process exit codes. Success is 0.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
#[allow(unused_assignments)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to Home Assistant at {url}")]
    #[diagnostic(
        code(climsync::connection_failed),
        help(
            "Check that Home Assistant is running and reachable.\n\
             Reason: {reason}"
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(climsync::timeout),
        help("Increase homeassistant.timeout or check Home Assistant responsiveness.")
    )]
    Timeout { seconds: u64 },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(climsync::auth_failed),
        help(
            "Create a long-lived access token in your Home Assistant profile,\n\
             then run: climsync config set-token"
        )
    )]
    AuthFailed { message: String },

    #[error("No Home Assistant access token configured")]
    #[diagnostic(
        code(climsync::no_token),
        help(
            "Store one with: climsync config set-token\n\
             Or pass --token / set CLIMSYNC_TOKEN."
        )
    )]
    NoToken,

    // ── Devices & pairs ──────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(climsync::not_found),
        help("Run: climsync {list_command} to see what is available")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("Device {entity_id} unavailable: {reason}")]
    #[diagnostic(
        code(climsync::device_unavailable),
        help("Check the entity ID and that the device is online in Home Assistant.")
    )]
    DeviceUnavailable { entity_id: String, reason: String },

    #[error("Command {command} on {entity_id} failed: {reason}")]
    #[diagnostic(code(climsync::command_failed))]
    CommandFailed {
        entity_id: String,
        command: String,
        reason: String,
    },

    #[error("{failed} of {total} pair(s) failed to sync")]
    #[diagnostic(
        code(climsync::sync_failed),
        help("Re-run with -v for per-command detail.")
    )]
    SyncFailed { failed: usize, total: usize },

    // ── API ──────────────────────────────────────────────────────────
    #[error("API error: {message}")]
    #[diagnostic(code(climsync::api_error))]
    ApiError { message: String },

    // ── Validation & configuration ───────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(climsync::validation))]
    Validation { field: String, reason: String },

    #[error("Configuration file not found: {path}")]
    #[diagnostic(
        code(climsync::no_config),
        help("Create one with: climsync config init")
    )]
    NoConfig { path: String },

    #[error("Could not load configuration")]
    #[diagnostic(code(climsync::config))]
    Config(#[source] ConfigError),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render JSON: {0}")]
    #[diagnostic(code(climsync::json))]
    Json(#[from] serde_json::Error),

    #[error("Failed to render TOML: {0}")]
    #[diagnostic(code(climsync::toml))]
    Toml(#[from] toml::ser::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::AuthFailed { .. } | Self::NoToken => exit_code::AUTH,
            Self::NotFound { .. } | Self::DeviceUnavailable { .. } | Self::NoConfig { .. } => {
                exit_code::NOT_FOUND
            }
            Self::Validation { .. } => exit_code::USAGE,
            Self::Config(err) => {
                if matches!(err, ConfigError::Keyring(_)) {
                    exit_code::GENERAL
                } else {
                    exit_code::USAGE
                }
            }
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => Self::ConnectionFailed { url, reason },
            CoreError::AuthenticationFailed { message } => Self::AuthFailed { message },
            CoreError::Timeout { timeout_secs } => Self::Timeout {
                seconds: timeout_secs,
            },
            CoreError::DeviceUnavailable { entity_id, reason } => {
                Self::DeviceUnavailable { entity_id, reason }
            }
            CoreError::CommandFailed {
                entity_id,
                command,
                reason,
            } => Self::CommandFailed {
                entity_id,
                command,
                reason,
            },
            CoreError::InvalidConfiguration { message } => Self::Validation {
                field: "pairs".into(),
                reason: message,
            },
            CoreError::PairNotFound { name } => Self::NotFound {
                resource_type: "pair".into(),
                identifier: name,
                list_command: "pairs".into(),
            },
            CoreError::Api { message, status } => Self::ApiError {
                message: match status {
                    Some(code) => format!("{message} (HTTP {code})"),
                    None => message,
                },
            },
            CoreError::Internal(message) => Self::ApiError { message },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::NoToken => Self::NoToken,
            ConfigError::NotFound { path } => Self::NoConfig {
                path: path.display().to_string(),
            },
            ConfigError::Io(e) => Self::Io(e),
            other => Self::Config(other),
        }
    }
}
