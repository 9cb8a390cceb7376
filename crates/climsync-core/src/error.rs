// ── Core error types ──
//
// Reconciliation-level errors. Consumers never see HTTP status codes or
// JSON parse failures directly: the proxy adapter attaches the entity and
// command to every device failure, and the `From<climsync_api::Error>` impl
// translates the remaining transport errors into domain variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to Home Assistant at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Home Assistant request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Reconciliation errors ────────────────────────────────────────
    /// A source or target snapshot could not be fetched. The cycle aborts
    /// before any command is issued.
    #[error("Device {entity_id} unavailable: {reason}")]
    DeviceUnavailable { entity_id: String, reason: String },

    /// A command was rejected or timed out. Earlier commands of the same
    /// cycle stay applied.
    #[error("Command {command} on {entity_id} failed: {reason}")]
    CommandFailed {
        entity_id: String,
        command: String,
        reason: String,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    #[error("Sync pair not found: {name}")]
    PairNotFound { name: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub(crate) fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            message: message.into(),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<climsync_api::Error> for CoreError {
    fn from(err: climsync_api::Error) -> Self {
        match err {
            climsync_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            climsync_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map(ToString::to_string)
                            .unwrap_or_else(|| "<unknown>".into()),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            climsync_api::Error::InvalidUrl(e) => CoreError::InvalidConfiguration {
                message: format!("Invalid URL: {e}"),
            },
            climsync_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            climsync_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            climsync_api::Error::NotFound { path } => CoreError::Api {
                message: format!("Not found: {path}"),
                status: Some(404),
            },
            climsync_api::Error::Http { status, message } => CoreError::Api {
                message,
                status: Some(status),
            },
            climsync_api::Error::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket connection failed: {reason}"),
            },
            climsync_api::Error::WebSocketClosed { code, reason } => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket closed (code {code}): {reason}"),
            },
            climsync_api::Error::WebSocketCommand { id, message } => CoreError::Api {
                message: format!("WebSocket command {id} failed: {message}"),
                status: None,
            },
            climsync_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}
