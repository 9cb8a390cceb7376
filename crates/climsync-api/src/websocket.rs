//! WebSocket `state_changed` stream with auto-reconnect.
//!
//! Connects to Home Assistant's `/api/websocket` endpoint, performs the
//! token handshake, subscribes to `state_changed` events and streams them
//! through a [`tokio::sync::broadcast`] channel. Reconnection uses
//! exponential backoff + jitter; a rejected token stops the loop instead
//! of hammering the server.
//!
//! # Example
//!
//! ```rust,ignore
//! use climsync_api::websocket::{ReconnectConfig, WebSocketHandle};
//! use tokio_util::sync::CancellationToken;
//!
//! let cancel = CancellationToken::new();
//! let ws_url = client.websocket_url()?;
//!
//! let handle = WebSocketHandle::spawn(ws_url, token, ReconnectConfig::default(), cancel.clone());
//! let mut rx = handle.subscribe();
//!
//! while let Ok(event) = rx.recv().await {
//!     println!("{} -> {:?}", event.entity_id, event.new_state.as_ref().map(|s| &s.state));
//! }
//!
//! handle.shutdown();
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;
use crate::models::EntityState;

// ── Broadcast channel capacity ───────────────────────────────────────

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Message id used for the single `subscribe_events` command per connection.
const SUBSCRIBE_ID: u64 = 1;

/// Bound on the TCP/TLS connect and on each handshake reply.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

// ── StateChangedEvent ────────────────────────────────────────────────

/// A `state_changed` event for any entity.
#[derive(Debug, Clone, Deserialize)]
pub struct StateChangedEvent {
    pub entity_id: String,
    #[serde(default)]
    pub old_state: Option<EntityState>,
    #[serde(default)]
    pub new_state: Option<EntityState>,
    /// When Home Assistant fired the event (filled from the envelope).
    #[serde(skip)]
    pub time_fired: Option<DateTime<Utc>>,
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for WebSocket reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

// ── WebSocketHandle ──────────────────────────────────────────────────

/// Handle to a running `state_changed` stream.
///
/// Call [`shutdown`](Self::shutdown) to tear down the background task.
pub struct WebSocketHandle {
    event_rx: broadcast::Receiver<Arc<StateChangedEvent>>,
    cancel: CancellationToken,
}

impl WebSocketHandle {
    /// Spawn the connect/reconnect loop.
    ///
    /// Returns immediately; the first connection attempt happens
    /// asynchronously. Subscribe to start consuming events.
    pub fn spawn(
        ws_url: Url,
        token: SecretString,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
    ) -> Self {
        let (event_tx, event_rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            ws_loop(ws_url, token, event_tx, reconnect, task_cancel).await;
        });

        Self { event_rx, cancel }
    }

    /// Get a new broadcast receiver for the event stream.
    ///
    /// If a consumer falls behind, it receives
    /// [`broadcast::error::RecvError::Lagged`].
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<StateChangedEvent>> {
        self.event_rx.resubscribe()
    }

    /// Signal the background task to shut down gracefully.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// Main loop: connect → authenticate → subscribe → read → on error, backoff → reconnect.
async fn ws_loop(
    ws_url: Url,
    token: SecretString,
    event_tx: broadcast::Sender<Arc<StateChangedEvent>>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = connect_and_read(&ws_url, &token, &event_tx, &cancel) => {
                match result {
                    // Clean disconnect (server close frame or stream ended).
                    Ok(()) => {
                        if cancel.is_cancelled() {
                            break;
                        }
                        tracing::info!("WebSocket disconnected cleanly, reconnecting");
                        attempt = 0;
                    }
                    Err(e) if e.is_auth_error() => {
                        tracing::error!(error = %e, "WebSocket authentication rejected, giving up");
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, attempt, "WebSocket error");

                        if let Some(max) = reconnect.max_retries {
                            if attempt >= max {
                                tracing::error!(
                                    max_retries = max,
                                    "WebSocket reconnection limit reached, giving up"
                                );
                                break;
                            }
                        }

                        let delay = calculate_backoff(attempt, &reconnect);
                        tracing::info!(
                            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            attempt,
                            "Waiting before reconnect"
                        );

                        tokio::select! {
                            biased;
                            () = cancel.cancelled() => break,
                            () = tokio::time::sleep(delay) => {}
                        }

                        attempt = attempt.saturating_add(1);
                    }
                }
            }
        }
    }

    tracing::debug!("WebSocket loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Establish a single WebSocket connection and read events until it drops.
async fn connect_and_read(
    url: &Url,
    token: &SecretString,
    event_tx: &broadcast::Sender<Arc<StateChangedEvent>>,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    tracing::info!(url = %url, "Connecting to WebSocket");

    let (ws_stream, _response) =
        tokio::time::timeout(HANDSHAKE_TIMEOUT, tokio_tungstenite::connect_async(url.as_str()))
            .await
            .map_err(|_| handshake_timeout())?
            .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    let (mut write, mut read) = ws_stream.split();

    // ── Handshake: auth_required → auth → auth_ok ──
    match handshake_message(&mut read).await? {
        ServerMessage::AuthRequired { ha_version } => {
            tracing::debug!(?ha_version, "WebSocket auth required");
        }
        other => {
            return Err(Error::WebSocketConnect(format!(
                "expected auth_required, got {other:?}"
            )));
        }
    }

    let auth = serde_json::json!({
        "type": "auth",
        "access_token": token.expose_secret(),
    });
    write
        .send(tungstenite::Message::text(auth.to_string()))
        .await
        .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    match handshake_message(&mut read).await? {
        ServerMessage::AuthOk { .. } => tracing::info!("WebSocket authenticated"),
        ServerMessage::AuthInvalid { message } => {
            return Err(Error::Authentication {
                message: message.unwrap_or_else(|| "invalid access token".into()),
            });
        }
        other => {
            return Err(Error::WebSocketConnect(format!(
                "unexpected handshake reply {other:?}"
            )));
        }
    }

    let subscribe = serde_json::json!({
        "id": SUBSCRIBE_ID,
        "type": "subscribe_events",
        "event_type": "state_changed",
    });
    write
        .send(tungstenite::Message::text(subscribe.to_string()))
        .await
        .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(()),
            frame = read.next() => {
                match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        handle_text(&text, event_tx)?;
                    }
                    Some(Ok(tungstenite::Message::Ping(_))) => {
                        // tungstenite handles pong replies automatically
                        tracing::trace!("WebSocket ping");
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        if let Some(ref cf) = frame {
                            return Err(Error::WebSocketClosed {
                                code: u16::from(cf.code),
                                reason: cf.reason.to_string(),
                            });
                        }
                        tracing::info!("WebSocket close frame received (no payload)");
                        return Ok(());
                    }
                    Some(Err(e)) => {
                        return Err(Error::WebSocketConnect(e.to_string()));
                    }
                    None => {
                        tracing::info!("WebSocket stream ended");
                        return Ok(());
                    }
                    _ => {
                        // Binary, Pong, Frame -- ignore
                    }
                }
            }
        }
    }
}

/// [`next_server_message`] bounded by [`HANDSHAKE_TIMEOUT`], so a server
/// that accepts the connection and never speaks ends in a backoff.
async fn handshake_message<S>(read: &mut S) -> Result<ServerMessage, Error>
where
    S: futures_util::Stream<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
{
    tokio::time::timeout(HANDSHAKE_TIMEOUT, next_server_message(read))
        .await
        .map_err(|_| handshake_timeout())?
}

fn handshake_timeout() -> Error {
    Error::Timeout {
        timeout_secs: HANDSHAKE_TIMEOUT.as_secs(),
    }
}

/// Read frames until the next text frame and decode it.
async fn next_server_message<S>(read: &mut S) -> Result<ServerMessage, Error>
where
    S: futures_util::Stream<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
{
    loop {
        match read.next().await {
            Some(Ok(tungstenite::Message::Text(text))) => return parse_message(&text),
            Some(Ok(tungstenite::Message::Close(_))) | None => {
                return Err(Error::WebSocketConnect(
                    "connection closed during handshake".into(),
                ));
            }
            Some(Err(e)) => return Err(Error::WebSocketConnect(e.to_string())),
            Some(Ok(_)) => {}
        }
    }
}

// ── Message parsing ──────────────────────────────────────────────────

/// Server → client message envelope, discriminated by `type`.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerMessage {
    AuthRequired {
        #[serde(default)]
        ha_version: Option<String>,
    },
    AuthOk {
        #[serde(default)]
        #[allow(dead_code)]
        ha_version: Option<String>,
    },
    AuthInvalid {
        #[serde(default)]
        message: Option<String>,
    },
    Result {
        id: u64,
        success: bool,
        #[serde(default)]
        error: Option<CommandError>,
    },
    Event {
        id: u64,
        event: EventPayload,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct CommandError {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventPayload {
    event_type: String,
    data: serde_json::Value,
    #[serde(default)]
    time_fired: Option<DateTime<Utc>>,
}

fn parse_message(text: &str) -> Result<ServerMessage, Error> {
    serde_json::from_str(text).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body: text.to_owned(),
    })
}

/// Handle one text frame after the handshake.
///
/// Malformed frames are logged and skipped; a failed subscription is
/// fatal for this connection.
fn handle_text(
    text: &str,
    event_tx: &broadcast::Sender<Arc<StateChangedEvent>>,
) -> Result<(), Error> {
    let message = match parse_message(text) {
        Ok(m) => m,
        Err(e) => {
            tracing::debug!(error = %e, "Failed to parse WebSocket message");
            return Ok(());
        }
    };

    match message {
        ServerMessage::Result {
            id,
            success: false,
            error,
        } => Err(Error::WebSocketCommand {
            id,
            message: error
                .and_then(|e| e.message)
                .unwrap_or_else(|| "unknown error".into()),
        }),
        ServerMessage::Result { id, .. } => {
            tracing::debug!(id, "WebSocket subscription confirmed");
            Ok(())
        }
        ServerMessage::Event { event, .. } if event.event_type == "state_changed" => {
            match serde_json::from_value::<StateChangedEvent>(event.data) {
                Ok(mut evt) => {
                    evt.time_fired = event.time_fired;
                    // Ignore send errors -- just means no active subscribers right now
                    let _ = event_tx.send(Arc::new(evt));
                }
                Err(e) => tracing::debug!(error = %e, "Could not deserialize state_changed data"),
            }
            Ok(())
        }
        other => {
            tracing::trace!(?other, "Ignoring WebSocket message");
            Ok(())
        }
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) + jitter`
///
/// Jitter is +-25% to spread out reconnection storms from multiple clients.
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = i32::try_from(attempt.min(30)).unwrap_or(30);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic "jitter" seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────
