// ── Home Assistant device proxy ──
//
// `DeviceProxy` over the REST API for reads and service calls, with an
// optional WebSocket bridge that turns `state_changed` events into
// `StateChange` notifications.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use climsync_api::transport::{TlsMode, TransportConfig};
use climsync_api::websocket::{ReconnectConfig, StateChangedEvent, WebSocketHandle};
use climsync_api::{EntityState, HassClient, TemperatureTarget};

use crate::command::{DeviceCommand, Setpoint};
use crate::config::{HassConfig, TlsVerification};
use crate::error::CoreError;
use crate::model::{DeviceSnapshot, EntityId, HvacMode, StateChange, SupportedFeatures};
use crate::proxy::DeviceProxy;

const EVENT_CHANNEL_SIZE: usize = 256;

/// [`DeviceProxy`] backed by a Home Assistant instance.
pub struct HassProxy {
    client: HassClient,
    event_tx: broadcast::Sender<Arc<StateChange>>,
    cancel: CancellationToken,
    ws_handle: Option<WebSocketHandle>,
}

impl HassProxy {
    /// Build the REST client and verify the token with `GET /api/`.
    ///
    /// When `config.websocket_enabled` is set, also spawns the event
    /// stream. The stream stops when `cancel` fires.
    pub async fn connect(config: &HassConfig, cancel: CancellationToken) -> Result<Self, CoreError> {
        let transport = build_transport(config);
        let client = HassClient::new(config.url.clone(), &config.token, &transport)?;

        let message = client.check_api().await?;
        info!(url = %config.url, %message, "connected to Home Assistant");

        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        let mut proxy = Self {
            client,
            event_tx,
            cancel,
            ws_handle: None,
        };

        if config.websocket_enabled {
            proxy.spawn_event_stream(config)?;
        } else {
            debug!("WebSocket disabled, relying on periodic resync");
        }

        Ok(proxy)
    }

    pub fn client(&self) -> &HassClient {
        &self.client
    }

    /// Stop the event stream.
    pub fn shutdown(&self) {
        if let Some(ws) = &self.ws_handle {
            ws.shutdown();
        }
        self.cancel.cancel();
    }

    fn spawn_event_stream(&mut self, config: &HassConfig) -> Result<(), CoreError> {
        let ws_url = self.client.websocket_url()?;
        let ws_cancel = self.cancel.child_token();
        let handle = WebSocketHandle::spawn(
            ws_url,
            config.token.clone(),
            ReconnectConfig::default(),
            ws_cancel.clone(),
        );

        let mut ws_rx = handle.subscribe();
        let event_tx = self.event_tx.clone();

        // Bridge task: raw state_changed events → StateChange notifications.
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    () = ws_cancel.cancelled() => break,
                    result = ws_rx.recv() => {
                        match result {
                            Ok(event) => {
                                let _ = event_tx.send(Arc::new(state_change_from_event(&event)));
                            }
                            Err(broadcast::error::RecvError::Lagged(n)) => {
                                warn!(skipped = n, "state_changed consumer lagged");
                            }
                            Err(broadcast::error::RecvError::Closed) => break,
                        }
                    }
                }
            }
            debug!("state_changed bridge exiting");
        });

        self.ws_handle = Some(handle);
        info!("state_changed stream spawned (handshake in progress)");
        Ok(())
    }
}

#[async_trait]
impl DeviceProxy for HassProxy {
    async fn snapshot(&self, entity_id: &EntityId) -> Result<DeviceSnapshot, CoreError> {
        let state = self
            .client
            .get_state(entity_id.as_str())
            .await
            .map_err(|e| read_error(entity_id, e))?;
        snapshot_from_state(&state)
    }

    async fn command(
        &self,
        entity_id: &EntityId,
        command: &DeviceCommand,
    ) -> Result<(), CoreError> {
        let id = entity_id.as_str();
        let result = match command {
            DeviceCommand::SetHvacMode(mode) => {
                self.client.set_hvac_mode(id, &mode.to_string()).await
            }
            DeviceCommand::SetTemperature(setpoint) => {
                self.client
                    .set_temperature(id, &temperature_target(*setpoint))
                    .await
            }
            DeviceCommand::SetFanMode(fan) => self.client.set_fan_mode(id, fan).await,
            DeviceCommand::SetSwingMode(swing) => self.client.set_swing_mode(id, swing).await,
        };

        result.map_err(|e| CoreError::CommandFailed {
            entity_id: entity_id.to_string(),
            command: command.to_string(),
            reason: e.to_string(),
        })
    }

    fn subscribe(&self) -> broadcast::Receiver<Arc<StateChange>> {
        self.event_tx.subscribe()
    }
}

// ── Conversion ───────────────────────────────────────────────────────

/// Map a raw entity state onto a [`DeviceSnapshot`].
///
/// An entity whose state is `unavailable`, `unknown` or not an HVAC mode
/// is reported as [`CoreError::DeviceUnavailable`].
pub fn snapshot_from_state(state: &EntityState) -> Result<DeviceSnapshot, CoreError> {
    let unavailable = |reason: String| CoreError::DeviceUnavailable {
        entity_id: state.entity_id.clone(),
        reason,
    };

    if state.is_unavailable() {
        return Err(unavailable(format!("state is '{}'", state.state)));
    }
    let mode: HvacMode = state
        .state
        .parse()
        .map_err(|_| unavailable(format!("'{}' is not an HVAC mode", state.state)))?;
    let attrs = state
        .climate_attributes()
        .map_err(|e| unavailable(e.to_string()))?;

    Ok(DeviceSnapshot {
        entity_id: EntityId::from(state.entity_id.clone()),
        mode,
        hvac_action: attrs.hvac_action.as_deref().and_then(|a| a.parse().ok()),
        current_temperature: attrs.current_temperature,
        target_temperature: attrs.temperature,
        target_temp_low: attrs.target_temp_low,
        target_temp_high: attrs.target_temp_high,
        min_temp: attrs.min_temp,
        max_temp: attrs.max_temp,
        fan_mode: attrs.fan_mode,
        fan_modes: attrs.fan_modes.unwrap_or_default(),
        swing_mode: attrs.swing_mode,
        swing_modes: attrs.swing_modes.unwrap_or_default(),
        supported_features: SupportedFeatures(attrs.supported_features.unwrap_or_default()),
    })
}

pub fn state_change_from_event(event: &StateChangedEvent) -> StateChange {
    let hvac_action = event
        .new_state
        .as_ref()
        .and_then(|s| s.attributes.get("hvac_action"))
        .and_then(serde_json::Value::as_str)
        .and_then(|a| a.parse().ok());

    StateChange {
        entity_id: EntityId::from(event.entity_id.clone()),
        new_state: event.new_state.as_ref().map(|s| s.state.clone()),
        old_state: event.old_state.as_ref().map(|s| s.state.clone()),
        hvac_action,
        changed_at: event
            .new_state
            .as_ref()
            .and_then(|s| s.last_changed)
            .or(event.time_fired),
    }
}

fn temperature_target(setpoint: Setpoint) -> TemperatureTarget {
    match setpoint {
        Setpoint::Single { temperature } => TemperatureTarget {
            temperature: Some(temperature),
            ..TemperatureTarget::default()
        },
        Setpoint::Range { low, high } => TemperatureTarget {
            temperature: None,
            target_temp_low: low,
            target_temp_high: high,
        },
    }
}

fn read_error(entity_id: &EntityId, err: climsync_api::Error) -> CoreError {
    if err.is_auth_error() {
        return err.into();
    }
    let reason = if err.is_not_found() {
        "entity does not exist".to_owned()
    } else {
        err.to_string()
    };
    CoreError::DeviceUnavailable {
        entity_id: entity_id.to_string(),
        reason,
    }
}

fn build_transport(config: &HassConfig) -> TransportConfig {
    TransportConfig {
        tls: tls_to_transport(&config.tls),
        timeout: config.timeout,
    }
}

fn tls_to_transport(tls: &TlsVerification) -> TlsMode {
    match tls {
        TlsVerification::SystemDefaults => TlsMode::System,
        TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
        TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
    }
}
