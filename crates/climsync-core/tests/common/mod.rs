#![allow(clippy::unwrap_used, dead_code)]
// In-memory DeviceProxy for engine and controller tests.
//
// Snapshots live in a map; acknowledged commands are recorded and applied
// to the stored target snapshot so later cycles see their effect.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{Notify, broadcast};

use climsync_core::model::DeviceSnapshot;
use climsync_core::{
    CoreError, DeviceCommand, DeviceProxy, EntityId, HvacAction, HvacMode, Setpoint, StateChange,
    SupportedFeatures,
};

pub const SOURCE: &str = "climate.ecobee";
pub const TARGET: &str = "climate.mini_split";

pub struct MockProxy {
    snapshots: Mutex<HashMap<EntityId, DeviceSnapshot>>,
    commands: Mutex<Vec<(EntityId, DeviceCommand)>>,
    fail_attribute: Mutex<Option<&'static str>>,
    /// Commands wait on this lock; a test holds it to stall a cycle.
    pub gate: tokio::sync::Mutex<()>,
    /// Signalled whenever a command call starts.
    pub command_started: Notify,
    events: broadcast::Sender<Arc<StateChange>>,
}

impl MockProxy {
    pub fn new() -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            snapshots: Mutex::new(HashMap::new()),
            commands: Mutex::new(Vec::new()),
            fail_attribute: Mutex::new(None),
            gate: tokio::sync::Mutex::new(()),
            command_started: Notify::new(),
            events,
        })
    }

    /// Proxy pre-loaded with the reference source/target pair.
    pub fn with_pair() -> Arc<Self> {
        let proxy = Self::new();
        proxy.put(source_snapshot(SOURCE, HvacAction::Idle));
        proxy.put(target_snapshot(TARGET));
        proxy
    }

    pub fn put(&self, snapshot: DeviceSnapshot) {
        self.snapshots
            .lock()
            .unwrap()
            .insert(snapshot.entity_id.clone(), snapshot);
    }

    pub fn remove(&self, entity_id: &str) {
        self.snapshots
            .lock()
            .unwrap()
            .remove(&EntityId::from(entity_id));
    }

    pub fn get(&self, entity_id: &str) -> DeviceSnapshot {
        self.snapshots.lock().unwrap()[&EntityId::from(entity_id)].clone()
    }

    pub fn update(&self, entity_id: &str, f: impl FnOnce(&mut DeviceSnapshot)) {
        let mut snapshots = self.snapshots.lock().unwrap();
        f(snapshots.get_mut(&EntityId::from(entity_id)).unwrap());
    }

    pub fn set_action(&self, entity_id: &str, action: HvacAction) {
        self.update(entity_id, |s| s.hvac_action = Some(action));
    }

    /// Reject every command for `attribute` (e.g. `"temperature"`).
    pub fn fail_on(&self, attribute: Option<&'static str>) {
        *self.fail_attribute.lock().unwrap() = attribute;
    }

    /// Commands acknowledged so far, for any entity.
    pub fn commands(&self) -> Vec<DeviceCommand> {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .map(|(_, c)| c.clone())
            .collect()
    }

    pub fn commands_for(&self, entity_id: &str) -> Vec<DeviceCommand> {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| id.as_str() == entity_id)
            .map(|(_, c)| c.clone())
            .collect()
    }

    pub fn clear_commands(&self) {
        self.commands.lock().unwrap().clear();
    }

    pub fn emit(&self, change: StateChange) {
        let _ = self.events.send(Arc::new(change));
    }
}

#[async_trait]
impl DeviceProxy for MockProxy {
    async fn snapshot(&self, entity_id: &EntityId) -> Result<DeviceSnapshot, CoreError> {
        self.snapshots
            .lock()
            .unwrap()
            .get(entity_id)
            .cloned()
            .ok_or_else(|| CoreError::DeviceUnavailable {
                entity_id: entity_id.to_string(),
                reason: "not registered".into(),
            })
    }

    async fn command(
        &self,
        entity_id: &EntityId,
        command: &DeviceCommand,
    ) -> Result<(), CoreError> {
        self.command_started.notify_one();
        let _gate = self.gate.lock().await;

        if *self.fail_attribute.lock().unwrap() == Some(command.attribute()) {
            return Err(CoreError::CommandFailed {
                entity_id: entity_id.to_string(),
                command: command.to_string(),
                reason: "injected failure".into(),
            });
        }

        if let Some(snapshot) = self.snapshots.lock().unwrap().get_mut(entity_id) {
            apply(snapshot, command);
        }
        self.commands
            .lock()
            .unwrap()
            .push((entity_id.clone(), command.clone()));
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<Arc<StateChange>> {
        self.events.subscribe()
    }
}

fn apply(snapshot: &mut DeviceSnapshot, command: &DeviceCommand) {
    match command {
        DeviceCommand::SetHvacMode(mode) => snapshot.mode = *mode,
        DeviceCommand::SetTemperature(Setpoint::Single { temperature }) => {
            snapshot.target_temperature = Some(*temperature);
        }
        DeviceCommand::SetTemperature(Setpoint::Range { low, high }) => {
            snapshot.target_temp_low = *low;
            snapshot.target_temp_high = *high;
        }
        DeviceCommand::SetFanMode(fan) => snapshot.fan_mode = Some(fan.clone()),
        DeviceCommand::SetSwingMode(swing) => snapshot.swing_mode = Some(swing.clone()),
    }
}

// ── Fixtures ────────────────────────────────────────────────────────

/// Thermostat in heat mode: setpoint 72°F, reading 70°F.
pub fn source_snapshot(entity_id: &str, action: HvacAction) -> DeviceSnapshot {
    let mut snap = DeviceSnapshot::new(entity_id, HvacMode::Heat);
    snap.hvac_action = Some(action);
    snap.current_temperature = Some(70.0);
    snap.target_temperature = Some(72.0);
    snap.min_temp = Some(45.0);
    snap.max_temp = Some(90.0);
    snap
}

/// Mini-split reading 68°F, range 45–90°F, fan auto, swing off.
pub fn target_snapshot(entity_id: &str) -> DeviceSnapshot {
    let mut snap = DeviceSnapshot::new(entity_id, HvacMode::Heat);
    snap.hvac_action = Some(HvacAction::Idle);
    snap.current_temperature = Some(68.0);
    snap.target_temperature = Some(70.0);
    snap.min_temp = Some(45.0);
    snap.max_temp = Some(90.0);
    snap.fan_mode = Some("auto".into());
    snap.fan_modes = vec!["auto".into(), "high".into(), "powerful".into()];
    snap.swing_mode = Some("off".into());
    snap.swing_modes = vec!["off".into(), "auto".into()];
    snap.supported_features = SupportedFeatures(
        SupportedFeatures::TARGET_TEMPERATURE
            | SupportedFeatures::FAN_MODE
            | SupportedFeatures::SWING_MODE,
    );
    snap
}

pub fn change(entity_id: &str, new_state: &str, action: Option<HvacAction>) -> StateChange {
    StateChange {
        entity_id: EntityId::from(entity_id),
        new_state: Some(new_state.to_owned()),
        old_state: Some("heat".into()),
        hvac_action: action,
        changed_at: None,
    }
}

pub fn single(temperature: f64) -> DeviceCommand {
    DeviceCommand::SetTemperature(Setpoint::Single { temperature })
}

pub fn fan(mode: &str) -> DeviceCommand {
    DeviceCommand::SetFanMode(mode.to_owned())
}

pub fn swing(mode: &str) -> DeviceCommand {
    DeviceCommand::SetSwingMode(mode.to_owned())
}

pub fn mode(mode: HvacMode) -> DeviceCommand {
    DeviceCommand::SetHvacMode(mode)
}
