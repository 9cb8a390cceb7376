// ── Boost state machine ──
//
// Two states, `Normal` and `Boosted`. `decide` derives the transition
// from the current state, the options and the source's hvac_action every
// cycle; nothing is sticky. The command builders are pure so the engine
// only sequences and commits.

use serde::Serialize;
use strum::Display;
use tracing::debug;

use crate::command::{DeviceCommand, Setpoint};
use crate::config::SyncOptions;
use crate::model::{DeviceSnapshot, HvacAction, HvacMode};

/// Fan settings tried on boost entry, first supported wins.
pub const FAN_PRIORITY: [&str; 3] = ["powerful", "high", "auto"];

/// Swing setting commanded on boost entry.
pub const BOOST_SWING: &str = "auto";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BoostDirection {
    Heating,
    Cooling,
}

impl BoostDirection {
    pub fn from_action(action: HvacAction) -> Option<Self> {
        match action {
            HvacAction::Heating => Some(Self::Heating),
            HvacAction::Cooling => Some(Self::Cooling),
            _ => None,
        }
    }

    pub fn hvac_mode(self) -> HvacMode {
        match self {
            Self::Heating => HvacMode::Heat,
            Self::Cooling => HvacMode::Cool,
        }
    }

    /// Top of the target's range when heating, bottom when cooling.
    pub fn extreme_setpoint(self, target: &DeviceSnapshot) -> f64 {
        let (min, max) = target.temperature_range();
        match self {
            Self::Heating => max,
            Self::Cooling => min,
        }
    }
}

/// Target fan and swing settings captured on boost entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SavedAuxiliary {
    pub fan_mode: Option<String>,
    pub swing_mode: Option<String>,
}

impl SavedAuxiliary {
    pub fn capture(target: &DeviceSnapshot) -> Self {
        Self {
            fan_mode: target.fan_mode.clone(),
            swing_mode: target.swing_mode.clone(),
        }
    }
}

/// Boost state of one pair. `saved` exists exactly while boosted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum BoostState {
    #[default]
    Normal,
    Boosted {
        direction: BoostDirection,
        saved: SavedAuxiliary,
    },
}

impl BoostState {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Boosted { .. })
    }

    pub fn saved(&self) -> Option<&SavedAuxiliary> {
        match self {
            Self::Boosted { saved, .. } => Some(saved),
            Self::Normal => None,
        }
    }
}

/// What the current cycle has to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoostDecision {
    /// Plain mode + setpoint sync.
    Normal,
    Enter(BoostDirection),
    Maintain(BoostDirection),
    /// Direction flipped while boosted: exit, then enter the other way.
    Reverse {
        from: BoostDirection,
        to: BoostDirection,
        saved: SavedAuxiliary,
    },
    /// Restore auxiliaries, then normal sync.
    Exit { saved: SavedAuxiliary },
}

pub fn decide(
    state: &BoostState,
    options: &SyncOptions,
    action: Option<HvacAction>,
) -> BoostDecision {
    let wanted = if options.boost_enabled {
        action.and_then(BoostDirection::from_action)
    } else {
        None
    };

    match (state, wanted) {
        (BoostState::Normal, None) => BoostDecision::Normal,
        (BoostState::Normal, Some(direction)) => BoostDecision::Enter(direction),
        (BoostState::Boosted { direction, .. }, Some(wanted)) if *direction == wanted => {
            BoostDecision::Maintain(wanted)
        }
        (BoostState::Boosted { direction, saved }, Some(wanted)) => BoostDecision::Reverse {
            from: *direction,
            to: wanted,
            saved: saved.clone(),
        },
        (BoostState::Boosted { saved, .. }, None) => BoostDecision::Exit {
            saved: saved.clone(),
        },
    }
}

/// First entry of [`FAN_PRIORITY`] the target supports.
pub fn select_boost_fan(target: &DeviceSnapshot) -> Option<&'static str> {
    FAN_PRIORITY
        .into_iter()
        .find(|fan| target.supports_fan_mode(fan))
}

/// Mode, fan, swing, extreme setpoint. Unsupported auxiliaries are skipped.
pub fn enter_commands(direction: BoostDirection, target: &DeviceSnapshot) -> Vec<DeviceCommand> {
    let mut commands = vec![DeviceCommand::SetHvacMode(direction.hvac_mode())];

    match select_boost_fan(target) {
        Some(fan) => commands.push(DeviceCommand::SetFanMode(fan.to_owned())),
        None => debug!(target = %target.entity_id, "no boost fan setting supported, fan unchanged"),
    }

    if target.supports_swing() && target.supports_swing_mode(BOOST_SWING) {
        commands.push(DeviceCommand::SetSwingMode(BOOST_SWING.to_owned()));
    } else {
        debug!(target = %target.entity_id, "swing auto not supported, swing unchanged");
    }

    commands.extend(maintain_commands(direction, target));
    commands
}

pub fn maintain_commands(direction: BoostDirection, target: &DeviceSnapshot) -> Vec<DeviceCommand> {
    vec![DeviceCommand::SetTemperature(Setpoint::Single {
        temperature: direction.extreme_setpoint(target),
    })]
}

/// Put back the captured fan and swing settings where they differ.
pub fn exit_commands(saved: &SavedAuxiliary, target: &DeviceSnapshot) -> Vec<DeviceCommand> {
    let mut commands = Vec::new();

    if let Some(fan) = &saved.fan_mode {
        if target.fan_mode.as_ref() != Some(fan) {
            commands.push(DeviceCommand::SetFanMode(fan.clone()));
        }
    }

    if let Some(swing) = &saved.swing_mode {
        if target.supports_swing() && target.swing_mode.as_ref() != Some(swing) {
            commands.push(DeviceCommand::SetSwingMode(swing.clone()));
        }
    }

    commands
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SupportedFeatures;

    fn target() -> DeviceSnapshot {
        let mut snap = DeviceSnapshot::new("climate.mini_split", HvacMode::Heat);
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

    fn boosted(direction: BoostDirection) -> BoostState {
        BoostState::Boosted {
            direction,
            saved: SavedAuxiliary {
                fan_mode: Some("low".into()),
                swing_mode: Some("vertical".into()),
            },
        }
    }

    #[test]
    fn decide_enters_only_on_active_action() {
        let options = SyncOptions::default();
        assert_eq!(
            decide(&BoostState::Normal, &options, Some(HvacAction::Heating)),
            BoostDecision::Enter(BoostDirection::Heating)
        );
        assert_eq!(
            decide(&BoostState::Normal, &options, Some(HvacAction::Idle)),
            BoostDecision::Normal
        );
        assert_eq!(decide(&BoostState::Normal, &options, None), BoostDecision::Normal);
    }

    #[test]
    fn decide_respects_boost_disabled() {
        let options = SyncOptions {
            boost_enabled: false,
            ..SyncOptions::default()
        };
        assert_eq!(
            decide(&BoostState::Normal, &options, Some(HvacAction::Cooling)),
            BoostDecision::Normal
        );
        assert!(matches!(
            decide(&boosted(BoostDirection::Cooling), &options, Some(HvacAction::Cooling)),
            BoostDecision::Exit { .. }
        ));
    }

    #[test]
    fn decide_maintains_reverses_and_exits() {
        let options = SyncOptions::default();
        let state = boosted(BoostDirection::Heating);

        assert_eq!(
            decide(&state, &options, Some(HvacAction::Heating)),
            BoostDecision::Maintain(BoostDirection::Heating)
        );
        assert!(matches!(
            decide(&state, &options, Some(HvacAction::Cooling)),
            BoostDecision::Reverse {
                from: BoostDirection::Heating,
                to: BoostDirection::Cooling,
                ..
            }
        ));
        assert_eq!(
            decide(&state, &options, Some(HvacAction::Idle)),
            BoostDecision::Exit {
                saved: state.saved().cloned().unwrap_or_default()
            }
        );
    }

    #[test]
    fn fan_priority_prefers_powerful() {
        let mut snap = target();
        assert_eq!(select_boost_fan(&snap), Some("powerful"));

        snap.fan_modes = vec!["low".into(), "auto".into(), "high".into()];
        assert_eq!(select_boost_fan(&snap), Some("high"));

        snap.fan_modes = vec!["quiet".into(), "low".into()];
        assert_eq!(select_boost_fan(&snap), None);
    }

    #[test]
    fn enter_sequence_for_heating() {
        assert_eq!(
            enter_commands(BoostDirection::Heating, &target()),
            vec![
                DeviceCommand::SetHvacMode(HvacMode::Heat),
                DeviceCommand::SetFanMode("powerful".into()),
                DeviceCommand::SetSwingMode("auto".into()),
                DeviceCommand::SetTemperature(Setpoint::Single { temperature: 90.0 }),
            ]
        );
    }

    #[test]
    fn enter_degrades_without_fan_or_swing() {
        let mut snap = target();
        snap.fan_modes.clear();
        snap.swing_modes.clear();
        snap.supported_features = SupportedFeatures(SupportedFeatures::TARGET_TEMPERATURE);

        assert_eq!(
            enter_commands(BoostDirection::Cooling, &snap),
            vec![
                DeviceCommand::SetHvacMode(HvacMode::Cool),
                DeviceCommand::SetTemperature(Setpoint::Single { temperature: 45.0 }),
            ]
        );
    }

    #[test]
    fn exit_restores_only_what_differs() {
        let saved = SavedAuxiliary {
            fan_mode: Some("auto".into()),
            swing_mode: Some("off".into()),
        };

        let mut snap = target();
        snap.fan_mode = Some("powerful".into());
        snap.swing_mode = Some("auto".into());
        assert_eq!(
            exit_commands(&saved, &snap),
            vec![
                DeviceCommand::SetFanMode("auto".into()),
                DeviceCommand::SetSwingMode("off".into()),
            ]
        );

        snap.fan_mode = Some("auto".into());
        assert_eq!(
            exit_commands(&saved, &snap),
            vec![DeviceCommand::SetSwingMode("off".into())]
        );
    }

    #[test]
    fn exit_skips_swing_on_unsupported_target() {
        let saved = SavedAuxiliary {
            fan_mode: None,
            swing_mode: Some("off".into()),
        };
        let mut snap = target();
        snap.swing_modes.clear();
        snap.supported_features = SupportedFeatures(SupportedFeatures::FAN_MODE);

        assert!(exit_commands(&saved, &snap).is_empty());
    }
}
