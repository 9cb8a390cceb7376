#![allow(clippy::unwrap_used)]
// Reconciliation scenarios against the in-memory proxy.

mod common;

use std::sync::Arc;

use pretty_assertions::assert_eq;

use climsync_core::{
    BoostDirection, BoostState, CoreError, CycleOutcome, CycleReport, DeviceProxy, HvacAction,
    HvacMode, PairConfig, SavedAuxiliary, Setpoint, SyncEngine, SyncOptions, Transition, Trigger,
    DeviceCommand,
};

use common::{MockProxy, SOURCE, TARGET, change, fan, mode, single, swing};

// ── Helpers ─────────────────────────────────────────────────────────

fn pair() -> PairConfig {
    PairConfig::new("living_room", SOURCE, TARGET)
}

fn engine(proxy: &Arc<MockProxy>, pair: PairConfig) -> SyncEngine {
    SyncEngine::new(Arc::clone(proxy) as Arc<dyn DeviceProxy>, pair).unwrap()
}

async fn cycle(engine: &SyncEngine) -> CycleReport {
    match engine.sync(Trigger::Manual).await.unwrap() {
        CycleOutcome::Completed(report) => report,
        other => panic!("expected completed cycle, got {other:?}"),
    }
}

fn saved(fan: &str, swing: &str) -> SavedAuxiliary {
    SavedAuxiliary {
        fan_mode: Some(fan.into()),
        swing_mode: Some(swing.into()),
    }
}

// ── Normal mode ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_normal_mode_applies_offset() {
    let proxy = MockProxy::with_pair();
    let engine = engine(&proxy, pair());

    let report = cycle(&engine).await;

    assert_eq!(report.transition, Transition::Normal);
    assert_eq!(report.commands, vec![mode(HvacMode::Heat), single(74.0)]);
    assert_eq!(proxy.commands_for(TARGET), report.commands);
    assert!(proxy.commands_for(SOURCE).is_empty());
}

#[tokio::test]
async fn test_normal_mode_offset_disabled() {
    let proxy = MockProxy::with_pair();
    let engine = engine(
        &proxy,
        pair().with_options(SyncOptions {
            offset_enabled: false,
            ..SyncOptions::default()
        }),
    );

    let report = cycle(&engine).await;
    assert_eq!(report.commands, vec![mode(HvacMode::Heat), single(72.0)]);
}

#[tokio::test]
async fn test_heat_cool_sends_offset_range() {
    let proxy = MockProxy::with_pair();
    proxy.update(SOURCE, |s| {
        s.mode = HvacMode::HeatCool;
        s.target_temperature = None;
        s.target_temp_low = Some(66.0);
        s.target_temp_high = Some(76.0);
    });
    let engine = engine(&proxy, pair());

    let report = cycle(&engine).await;
    assert_eq!(
        report.commands,
        vec![
            mode(HvacMode::HeatCool),
            DeviceCommand::SetTemperature(Setpoint::Range {
                low: Some(68.0),
                high: Some(78.0),
            }),
        ]
    );
}

#[tokio::test]
async fn test_idle_action_does_not_boost() {
    let proxy = MockProxy::with_pair();
    proxy.set_action(SOURCE, HvacAction::Idle);
    let engine = engine(&proxy, pair());

    let report = cycle(&engine).await;

    assert_eq!(report.transition, Transition::Normal);
    assert_eq!(report.commands, vec![mode(HvacMode::Heat), single(74.0)]);
    assert_eq!(engine.boost_state().await, BoostState::Normal);
}

#[tokio::test]
async fn test_boost_disabled_syncs_normally_while_heating() {
    let proxy = MockProxy::with_pair();
    proxy.set_action(SOURCE, HvacAction::Heating);
    let engine = engine(
        &proxy,
        pair().with_options(SyncOptions {
            boost_enabled: false,
            ..SyncOptions::default()
        }),
    );

    let report = cycle(&engine).await;
    assert_eq!(report.transition, Transition::Normal);
    assert_eq!(engine.boost_state().await, BoostState::Normal);
}

// ── Boost ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_boost_enter_while_heating() {
    let proxy = MockProxy::with_pair();
    proxy.set_action(SOURCE, HvacAction::Heating);
    let engine = engine(&proxy, pair());

    let report = cycle(&engine).await;

    assert_eq!(
        report.transition,
        Transition::Entered {
            direction: BoostDirection::Heating
        }
    );
    assert_eq!(
        report.commands,
        vec![
            mode(HvacMode::Heat),
            fan("powerful"),
            swing("auto"),
            single(90.0)
        ]
    );
    assert_eq!(
        engine.boost_state().await,
        BoostState::Boosted {
            direction: BoostDirection::Heating,
            saved: saved("auto", "off"),
        }
    );
}

#[tokio::test]
async fn test_boost_enter_while_cooling_uses_minimum() {
    let proxy = MockProxy::with_pair();
    proxy.update(SOURCE, |s| {
        s.mode = HvacMode::Cool;
        s.hvac_action = Some(HvacAction::Cooling);
    });
    let engine = engine(&proxy, pair());

    let report = cycle(&engine).await;
    assert_eq!(
        report.commands,
        vec![
            mode(HvacMode::Cool),
            fan("powerful"),
            swing("auto"),
            single(45.0)
        ]
    );
}

#[tokio::test]
async fn test_boost_exit_restores_then_syncs() {
    let proxy = MockProxy::with_pair();
    proxy.set_action(SOURCE, HvacAction::Heating);
    let engine = engine(&proxy, pair());
    cycle(&engine).await;

    proxy.set_action(SOURCE, HvacAction::Idle);
    let report = cycle(&engine).await;

    assert_eq!(report.transition, Transition::Exited);
    assert_eq!(
        report.commands,
        vec![fan("auto"), swing("off"), mode(HvacMode::Heat), single(74.0)]
    );
    assert_eq!(engine.boost_state().await, BoostState::Normal);
    assert_eq!(engine.boost_state().await.saved(), None);
}

#[tokio::test]
async fn test_boost_round_trip_restores_captured_values() {
    let proxy = MockProxy::with_pair();
    proxy.update(TARGET, |t| {
        t.fan_mode = Some("low".into());
        t.fan_modes.push("low".into());
        t.swing_mode = Some("vertical".into());
        t.swing_modes.push("vertical".into());
    });
    proxy.set_action(SOURCE, HvacAction::Heating);
    let engine = engine(&proxy, pair());

    cycle(&engine).await;
    assert_eq!(
        engine.boost_state().await.saved(),
        Some(&saved("low", "vertical"))
    );

    proxy.set_action(SOURCE, HvacAction::Idle);
    let report = cycle(&engine).await;

    let restored: Vec<_> = report
        .commands
        .iter()
        .filter(|c| matches!(c, DeviceCommand::SetFanMode(_) | DeviceCommand::SetSwingMode(_)))
        .cloned()
        .collect();
    assert_eq!(restored, vec![fan("low"), swing("vertical")]);
    assert_eq!(engine.boost_state().await.saved(), None);
    assert_eq!(proxy.get(TARGET).fan_mode.as_deref(), Some("low"));
    assert_eq!(proxy.get(TARGET).swing_mode.as_deref(), Some("vertical"));
}

#[tokio::test]
async fn test_boost_maintain_is_idempotent() {
    let proxy = MockProxy::with_pair();
    proxy.set_action(SOURCE, HvacAction::Heating);
    let engine = engine(&proxy, pair());
    cycle(&engine).await;

    let first = cycle(&engine).await;
    let second = cycle(&engine).await;

    let maintained = Transition::Maintained {
        direction: BoostDirection::Heating,
    };
    assert_eq!(first.transition, maintained);
    assert_eq!(second.transition, maintained);
    assert_eq!(first.commands, vec![single(90.0)]);
    assert_eq!(second.commands, first.commands);
}

#[tokio::test]
async fn test_direction_change_exits_and_reenters() {
    let proxy = MockProxy::with_pair();
    proxy.set_action(SOURCE, HvacAction::Heating);
    let engine = engine(&proxy, pair());
    cycle(&engine).await;

    proxy.set_action(SOURCE, HvacAction::Cooling);
    let report = cycle(&engine).await;

    assert_eq!(
        report.transition,
        Transition::Reversed {
            from: BoostDirection::Heating,
            to: BoostDirection::Cooling,
        }
    );
    assert_eq!(
        report.commands,
        vec![
            fan("auto"),
            swing("off"),
            mode(HvacMode::Cool),
            fan("powerful"),
            swing("auto"),
            single(45.0),
        ]
    );
    // Pre-boost values survive the reversal.
    assert_eq!(
        engine.boost_state().await,
        BoostState::Boosted {
            direction: BoostDirection::Cooling,
            saved: saved("auto", "off"),
        }
    );
}

#[tokio::test]
async fn test_disabling_boost_while_boosted_exits() {
    let proxy = MockProxy::with_pair();
    proxy.set_action(SOURCE, HvacAction::Heating);
    let engine = engine(&proxy, pair());
    cycle(&engine).await;

    let reset = engine
        .reconfigure(pair().with_options(SyncOptions {
            boost_enabled: false,
            ..SyncOptions::default()
        }))
        .await
        .unwrap();
    assert!(!reset, "options-only change keeps boost state");
    assert!(engine.boost_state().await.is_active());

    let report = cycle(&engine).await;
    assert_eq!(report.transition, Transition::Exited);
    assert_eq!(engine.boost_state().await, BoostState::Normal);
}

#[tokio::test]
async fn test_boost_without_fan_or_swing_support_degrades() {
    let proxy = MockProxy::with_pair();
    proxy.update(TARGET, |t| {
        t.fan_modes = vec!["quiet".into()];
        t.swing_modes.clear();
        t.supported_features = climsync_core::SupportedFeatures(1);
    });
    proxy.set_action(SOURCE, HvacAction::Heating);
    let engine = engine(&proxy, pair());

    let report = cycle(&engine).await;
    assert_eq!(report.commands, vec![mode(HvacMode::Heat), single(90.0)]);
    assert!(engine.boost_state().await.is_active());
}

// ── Failures ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_setpoint_failure_mid_enter_leaves_boost_inactive() {
    let proxy = MockProxy::with_pair();
    proxy.set_action(SOURCE, HvacAction::Heating);
    proxy.fail_on(Some("temperature"));
    let engine = engine(&proxy, pair());

    let err = engine.sync(Trigger::Manual).await.unwrap_err();

    assert!(matches!(err, CoreError::CommandFailed { ref command, .. } if command == "temperature=90"));
    assert_eq!(engine.boost_state().await, BoostState::Normal);
    // Earlier acknowledged commands stay applied.
    assert_eq!(
        proxy.commands(),
        vec![mode(HvacMode::Heat), fan("powerful"), swing("auto")]
    );
    assert!(!engine.is_syncing(), "guard released on the error path");
}

#[tokio::test]
async fn test_retry_after_failed_enter_keeps_original_capture() {
    let proxy = MockProxy::with_pair();
    proxy.set_action(SOURCE, HvacAction::Heating);
    proxy.fail_on(Some("temperature"));
    let engine = engine(&proxy, pair());

    assert!(engine.sync(Trigger::Manual).await.is_err());
    assert_eq!(proxy.get(TARGET).fan_mode.as_deref(), Some("powerful"));
    assert_eq!(engine.pending_capture().await, Some(saved("auto", "off")));
    assert!(!engine.boost_state().await.is_active());

    proxy.fail_on(None);
    let report = cycle(&engine).await;
    assert!(matches!(report.transition, Transition::Entered { .. }));
    assert_eq!(
        engine.boost_state().await.saved(),
        Some(&saved("auto", "off"))
    );
    assert_eq!(engine.pending_capture().await, None);

    proxy.set_action(SOURCE, HvacAction::Idle);
    let report = cycle(&engine).await;

    assert_eq!(report.transition, Transition::Exited);
    assert_eq!(proxy.get(TARGET).fan_mode.as_deref(), Some("auto"));
    assert_eq!(proxy.get(TARGET).swing_mode.as_deref(), Some("off"));
}

#[tokio::test]
async fn test_normal_cycle_after_failed_enter_restores_auxiliaries() {
    let proxy = MockProxy::with_pair();
    proxy.set_action(SOURCE, HvacAction::Heating);
    proxy.fail_on(Some("temperature"));
    let engine = engine(&proxy, pair());
    assert!(engine.sync(Trigger::Manual).await.is_err());

    proxy.fail_on(None);
    proxy.set_action(SOURCE, HvacAction::Idle);
    proxy.clear_commands();
    let report = cycle(&engine).await;

    assert_eq!(report.transition, Transition::Normal);
    assert_eq!(
        report.commands,
        vec![fan("auto"), swing("off"), mode(HvacMode::Heat), single(74.0)]
    );
    assert_eq!(engine.pending_capture().await, None);

    // Nothing left to restore on the next cycle.
    let report = cycle(&engine).await;
    assert_eq!(report.commands, vec![mode(HvacMode::Heat), single(74.0)]);
}

#[tokio::test]
async fn test_failure_mid_exit_keeps_boost_for_retry() {
    let proxy = MockProxy::with_pair();
    proxy.set_action(SOURCE, HvacAction::Heating);
    let engine = engine(&proxy, pair());
    cycle(&engine).await;

    proxy.set_action(SOURCE, HvacAction::Idle);
    proxy.fail_on(Some("swing_mode"));
    assert!(engine.sync(Trigger::Manual).await.is_err());
    assert_eq!(
        engine.boost_state().await.saved(),
        Some(&saved("auto", "off"))
    );

    proxy.fail_on(None);
    proxy.clear_commands();
    let report = cycle(&engine).await;

    // Fan was already restored by the failed attempt.
    assert_eq!(report.transition, Transition::Exited);
    assert_eq!(
        report.commands,
        vec![swing("off"), mode(HvacMode::Heat), single(74.0)]
    );
    assert_eq!(engine.boost_state().await, BoostState::Normal);
}

#[tokio::test]
async fn test_unavailable_target_aborts_before_commands() {
    let proxy = MockProxy::with_pair();
    proxy.remove(TARGET);
    let engine = engine(&proxy, pair());

    let err = engine.sync(Trigger::Manual).await.unwrap_err();

    assert!(matches!(err, CoreError::DeviceUnavailable { ref entity_id, .. } if entity_id == TARGET));
    assert!(proxy.commands().is_empty());
    assert!(!engine.is_syncing());
}

// ── Notifications and guard ─────────────────────────────────────────

#[tokio::test]
async fn test_overlapping_notification_is_dropped() {
    let proxy = MockProxy::with_pair();
    let engine = engine(&proxy, pair());

    let gate = proxy.gate.lock().await;
    let first = {
        let engine = engine.clone();
        tokio::spawn(async move {
            engine
                .on_source_state_changed(&change(SOURCE, "heat", None))
                .await
        })
    };
    proxy.command_started.notified().await;
    assert!(engine.is_syncing());

    let second = engine
        .on_source_state_changed(&change(SOURCE, "heat", None))
        .await
        .unwrap();
    assert_eq!(second, CycleOutcome::Skipped);
    assert!(proxy.commands().is_empty(), "no command from the dropped notification");

    drop(gate);
    let first = first.await.unwrap().unwrap();
    assert!(matches!(first, CycleOutcome::Completed(_)));
    assert_eq!(proxy.commands(), vec![mode(HvacMode::Heat), single(74.0)]);
    assert!(!engine.is_syncing());
}

#[tokio::test]
async fn test_unavailable_notification_is_ignored() {
    let proxy = MockProxy::with_pair();
    let engine = engine(&proxy, pair());

    for state in ["unavailable", "unknown"] {
        let outcome = engine
            .on_source_state_changed(&change(SOURCE, state, None))
            .await
            .unwrap();
        assert_eq!(outcome, CycleOutcome::Ignored);
    }
    assert!(proxy.commands().is_empty());
}

#[tokio::test]
async fn test_notification_for_other_entity_is_ignored() {
    let proxy = MockProxy::with_pair();
    let engine = engine(&proxy, pair());

    let outcome = engine
        .on_source_state_changed(&change("climate.bedroom", "heat", None))
        .await
        .unwrap();
    assert_eq!(outcome, CycleOutcome::Ignored);
    assert!(proxy.commands().is_empty());
}

#[tokio::test]
async fn test_notification_runs_cycle_from_fresh_snapshots() {
    let proxy = MockProxy::with_pair();
    proxy.set_action(SOURCE, HvacAction::Heating);
    let engine = engine(&proxy, pair());

    // The notification says idle; the live snapshot says heating.
    let outcome = engine
        .on_source_state_changed(&change(SOURCE, "heat", Some(HvacAction::Idle)))
        .await
        .unwrap();

    match outcome {
        CycleOutcome::Completed(report) => {
            assert_eq!(report.trigger, Trigger::SourceChanged);
            assert_eq!(
                report.transition,
                Transition::Entered {
                    direction: BoostDirection::Heating
                }
            );
        }
        other => panic!("expected completed cycle, got {other:?}"),
    }
}

// ── Reconfiguration ─────────────────────────────────────────────────

#[tokio::test]
async fn test_reconfigure_with_new_target_resets_boost() {
    let proxy = MockProxy::with_pair();
    proxy.put(common::target_snapshot("climate.bedroom_split"));
    proxy.set_action(SOURCE, HvacAction::Heating);
    let engine = engine(&proxy, pair());
    cycle(&engine).await;
    assert!(engine.boost_state().await.is_active());

    let reset = engine
        .reconfigure(PairConfig::new("living_room", SOURCE, "climate.bedroom_split"))
        .await
        .unwrap();

    assert!(reset);
    assert_eq!(engine.boost_state().await, BoostState::Normal);
    assert_eq!(engine.pair().target.as_str(), "climate.bedroom_split");

    proxy.clear_commands();
    let report = cycle(&engine).await;
    assert!(matches!(report.transition, Transition::Entered { .. }));
    assert_eq!(proxy.commands_for("climate.bedroom_split").len(), 4);
}

#[tokio::test]
async fn test_reconfigure_rejects_invalid_pair() {
    let proxy = MockProxy::with_pair();
    let engine = engine(&proxy, pair());

    let err = engine
        .reconfigure(PairConfig::new("living_room", SOURCE, SOURCE))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidConfiguration { .. }));
    assert_eq!(engine.pair().target.as_str(), TARGET);
}

#[tokio::test]
async fn test_resync_trigger_is_reported() {
    let proxy = MockProxy::with_pair();
    let engine = engine(&proxy, pair());

    let CycleOutcome::Completed(report) = engine.sync(Trigger::Resync).await.unwrap() else {
        panic!("expected completed cycle");
    };

    assert_eq!(report.trigger, Trigger::Resync);
    assert_eq!(Trigger::Resync.to_string(), "resync");
}
