// ── Reconciliation engine ──
//
// One `SyncEngine` per source → target pair. The boost state lives behind
// a `tokio::sync::Mutex` that doubles as the re-entrancy guard: a cycle
// runs only if `try_lock` succeeds, and the guard is released on every
// exit path when it drops. Overlapping notifications are dropped, never
// queued.

use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::Serialize;
use strum::Display;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::boost::{self, BoostDecision, BoostDirection, BoostState, SavedAuxiliary};
use crate::command::DeviceCommand;
use crate::config::PairConfig;
use crate::error::CoreError;
use crate::model::{DeviceSnapshot, EntityId, StateChange};
use crate::offset;
use crate::proxy::DeviceProxy;

/// Why a cycle ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Trigger {
    SourceChanged,
    Startup,
    Periodic,
    /// Notifications were lost; every pair is brought back in line.
    Resync,
    Manual,
}

/// Boost transition taken by a completed cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "transition", rename_all = "snake_case")]
pub enum Transition {
    Normal,
    Entered { direction: BoostDirection },
    Maintained { direction: BoostDirection },
    Reversed { from: BoostDirection, to: BoostDirection },
    Exited,
}

impl std::fmt::Display for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Normal => f.write_str("normal"),
            Self::Entered { direction } => write!(f, "boost entered ({direction})"),
            Self::Maintained { direction } => write!(f, "boost maintained ({direction})"),
            Self::Reversed { from, to } => write!(f, "boost reversed ({from} -> {to})"),
            Self::Exited => f.write_str("boost exited"),
        }
    }
}

/// Result of a completed cycle: what happened and what was sent, in order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleReport {
    pub pair: String,
    pub trigger: Trigger,
    pub transition: Transition,
    pub commands: Vec<DeviceCommand>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Completed(CycleReport),
    /// Another cycle held the guard.
    Skipped,
    /// The notification did not warrant a cycle.
    Ignored,
}

// ── SyncEngine ───────────────────────────────────────────────────────

/// Reconciliation engine for one pair. Cheap to clone.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    proxy: Arc<dyn DeviceProxy>,
    pair: ArcSwap<PairConfig>,
    /// Held for the duration of a cycle.
    state: Mutex<CycleState>,
}

#[derive(Debug, Default)]
struct CycleState {
    boost: BoostState,
    /// Capture from a boost entry that did not complete. The target may
    /// already carry boost fan/swing values, so a retry reuses this
    /// instead of reading them back.
    pending_capture: Option<SavedAuxiliary>,
}

impl SyncEngine {
    pub fn new(proxy: Arc<dyn DeviceProxy>, pair: PairConfig) -> Result<Self, CoreError> {
        pair.validate()?;
        Ok(Self {
            inner: Arc::new(EngineInner {
                proxy,
                pair: ArcSwap::from_pointee(pair),
                state: Mutex::new(CycleState::default()),
            }),
        })
    }

    pub fn name(&self) -> String {
        self.inner.pair.load().name.clone()
    }

    /// Current pair configuration.
    pub fn pair(&self) -> Arc<PairConfig> {
        self.inner.pair.load_full()
    }

    pub fn source(&self) -> EntityId {
        self.inner.pair.load().source.clone()
    }

    /// `true` while a cycle holds the guard.
    pub fn is_syncing(&self) -> bool {
        self.inner.state.try_lock().is_err()
    }

    /// Boost state after any in-flight cycle finishes.
    pub async fn boost_state(&self) -> BoostState {
        self.inner.state.lock().await.boost.clone()
    }

    /// Values held over from an incomplete boost entry, if any.
    pub async fn pending_capture(&self) -> Option<SavedAuxiliary> {
        self.inner.state.lock().await.pending_capture.clone()
    }

    // ── Entry points ─────────────────────────────────────────────────

    /// Handle a source notification.
    pub async fn on_source_state_changed(
        &self,
        change: &StateChange,
    ) -> Result<CycleOutcome, CoreError> {
        let Ok(mut state) = self.inner.state.try_lock() else {
            debug!(pair = %self.name(), entity = %change.entity_id, "cycle in progress, notification dropped");
            return Ok(CycleOutcome::Skipped);
        };

        let pair = self.inner.pair.load_full();
        if change.entity_id != pair.source {
            return Ok(CycleOutcome::Ignored);
        }
        if !change.is_available() {
            debug!(pair = %pair.name, state = ?change.new_state, "source not available, ignoring");
            return Ok(CycleOutcome::Ignored);
        }

        self.run_cycle(&mut state, &pair, Trigger::SourceChanged)
            .await
            .map(CycleOutcome::Completed)
    }

    /// Run one cycle unless another is in flight.
    pub async fn sync(&self, trigger: Trigger) -> Result<CycleOutcome, CoreError> {
        let Ok(mut state) = self.inner.state.try_lock() else {
            debug!(pair = %self.name(), %trigger, "cycle in progress, skipping");
            return Ok(CycleOutcome::Skipped);
        };

        let pair = self.inner.pair.load_full();
        self.run_cycle(&mut state, &pair, trigger)
            .await
            .map(CycleOutcome::Completed)
    }

    /// Replace the pair configuration between cycles.
    ///
    /// Waits for an in-flight cycle, then resets boost state if either
    /// device changed. Returns `true` when it did.
    pub async fn reconfigure(&self, pair: PairConfig) -> Result<bool, CoreError> {
        pair.validate()?;
        let mut state = self.inner.state.lock().await;

        let current = self.inner.pair.load_full();
        let reset = current.devices_differ(&pair);
        if reset {
            if state.boost.is_active() {
                info!(pair = %pair.name, "devices changed, dropping boost state");
            }
            *state = CycleState::default();
        }
        self.inner.pair.store(Arc::new(pair));
        Ok(reset)
    }

    // ── Cycle ────────────────────────────────────────────────────────

    async fn run_cycle(
        &self,
        state: &mut CycleState,
        pair: &PairConfig,
        trigger: Trigger,
    ) -> Result<CycleReport, CoreError> {
        let proxy = &self.inner.proxy;
        let source = proxy.snapshot(&pair.source).await?;
        let target = proxy.snapshot(&pair.target).await?;
        debug!(
            pair = %pair.name,
            %trigger,
            source_mode = %source.mode,
            hvac_action = ?source.hvac_action,
            "snapshots read"
        );

        let mut issued = Vec::new();
        let decision = boost::decide(&state.boost, &pair.options, source.hvac_action);

        let transition = match decision {
            BoostDecision::Normal => {
                if let Some(saved) = state.pending_capture.clone() {
                    self.apply(pair, boost::exit_commands(&saved, &target), &mut issued)
                        .await?;
                    info!(pair = %pair.name, "auxiliaries restored after incomplete boost entry");
                    state.pending_capture = None;
                }
                self.sync_normal(pair, &source, &target, &mut issued).await?;
                Transition::Normal
            }
            BoostDecision::Enter(direction) => {
                let saved = state
                    .pending_capture
                    .clone()
                    .unwrap_or_else(|| SavedAuxiliary::capture(&target));
                self.enter_boost(pair, state, direction, saved, &target, &mut issued)
                    .await?;
                Transition::Entered { direction }
            }
            BoostDecision::Maintain(direction) => {
                self.apply(pair, boost::maintain_commands(direction, &target), &mut issued)
                    .await?;
                Transition::Maintained { direction }
            }
            BoostDecision::Reverse { from, to, saved } => {
                self.exit_boost(pair, state, &saved, &target, &mut issued)
                    .await?;
                self.enter_boost(pair, state, to, saved, &target, &mut issued)
                    .await?;
                Transition::Reversed { from, to }
            }
            BoostDecision::Exit { saved } => {
                self.exit_boost(pair, state, &saved, &target, &mut issued)
                    .await?;
                self.sync_normal(pair, &source, &target, &mut issued).await?;
                Transition::Exited
            }
        };

        Ok(CycleReport {
            pair: pair.name.clone(),
            trigger,
            transition,
            commands: issued,
        })
    }

    /// Mode first, then setpoint(s).
    async fn sync_normal(
        &self,
        pair: &PairConfig,
        source: &DeviceSnapshot,
        target: &DeviceSnapshot,
        issued: &mut Vec<DeviceCommand>,
    ) -> Result<(), CoreError> {
        let mut commands = vec![DeviceCommand::SetHvacMode(source.mode)];
        if let Some(setpoint) = offset::plan_setpoint(source, target, &pair.options) {
            commands.push(DeviceCommand::SetTemperature(setpoint));
        }
        self.apply(pair, commands, issued).await
    }

    /// Boost becomes active only after the whole sequence is acknowledged.
    /// Until then `saved` is held as the pending capture.
    async fn enter_boost(
        &self,
        pair: &PairConfig,
        state: &mut CycleState,
        direction: BoostDirection,
        saved: SavedAuxiliary,
        target: &DeviceSnapshot,
        issued: &mut Vec<DeviceCommand>,
    ) -> Result<(), CoreError> {
        state.pending_capture = Some(saved.clone());
        self.apply(pair, boost::enter_commands(direction, target), issued)
            .await?;
        info!(
            pair = %pair.name,
            %direction,
            saved_fan = ?saved.fan_mode,
            saved_swing = ?saved.swing_mode,
            "boost entered"
        );
        state.pending_capture = None;
        state.boost = BoostState::Boosted { direction, saved };
        Ok(())
    }

    /// State is cleared only after every restore command is acknowledged.
    async fn exit_boost(
        &self,
        pair: &PairConfig,
        state: &mut CycleState,
        saved: &SavedAuxiliary,
        target: &DeviceSnapshot,
        issued: &mut Vec<DeviceCommand>,
    ) -> Result<(), CoreError> {
        self.apply(pair, boost::exit_commands(saved, target), issued)
            .await?;
        info!(pair = %pair.name, "boost exited");
        state.boost = BoostState::Normal;
        Ok(())
    }

    /// Issue commands one at a time, each fully acknowledged.
    async fn apply(
        &self,
        pair: &PairConfig,
        commands: Vec<DeviceCommand>,
        issued: &mut Vec<DeviceCommand>,
    ) -> Result<(), CoreError> {
        for command in commands {
            debug!(pair = %pair.name, target = %pair.target, %command, "sending command");
            self.inner.proxy.command(&pair.target, &command).await?;
            issued.push(command);
        }
        Ok(())
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pair = self.inner.pair.load();
        f.debug_struct("SyncEngine")
            .field("pair", &pair.name)
            .field("source", &pair.source)
            .field("target", &pair.target)
            .finish_non_exhaustive()
    }
}
