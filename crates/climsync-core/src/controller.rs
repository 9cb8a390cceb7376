// ── Controller abstraction ──
//
// Hosts every sync pair of a process. Owns the device proxy, routes
// source notifications to the matching engine, runs the startup and
// periodic resync cycles, and applies configuration changes with
// drain/reset semantics.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::config::{ControllerConfig, PairConfig, validate_pairs};
use crate::engine::{CycleOutcome, SyncEngine, Trigger};
use crate::error::CoreError;
use crate::hass::HassProxy;
use crate::model::StateChange;
use crate::proxy::DeviceProxy;

/// Result of one pair's cycle in a multi-pair sync.
pub type PairResult = (String, Result<CycleOutcome, CoreError>);

/// What [`Controller::apply_pairs`] changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PairChanges {
    pub added: Vec<String>,
    pub updated: Vec<String>,
    /// Subset of `updated` whose boost state was reset.
    pub reset: Vec<String>,
    pub removed: Vec<String>,
}

// ── Controller ───────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<ControllerInner>`. Pairs never share
/// mutable state; each has its own [`SyncEngine`] and guard.
#[derive(Clone)]
pub struct Controller {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    proxy: Arc<dyn DeviceProxy>,
    engines: DashMap<String, SyncEngine>,
    resync_interval: Duration,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
    /// Cycles spawned by the router. Never cancelled, only awaited.
    cycles: TaskTracker,
}

impl Controller {
    /// Create a controller over an existing proxy. Does not start any
    /// task; call [`start()`](Self::start).
    pub fn new(proxy: Arc<dyn DeviceProxy>, resync_interval: Duration) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                proxy,
                engines: DashMap::new(),
                resync_interval,
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
                cycles: TaskTracker::new(),
            }),
        }
    }

    /// Connect to Home Assistant and register every configured pair.
    pub async fn connect(config: &ControllerConfig) -> Result<Self, CoreError> {
        config.validate()?;

        let cancel = CancellationToken::new();
        let proxy = HassProxy::connect(&config.hass, cancel.child_token()).await?;
        let controller = Self {
            inner: Arc::new(ControllerInner {
                proxy: Arc::new(proxy),
                engines: DashMap::new(),
                resync_interval: config.resync_interval,
                cancel,
                task_handles: Mutex::new(Vec::new()),
                cycles: TaskTracker::new(),
            }),
        };

        for pair in &config.pairs {
            controller.add_pair(pair.clone())?;
        }
        Ok(controller)
    }

    /// Run `f` against a connected controller, without background tasks.
    pub async fn oneshot<F, Fut, T>(config: &ControllerConfig, f: F) -> Result<T, CoreError>
    where
        F: FnOnce(Controller) -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>>,
    {
        let mut config = config.clone();
        config.hass.websocket_enabled = false;

        let controller = Self::connect(&config).await?;
        let result = f(controller.clone()).await;
        controller.shutdown().await;
        result
    }

    pub fn proxy(&self) -> &Arc<dyn DeviceProxy> {
        &self.inner.proxy
    }

    // ── Pair management ──────────────────────────────────────────

    /// Register a new pair. Fails if the name is taken.
    pub fn add_pair(&self, pair: PairConfig) -> Result<SyncEngine, CoreError> {
        let name = pair.name.clone();
        if self.inner.engines.contains_key(&name) {
            return Err(CoreError::InvalidConfiguration {
                message: format!("pair '{name}' already exists"),
            });
        }

        let engine = SyncEngine::new(Arc::clone(&self.inner.proxy), pair)?;
        let pair = engine.pair();
        info!(pair = %name, source = %pair.source, target = %pair.target, "pair added");
        self.inner.engines.insert(name, engine.clone());
        Ok(engine)
    }

    /// Replace a pair's configuration. See [`SyncEngine::reconfigure`].
    pub async fn reconfigure_pair(&self, pair: PairConfig) -> Result<bool, CoreError> {
        let engine = self.engine(&pair.name).ok_or_else(|| CoreError::PairNotFound {
            name: pair.name.clone(),
        })?;
        engine.reconfigure(pair).await
    }

    /// Unregister a pair. A cycle already in flight runs to completion.
    pub fn remove_pair(&self, name: &str) -> Option<SyncEngine> {
        let removed = self.inner.engines.remove(name).map(|(_, engine)| engine);
        if removed.is_some() {
            info!(pair = %name, "pair removed");
        }
        removed
    }

    /// Make the registered pairs match `pairs`: add new names, reconfigure
    /// existing ones whose config changed, remove the rest.
    pub async fn apply_pairs(&self, pairs: Vec<PairConfig>) -> Result<PairChanges, CoreError> {
        validate_pairs(&pairs)?;
        let mut changes = PairChanges::default();

        let stale: Vec<String> = self
            .inner
            .engines
            .iter()
            .map(|e| e.key().clone())
            .filter(|name| !pairs.iter().any(|p| &p.name == name))
            .collect();
        for name in stale {
            if self.remove_pair(&name).is_some() {
                changes.removed.push(name);
            }
        }

        for pair in pairs {
            let name = pair.name.clone();
            match self.engine(&name) {
                Some(engine) => {
                    if *engine.pair() == pair {
                        continue;
                    }
                    if engine.reconfigure(pair).await? {
                        changes.reset.push(name.clone());
                    }
                    info!(pair = %name, "pair reconfigured");
                    changes.updated.push(name);
                }
                None => {
                    self.add_pair(pair)?;
                    changes.added.push(name);
                }
            }
        }

        Ok(changes)
    }

    pub fn engine(&self, name: &str) -> Option<SyncEngine> {
        self.inner.engines.get(name).map(|e| e.value().clone())
    }

    /// Registered engines, sorted by pair name.
    pub fn engines(&self) -> Vec<SyncEngine> {
        let mut engines: Vec<SyncEngine> =
            self.inner.engines.iter().map(|e| e.value().clone()).collect();
        engines.sort_by_key(SyncEngine::name);
        engines
    }

    // ── Cycles ───────────────────────────────────────────────────

    /// One cycle for every pair, concurrently.
    pub async fn sync_all(&self, trigger: Trigger) -> Vec<PairResult> {
        let engines = self.engines();
        join_all(engines.into_iter().map(|engine| async move {
            let result = engine.sync(trigger).await;
            (engine.name(), result)
        }))
        .await
    }

    /// One cycle for a single pair.
    pub async fn sync_pair(&self, name: &str, trigger: Trigger) -> Result<CycleOutcome, CoreError> {
        let engine = self
            .engine(name)
            .ok_or_else(|| CoreError::PairNotFound { name: name.into() })?;
        engine.sync(trigger).await
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Spawn the notification router and the resync task, then run the
    /// startup cycle for every pair.
    pub async fn start(&self) {
        {
            let mut handles = self.inner.task_handles.lock().await;

            let rx = self.inner.proxy.subscribe();
            let ctrl = self.clone();
            let cancel = self.inner.cancel.child_token();
            handles.push(tokio::spawn(event_router_task(ctrl, rx, cancel)));

            let interval = self.inner.resync_interval;
            if interval.is_zero() {
                debug!("periodic resync disabled");
            } else {
                let ctrl = self.clone();
                let cancel = self.inner.cancel.child_token();
                handles.push(tokio::spawn(resync_task(ctrl, interval, cancel)));
            }
        }

        log_results(&self.sync_all(Trigger::Startup).await);
        info!(pairs = self.inner.engines.len(), "controller started");
    }

    /// Cancel background tasks and wait for them, then wait for every
    /// cycle they started to run to completion or failure.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }

        let cycles = &self.inner.cycles;
        cycles.close();
        if !cycles.is_empty() {
            debug!(in_flight = cycles.len(), "waiting for in-flight cycles");
        }
        cycles.wait().await;
        debug!("controller shut down");
    }
}

// ── Background tasks ─────────────────────────────────────────────

/// Hand each notification to the engine(s) whose source it names.
///
/// Every delivery runs in its own task so a busy engine drops the
/// notification through its guard instead of stalling the router.
async fn event_router_task(
    controller: Controller,
    mut rx: broadcast::Receiver<Arc<StateChange>>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = rx.recv() => {
                match result {
                    Ok(change) => route_change(&controller, &change),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "notification router lagged, resyncing all pairs");
                        let ctrl = controller.clone();
                        controller.inner.cycles.spawn(async move {
                            log_results(&ctrl.sync_all(Trigger::Resync).await);
                        });
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }
    debug!("notification router exiting");
}

fn route_change(controller: &Controller, change: &Arc<StateChange>) {
    for engine in controller.engines() {
        if engine.source() != change.entity_id {
            continue;
        }
        let change = Arc::clone(change);
        controller.inner.cycles.spawn(async move {
            let name = engine.name();
            log_results(&[(name, engine.on_source_state_changed(&change).await)]);
        });
    }
}

/// Periodically resync every pair.
async fn resync_task(controller: Controller, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                log_results(&controller.sync_all(Trigger::Periodic).await);
            }
        }
    }
}

fn log_results(results: &[PairResult]) {
    for (pair, result) in results {
        match result {
            Ok(CycleOutcome::Completed(report)) => info!(
                pair = %pair,
                trigger = %report.trigger,
                transition = %report.transition,
                commands = report.commands.len(),
                "cycle completed"
            ),
            Ok(CycleOutcome::Skipped) => debug!(pair = %pair, "cycle skipped"),
            Ok(CycleOutcome::Ignored) => debug!(pair = %pair, "notification ignored"),
            Err(e) => warn!(pair = %pair, error = %e, "cycle failed"),
        }
    }
}
