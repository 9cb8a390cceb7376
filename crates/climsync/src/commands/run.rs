//! `climsync run`: the long-lived reconciliation service.

use tracing::{info, warn};

use climsync_core::{Controller, Trigger};

use crate::cli::GlobalOpts;
use crate::config;
use crate::error::CliError;

pub async fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load(global)?;
    let controller_config = config::controller_config(global, &cfg)?;
    if controller_config.pairs.is_empty() {
        warn!("no pairs configured; waiting for a reload");
    }

    let controller = Controller::connect(&controller_config).await?;
    controller.start().await;

    let result = wait_for_shutdown(&controller, global).await;
    info!("shutting down");
    controller.shutdown().await;
    result
}

#[cfg(unix)]
async fn wait_for_shutdown(controller: &Controller, global: &GlobalOpts) -> Result<(), CliError> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangup = signal(SignalKind::hangup())?;
    loop {
        tokio::select! {
            res = tokio::signal::ctrl_c() => return res.map_err(CliError::from),
            _ = hangup.recv() => reload(controller, global).await,
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown(_controller: &Controller, _global: &GlobalOpts) -> Result<(), CliError> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}

/// Re-read the config file and apply its pairs. Connection settings are
/// only read at startup.
#[cfg_attr(not(unix), allow(dead_code))]
async fn reload(controller: &Controller, global: &GlobalOpts) {
    info!("reloading configuration");
    let loaded = config::load(global).and_then(|cfg| cfg.validated_pairs().map_err(CliError::from));
    let pairs = match loaded {
        Ok(pairs) => pairs,
        Err(e) => {
            warn!(error = %e, "reload failed, keeping current pairs");
            return;
        }
    };

    let changes = match controller.apply_pairs(pairs).await {
        Ok(changes) => changes,
        Err(e) => {
            warn!(error = %e, "reload failed, keeping current pairs");
            return;
        }
    };
    info!(
        added = ?changes.added,
        updated = ?changes.updated,
        reset = ?changes.reset,
        removed = ?changes.removed,
        "configuration reloaded"
    );

    for name in changes.added.iter().chain(&changes.updated) {
        match controller.sync_pair(name, Trigger::Startup).await {
            Ok(outcome) => tracing::debug!(pair = %name, ?outcome, "post-reload cycle"),
            Err(e) => warn!(pair = %name, error = %e, "post-reload cycle failed"),
        }
    }
}
