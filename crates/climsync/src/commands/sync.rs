//! `climsync sync`: one reconciliation cycle per pair, then exit.

use serde::Serialize;
use tabled::Tabled;

use climsync_core::{Controller, CoreError, CycleOutcome, DeviceCommand, PairResult, Transition, Trigger};

use crate::cli::{GlobalOpts, SyncArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

/// Serializable view of one pair's cycle.
#[derive(Debug, Serialize)]
struct SyncResult {
    pair: String,
    status: &'static str,
    #[serde(flatten)]
    transition: Option<Transition>,
    commands: Vec<DeviceCommand>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<&PairResult> for SyncResult {
    fn from((pair, result): &PairResult) -> Self {
        let (status, transition, commands, error) = match result {
            Ok(CycleOutcome::Completed(report)) => (
                "completed",
                Some(report.transition),
                report.commands.clone(),
                None,
            ),
            Ok(CycleOutcome::Skipped) => ("skipped", None, Vec::new(), None),
            Ok(CycleOutcome::Ignored) => ("ignored", None, Vec::new(), None),
            Err(e) => ("failed", None, Vec::new(), Some(e.to_string())),
        };
        Self {
            pair: pair.clone(),
            status,
            transition,
            commands,
            error,
        }
    }
}

#[derive(Tabled)]
struct SyncRow {
    #[tabled(rename = "Pair")]
    pair: String,
    #[tabled(rename = "Status")]
    status: &'static str,
    #[tabled(rename = "Transition")]
    transition: String,
    #[tabled(rename = "Commands")]
    commands: String,
}

impl SyncRow {
    fn new(r: &SyncResult) -> Self {
        let commands = match r.error {
            Some(ref e) => e.clone(),
            None if r.commands.is_empty() => "-".into(),
            None => r
                .commands
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("\n"),
        };
        Self {
            pair: r.pair.clone(),
            status: r.status,
            transition: r
                .transition
                .map_or_else(|| "-".to_owned(), |t| t.to_string()),
            commands,
        }
    }
}

pub async fn handle(args: SyncArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load(global)?;

    if let Some(ref name) = args.pair {
        if !cfg.pairs.contains_key(name) {
            return Err(CoreError::PairNotFound { name: name.clone() }.into());
        }
    }

    let controller_config = config::controller_config(global, &cfg)?;
    let results = Controller::oneshot(&controller_config, |controller| async move {
        Ok(match args.pair {
            Some(name) => {
                let result = controller.sync_pair(&name, Trigger::Manual).await;
                vec![(name, result)]
            }
            None => controller.sync_all(Trigger::Manual).await,
        })
    })
    .await?;

    let rows: Vec<SyncResult> = results.iter().map(SyncResult::from).collect();
    let out = output::render_list(global.output, &rows, SyncRow::new)?;
    output::print_output(&out, global.quiet);

    let total = results.len();
    let mut failures: Vec<CoreError> = results.into_iter().filter_map(|(_, r)| r.err()).collect();
    match failures.len() {
        0 => Ok(()),
        1 if total == 1 => Err(failures.remove(0).into()),
        failed => Err(CliError::SyncFailed { failed, total }),
    }
}
