//! Command dispatch: bridges CLI args -> controller operations -> output.

pub mod config_cmd;
pub mod pairs;
pub mod run;
pub mod state;
pub mod sync;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a command that reads the pair configuration or talks to
/// Home Assistant.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Run => run::handle(global).await,
        Command::Sync(args) => sync::handle(args, global).await,
        Command::Pairs => pairs::handle(global),
        Command::State(args) => state::handle(args, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
