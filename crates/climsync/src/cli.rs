//! Clap derive structures for the `climsync` CLI.
//!
//! Shared with build.rs for man page generation, so this module may only
//! depend on `clap` and `clap_complete`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// climsync -- keep a climate device in step with a reference thermostat
#[derive(Debug, Parser)]
#[command(
    name = "climsync",
    version,
    about = "Mirror a Home Assistant thermostat onto a second climate device",
    long_about = "Keeps a target climate device (e.g. a mini-split) reconciled with a\n\
        source thermostat: mode and setpoint follow the source, the setpoint is\n\
        offset by the difference between the two room readings, and the target\n\
        is boosted while the source is actively heating or cooling.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, short = 'c', env = "CLIMSYNC_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Home Assistant URL (overrides the config file)
    #[arg(long, env = "CLIMSYNC_URL", global = true)]
    pub url: Option<String>,

    /// Long-lived access token
    #[arg(long, env = "CLIMSYNC_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "CLIMSYNC_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Reconcile every pair continuously until interrupted
    ///
    /// Runs a startup cycle, then reacts to source state changes and
    /// resyncs on the configured interval. SIGHUP reloads the pairs.
    Run,

    /// Run one reconciliation cycle and exit
    Sync(SyncArgs),

    /// List configured pairs and their effective options
    #[command(alias = "ls")]
    Pairs,

    /// Show the current state of a climate entity
    State(StateArgs),

    /// Manage configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct SyncArgs {
    /// Only sync this pair
    #[arg(long, short = 'p')]
    pub pair: Option<String>,
}

#[derive(Debug, Args)]
pub struct StateArgs {
    /// Entity ID (e.g. climate.living_room)
    pub entity_id: String,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file location
    Path,

    /// Display the resolved configuration (token redacted)
    Show,

    /// Create the config file with guided setup
    Init,

    /// Store the access token in the system keyring
    SetToken,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
