//! Config subcommand handlers.

use std::collections::BTreeMap;

use dialoguer::{Confirm, Input, Select};
use secrecy::{ExposeSecret, SecretString};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::config::{self, Config, HomeAssistant, PairEntry};
use crate::error::CliError;
use crate::output;

const REDACTED: &str = "********";

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&config::active_path(global).display().to_string(), global.quiet);
            Ok(())
        }
        ConfigCommand::Show => show(global),
        ConfigCommand::Init => init(global),
        ConfigCommand::SetToken => set_token(global),
    }
}

// ── Show ────────────────────────────────────────────────────────────

fn show(global: &GlobalOpts) -> Result<(), CliError> {
    let mut cfg = config::load(global)?;
    if cfg.homeassistant.token.is_some() {
        cfg.homeassistant.token = Some(REDACTED.into());
    }

    let out = match global.output {
        OutputFormat::Table => toml::to_string_pretty(&cfg)?,
        format => output::render_single(format, &cfg, |_| String::new())?,
    };
    output::print_output(out.trim_end(), global.quiet);
    Ok(())
}

// ── Init: interactive wizard ────────────────────────────────────────

fn init(global: &GlobalOpts) -> Result<(), CliError> {
    let path = config::active_path(global);
    eprintln!("climsync configuration wizard");
    eprintln!("   Config path: {}\n", path.display());

    if path.exists() {
        let overwrite = Confirm::new()
            .with_prompt("A config file already exists. Overwrite it?")
            .default(false)
            .interact()
            .map_err(prompt_err)?;
        if !overwrite {
            return Ok(());
        }
    }

    // 1. Connection
    let url: String = Input::new()
        .with_prompt("Home Assistant URL")
        .default(HomeAssistant::default().url)
        .interact_text()
        .map_err(prompt_err)?;

    let token = rpassword::prompt_password("Long-lived access token: ").map_err(prompt_err)?;
    if token.trim().is_empty() {
        return Err(CliError::Validation {
            field: "token".into(),
            reason: "access token cannot be empty".into(),
        });
    }

    let store_choices = &[
        "Store in system keyring (recommended)",
        "Save to config file (plaintext)",
    ];
    let store_selection = Select::new()
        .with_prompt("Where to store the token?")
        .items(store_choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    let plaintext_token = if store_selection == 0 {
        climsync_config::store_token(&token)?;
        eprintln!("   Token stored in system keyring");
        None
    } else {
        Some(token)
    };

    // 2. First pair
    let name: String = Input::new()
        .with_prompt("Pair name")
        .default("living_room".into())
        .interact_text()
        .map_err(prompt_err)?;
    let source: String = Input::new()
        .with_prompt("Source thermostat entity")
        .interact_text()
        .map_err(prompt_err)?;
    let target: String = Input::new()
        .with_prompt("Target climate entity")
        .interact_text()
        .map_err(prompt_err)?;

    let mut pairs = BTreeMap::new();
    pairs.insert(
        name,
        PairEntry {
            source,
            target,
            offset_enabled: None,
            offset_sensitivity: None,
            boost_enabled: None,
        },
    );

    let cfg = Config {
        homeassistant: HomeAssistant {
            url,
            token: plaintext_token,
            ..HomeAssistant::default()
        },
        defaults: climsync_config::Defaults::default(),
        pairs,
    };

    // 3. Validate before writing anything
    cfg.validated_pairs()?;
    climsync_config::save_config_to(&cfg, &path)?;

    output::success(global, &format!("Configuration written to {}", path.display()));
    eprintln!("\n  Test it: climsync sync");
    Ok(())
}

// ── SetToken ────────────────────────────────────────────────────────

fn set_token(global: &GlobalOpts) -> Result<(), CliError> {
    let token = match global.token {
        Some(ref token) => SecretString::from(token.clone()),
        None => SecretString::from(
            rpassword::prompt_password("Long-lived access token: ").map_err(prompt_err)?,
        ),
    };

    if token.expose_secret().trim().is_empty() {
        return Err(CliError::Validation {
            field: "token".into(),
            reason: "access token cannot be empty".into(),
        });
    }

    climsync_config::store_token(token.expose_secret())?;
    output::success(global, "Token stored in system keyring");
    Ok(())
}
