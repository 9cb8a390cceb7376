//! `climsync state <entity_id>`: one Device Snapshot, read over REST.

use tokio_util::sync::CancellationToken;

use climsync_core::{DeviceProxy, DeviceSnapshot, EntityId, HassProxy};

use crate::cli::{GlobalOpts, StateArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

pub async fn handle(args: StateArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let entity_id = EntityId::from(args.entity_id.as_str());
    if entity_id.is_empty() || entity_id.domain().is_none() {
        return Err(CliError::Validation {
            field: "entity_id".into(),
            reason: format!("expected <domain>.<object_id>, got '{}'", args.entity_id),
        });
    }

    let cfg = config::load(global)?;
    let mut hass = config::hass_config(global, &cfg)?;
    hass.websocket_enabled = false;

    let proxy = HassProxy::connect(&hass, CancellationToken::new()).await?;
    let result = proxy.snapshot(&entity_id).await;
    proxy.shutdown();
    let snapshot = result?;

    let out = output::render_single(global.output, &snapshot, detail)?;
    output::print_output(&out, global.quiet);
    Ok(())
}

fn detail(s: &DeviceSnapshot) -> String {
    let temp = |v: Option<f64>| v.map_or_else(|| "-".to_owned(), |t| t.to_string());
    let text = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".into());
    let list = |v: &[String]| if v.is_empty() { "-".to_owned() } else { v.join(", ") };

    let (min, max) = s.temperature_range();
    output::render_fields(&[
        ("entity", s.entity_id.to_string()),
        ("mode", s.mode.to_string()),
        (
            "action",
            s.hvac_action.map_or_else(|| "-".to_owned(), |a| a.to_string()),
        ),
        ("current", temp(s.current_temperature)),
        ("target", temp(s.target_temperature)),
        (
            "target range",
            format!("{}..{}", temp(s.target_temp_low), temp(s.target_temp_high)),
        ),
        ("limits", format!("{min}..{max}")),
        ("fan", text(&s.fan_mode)),
        ("fan modes", list(&s.fan_modes)),
        ("swing", text(&s.swing_mode)),
        ("swing modes", list(&s.swing_modes)),
        ("features", s.supported_features.0.to_string()),
    ])
}
