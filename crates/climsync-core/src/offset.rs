// ── Normal-mode setpoint computation ──
//
// `offset_setpoint` is the pure compensation formula. `plan_setpoint`
// applies it to whichever setpoint(s) the source reports, then clamps to
// the target's range and keeps a heat/cool range ordered.

use tracing::{debug, warn};

use crate::command::Setpoint;
use crate::config::SyncOptions;
use crate::model::{DeviceSnapshot, HvacMode};

/// `source_setpoint + (source_temp - target_temp) * sensitivity`
pub fn offset_setpoint(
    source_setpoint: f64,
    source_temp: f64,
    target_temp: f64,
    sensitivity: f64,
) -> f64 {
    source_setpoint + (source_temp - target_temp) * sensitivity
}

/// Setpoint to command on the target in normal mode, or `None` when the
/// source reports no setpoint at all.
pub fn plan_setpoint(
    source: &DeviceSnapshot,
    target: &DeviceSnapshot,
    options: &SyncOptions,
) -> Option<Setpoint> {
    let delta = offset_delta(source, target, options);
    let range = target.temperature_range();
    let adjust = |label: &str, sp: f64| clamp_setpoint(label, sp + delta, range);

    if source.mode == HvacMode::HeatCool {
        let mut low = source.target_temp_low.map(|sp| adjust("target_temp_low", sp));
        let mut high = source.target_temp_high.map(|sp| adjust("target_temp_high", sp));

        if let (Some(l), Some(h)) = (low, high) {
            if l > h {
                warn!(low = l, high = h, "low setpoint above high setpoint, swapping");
                (low, high) = (Some(h), Some(l));
            }
        }

        if low.is_none() && high.is_none() {
            debug!("source reports no setpoint range");
            return None;
        }
        return Some(Setpoint::Range { low, high });
    }

    let Some(sp) = source.target_temperature else {
        debug!("source reports no setpoint");
        return None;
    };
    Some(Setpoint::Single {
        temperature: adjust("temperature", sp),
    })
}

/// The additive compensation, zero when offset is off or a reading is missing.
fn offset_delta(source: &DeviceSnapshot, target: &DeviceSnapshot, options: &SyncOptions) -> f64 {
    if !options.offset_enabled {
        return 0.0;
    }
    match (source.current_temperature, target.current_temperature) {
        (Some(source_temp), Some(target_temp)) => {
            let delta = offset_setpoint(0.0, source_temp, target_temp, options.offset_sensitivity);
            debug!(
                source_temp,
                target_temp,
                sensitivity = options.offset_sensitivity,
                delta,
                "temperature offset"
            );
            delta
        }
        (source_temp, target_temp) => {
            debug!(?source_temp, ?target_temp, "offset enabled but a reading is missing");
            0.0
        }
    }
}

fn clamp_setpoint(label: &str, value: f64, (min, max): (f64, f64)) -> f64 {
    let clamped = value.max(min).min(max);
    if (clamped - value).abs() > f64::EPSILON {
        warn!(setpoint = label, value, clamped, min, max, "setpoint clamped to target range");
    }
    clamped
}
