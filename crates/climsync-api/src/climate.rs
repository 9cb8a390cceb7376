// Climate service calls
//
// Typed wrappers over `climate.*` services. Each call blocks until Home
// Assistant has executed the service, which is the acknowledgement the
// reconciliation engine waits for.

use serde::Serialize;
use tracing::debug;

use crate::client::HassClient;
use crate::error::Error;
use crate::models::TemperatureTarget;

const CLIMATE_DOMAIN: &str = "climate";

#[derive(Serialize)]
struct EntityPayload<'a, T: Serialize> {
    entity_id: &'a str,
    #[serde(flatten)]
    data: T,
}

#[derive(Serialize)]
struct HvacModeData<'a> {
    hvac_mode: &'a str,
}

#[derive(Serialize)]
struct FanModeData<'a> {
    fan_mode: &'a str,
}

#[derive(Serialize)]
struct SwingModeData<'a> {
    swing_mode: &'a str,
}

impl HassClient {
    /// `climate.set_hvac_mode`
    pub async fn set_hvac_mode(&self, entity_id: &str, hvac_mode: &str) -> Result<(), Error> {
        debug!(entity_id, hvac_mode, "set_hvac_mode");
        self.climate_service(entity_id, "set_hvac_mode", HvacModeData { hvac_mode })
            .await
    }

    /// `climate.set_temperature` with either a single setpoint or a range.
    pub async fn set_temperature(
        &self,
        entity_id: &str,
        target: &TemperatureTarget,
    ) -> Result<(), Error> {
        debug!(entity_id, ?target, "set_temperature");
        self.climate_service(entity_id, "set_temperature", target).await
    }

    /// `climate.set_fan_mode`
    pub async fn set_fan_mode(&self, entity_id: &str, fan_mode: &str) -> Result<(), Error> {
        debug!(entity_id, fan_mode, "set_fan_mode");
        self.climate_service(entity_id, "set_fan_mode", FanModeData { fan_mode })
            .await
    }

    /// `climate.set_swing_mode`
    pub async fn set_swing_mode(&self, entity_id: &str, swing_mode: &str) -> Result<(), Error> {
        debug!(entity_id, swing_mode, "set_swing_mode");
        self.climate_service(entity_id, "set_swing_mode", SwingModeData { swing_mode })
            .await
    }

    async fn climate_service<T: Serialize>(
        &self,
        entity_id: &str,
        service: &str,
        data: T,
    ) -> Result<(), Error> {
        let body = EntityPayload { entity_id, data };
        self.call_service(CLIMATE_DOMAIN, service, &body).await?;
        Ok(())
    }
}
