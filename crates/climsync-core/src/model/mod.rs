// ── Domain model ──

pub mod climate;
pub mod entity_id;
pub mod event;

pub use climate::{
    DEFAULT_MAX_TEMP, DEFAULT_MIN_TEMP, DeviceSnapshot, HvacAction, HvacMode, SupportedFeatures,
};
pub use entity_id::EntityId;
pub use event::StateChange;
