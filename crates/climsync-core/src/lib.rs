//! Reconciliation engine that mirrors one climate device onto another.
//!
//! - **[`SyncEngine`]**: One per source → target pair. Each cycle re-reads
//!   both devices through the [`DeviceProxy`], lets the boost state machine
//!   ([`boost`]) pick a transition, and issues commands strictly in order.
//!   A non-blocking guard drops notifications that arrive mid-cycle.
//!
//! - **[`Controller`]**: Hosts every pair of a process: routes source
//!   notifications, runs startup and periodic resync cycles, and applies
//!   configuration changes (drain, then reset boost state when a pair's
//!   devices change).
//!
//! - **[`offset`]**: Normal-mode setpoint compensation and clamping.
//!
//! - **[`HassProxy`]**: The Home Assistant [`DeviceProxy`]: REST reads and
//!   service calls, `state_changed` notifications over the WebSocket API.

pub mod boost;
pub mod command;
pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod hass;
pub mod model;
pub mod offset;
pub mod proxy;

// ── Primary re-exports ──────────────────────────────────────────────
pub use boost::{BoostDirection, BoostState, SavedAuxiliary};
pub use command::{DeviceCommand, Setpoint};
pub use config::{ControllerConfig, HassConfig, PairConfig, SyncOptions, TlsVerification};
pub use controller::{Controller, PairChanges, PairResult};
pub use engine::{CycleOutcome, CycleReport, SyncEngine, Transition, Trigger};
pub use error::CoreError;
pub use hass::HassProxy;
pub use model::{DeviceSnapshot, EntityId, HvacAction, HvacMode, StateChange, SupportedFeatures};
pub use proxy::DeviceProxy;
