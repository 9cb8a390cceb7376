// ── Device proxy seam ──
//
// The engine never talks to Home Assistant directly. It reads snapshots,
// issues commands and receives notifications through this trait, which
// the Home Assistant adapter and the test doubles implement.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::command::DeviceCommand;
use crate::error::CoreError;
use crate::model::{DeviceSnapshot, EntityId, StateChange};

/// Reads device state, applies commands, and streams state changes.
#[async_trait]
pub trait DeviceProxy: Send + Sync {
    /// Current attributes of `entity_id`.
    ///
    /// Fails with [`CoreError::DeviceUnavailable`] when the device cannot
    /// be read or reports no usable state.
    async fn snapshot(&self, entity_id: &EntityId) -> Result<DeviceSnapshot, CoreError>;

    /// Apply one command and wait for the acknowledgement.
    ///
    /// Fails with [`CoreError::CommandFailed`] when the device rejects the
    /// command or the call times out.
    async fn command(&self, entity_id: &EntityId, command: &DeviceCommand)
    -> Result<(), CoreError>;

    /// Notifications for every entity the proxy observes, in arrival order.
    /// Consumers filter on the entity they care about.
    fn subscribe(&self) -> broadcast::Receiver<Arc<StateChange>>;
}
