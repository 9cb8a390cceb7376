// ── State change notifications ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::climate::HvacAction;
use super::entity_id::EntityId;

/// A state change reported for one entity.
///
/// Carries only what the router and the notification filter need; the
/// engine re-reads full snapshots of both devices regardless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateChange {
    pub entity_id: EntityId,
    /// New primary state, `None` when the entity was removed.
    pub new_state: Option<String>,
    pub old_state: Option<String>,
    pub hvac_action: Option<HvacAction>,
    pub changed_at: Option<DateTime<Utc>>,
}

impl StateChange {
    /// `false` when the entity went away or reports no usable state.
    pub fn is_available(&self) -> bool {
        self.new_state
            .as_deref()
            .is_some_and(|s| !matches!(s, "unavailable" | "unknown"))
    }
}
