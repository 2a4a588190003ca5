//! Identity types for MAVLink peers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// System and component id pair identifying one MAVLink endpoint.
///
/// Used both as the engine's configured target and as the source identity
/// stamped on every inbound message.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    /// MAVLink system id (vehicle).
    pub system_id: u8,
    /// MAVLink component id within the system.
    pub component_id: u8,
}

impl Target {
    /// Create a new target identity.
    pub const fn new(system_id: u8, component_id: u8) -> Self {
        Self {
            system_id,
            component_id,
        }
    }
}

impl Default for Target {
    /// System 1, component 1 (MAV_COMP_ID_AUTOPILOT1).
    fn default() -> Self {
        Self::new(1, 1)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.system_id, self.component_id)
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Target({}/{})", self.system_id, self.component_id)
    }
}
