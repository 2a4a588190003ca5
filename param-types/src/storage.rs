//! Non-volatile memory-area operations (preflight storage command family).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::TypesError;

/// MAV_CMD_PREFLIGHT_STORAGE.
pub const MAV_CMD_PREFLIGHT_STORAGE: u16 = 245;

/// MAV_CMD_PREFLIGHT_STORAGE_ADVANCED (MatrixPilot dialect).
///
/// Used for area-specific write/read/clear requests.
pub const MAV_CMD_PREFLIGHT_STORAGE_ADVANCED: u16 = 0;

/// MAV_RESULT_ACCEPTED.
pub const MAV_RESULT_ACCEPTED: u8 = 0;

/// Whether a command id belongs to the preflight storage family.
pub fn is_storage_command(command: u16) -> bool {
    command == MAV_CMD_PREFLIGHT_STORAGE || command == MAV_CMD_PREFLIGHT_STORAGE_ADVANCED
}

/// What to do with a memory area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemoryAreaAction {
    /// Persist the area from RAM to non-volatile storage.
    Write,
    /// Load the area from non-volatile storage into RAM.
    Read,
    /// Erase the persisted area.
    Clear,
}

impl MemoryAreaAction {
    /// MAV_PFS_CMD subcommand code for this action.
    pub fn subcommand(self) -> u8 {
        match self {
            MemoryAreaAction::Read => 3,  // MAV_PFS_CMD_READ_SPECIFIC
            MemoryAreaAction::Write => 4, // MAV_PFS_CMD_WRITE_SPECIFIC
            MemoryAreaAction::Clear => 5, // MAV_PFS_CMD_CLEAR_SPECIFIC
        }
    }
}

impl fmt::Display for MemoryAreaAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MemoryAreaAction::Write => "write",
            MemoryAreaAction::Read => "read",
            MemoryAreaAction::Clear => "clear",
        };
        f.write_str(name)
    }
}

impl FromStr for MemoryAreaAction {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "write" => Ok(MemoryAreaAction::Write),
            "read" | "load" => Ok(MemoryAreaAction::Read),
            "clear" => Ok(MemoryAreaAction::Clear),
            _ => Err(TypesError::UnknownAction(s.to_string())),
        }
    }
}

/// A memory-area operation requested by the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryAreaRequest {
    /// Area identifier on the vehicle.
    pub area_id: u8,
    /// Operation to perform.
    pub action: MemoryAreaAction,
}

impl MemoryAreaRequest {
    /// Create a new request.
    pub fn new(action: MemoryAreaAction, area_id: u8) -> Self {
        Self { area_id, action }
    }
}

/// Outcome of a memory-area operation, delivered to the parameter store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryAreaResult {
    /// Operation that was acknowledged.
    pub action: MemoryAreaAction,
    /// Area the operation targeted.
    pub area_id: u8,
    /// Vehicle-defined result code (MAV_RESULT).
    pub result: u8,
}

impl MemoryAreaResult {
    /// Whether the vehicle accepted the operation.
    pub fn is_accepted(&self) -> bool {
        self.result == MAV_RESULT_ACCEPTED
    }
}

/// Payload of a storage command_long.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageCommand {
    /// Requested action.
    pub action: MemoryAreaAction,
    /// Area identifier.
    pub area_id: u8,
}

impl StorageCommand {
    /// Command id this payload is sent with.
    pub fn command_id(&self) -> u16 {
        MAV_CMD_PREFLIGHT_STORAGE_ADVANCED
    }

    /// The seven command_long parameters; unused slots are zero.
    pub fn command_long_params(&self) -> [f32; 7] {
        [
            f32::from(self.action.subcommand()),
            f32::from(self.area_id),
            0.0,
            0.0,
            0.0,
            0.0,
            0.0,
        ]
    }
}

impl From<MemoryAreaRequest> for StorageCommand {
    fn from(request: MemoryAreaRequest) -> Self {
        Self {
            action: request.action,
            area_id: request.area_id,
        }
    }
}
