//! # mavparam-types
//!
//! Message and identity types for the mavparam parameter-sync client.
//!
//! This crate provides the foundational types used across all mavparam crates:
//! - [`Target`] - System/component identity of a MAVLink peer
//! - [`InboundMessage`] - Decoded messages the sync engine understands
//! - [`OutboundCommand`] - Commands the sync engine asks the link to send
//! - [`ParamType`], [`ParamValue`] - Parameter representation on the wire
//! - [`MemoryAreaAction`], [`StorageCommand`], [`MemoryAreaResult`] - Non-volatile area operations
//! - [`TypesError`] - Error types
//!
//! The bit layout of the underlying MAVLink messages is owned by the codec
//! library sitting below the link; these types only carry the decoded fields.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod ids;
mod messages;
mod params;
mod storage;

pub use error::TypesError;
pub use ids::Target;
pub use messages::{CommandAck, Heartbeat, InboundMessage, OutboundCommand, ParamValue};
pub use params::{validate_param_id, ParamType, MAX_PARAM_ID_LEN};
pub use storage::{
    is_storage_command, MemoryAreaAction, MemoryAreaRequest, MemoryAreaResult, StorageCommand,
    MAV_CMD_PREFLIGHT_STORAGE, MAV_CMD_PREFLIGHT_STORAGE_ADVANCED, MAV_RESULT_ACCEPTED,
};
