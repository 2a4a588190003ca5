//! Decoded MAVLink messages exchanged with the vehicle.
//!
//! Only the fields the parameter-sync engine needs are carried. Anything the
//! engine does not understand arrives as [`InboundMessage::Other`] and is
//! ignored, so a newer codec can feed more message kinds without breaking it.

use serde::{Deserialize, Serialize};

use crate::{ParamType, StorageCommand, Target};

/// Messages received from the link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InboundMessage {
    /// Periodic liveness message
    Heartbeat(Heartbeat),
    /// One parameter of the vehicle's table
    ParamValue(ParamValue),
    /// Acknowledgement of a command_long
    CommandAck(CommandAck),
    /// Any other message kind
    Other {
        /// Sender identity
        source: Target,
        /// MAVLink message id
        message_id: u32,
    },
}

impl InboundMessage {
    /// Sender identity of this message.
    pub fn source(&self) -> Target {
        match self {
            InboundMessage::Heartbeat(hb) => hb.source,
            InboundMessage::ParamValue(pv) => pv.source,
            InboundMessage::CommandAck(ack) => ack.source,
            InboundMessage::Other { source, .. } => *source,
        }
    }

    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            InboundMessage::Heartbeat(_) => "HEARTBEAT",
            InboundMessage::ParamValue(_) => "PARAM_VALUE",
            InboundMessage::CommandAck(_) => "COMMAND_ACK",
            InboundMessage::Other { .. } => "OTHER",
        }
    }
}

/// HEARTBEAT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heartbeat {
    /// Sender identity
    pub source: Target,
}

impl Heartbeat {
    /// Heartbeat from the given peer.
    pub fn new(source: Target) -> Self {
        Self { source }
    }
}

/// PARAM_VALUE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamValue {
    /// Sender identity
    pub source: Target,
    /// Position of the parameter in the vehicle's table
    pub param_index: u16,
    /// Total number of parameters on the vehicle
    pub param_count: u16,
    /// Parameter name (at most 16 ASCII characters)
    pub param_id: String,
    /// Value, always transported as f32
    pub value: f32,
    /// Storage type on the vehicle
    pub param_type: ParamType,
    /// Set by the codec on the final value of a bulk transfer
    pub is_last: bool,
}

/// COMMAND_ACK.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandAck {
    /// Sender identity
    pub source: Target,
    /// Command being acknowledged
    pub command: u16,
    /// MAV_RESULT code
    pub result: u8,
}

impl CommandAck {
    /// Whether the command was accepted (MAV_RESULT_ACCEPTED).
    pub fn is_accepted(&self) -> bool {
        self.result == crate::MAV_RESULT_ACCEPTED
    }
}

/// Commands the engine asks the link to transmit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OutboundCommand {
    /// PARAM_REQUEST_LIST: fetch the whole table
    ParamRequestList {
        /// Vehicle to ask
        target: Target,
    },
    /// PARAM_REQUEST_READ by index (the id field is left empty)
    ParamRequestRead {
        /// Vehicle to ask
        target: Target,
        /// Table index to read
        index: u16,
    },
    /// PARAM_SET
    ParamSet {
        /// Vehicle to update
        target: Target,
        /// Parameter name
        param_id: String,
        /// New value
        value: f32,
        /// Storage type
        param_type: ParamType,
    },
    /// COMMAND_LONG carrying a storage subcommand
    MemoryArea {
        /// Vehicle to command
        target: Target,
        /// Subcommand and area
        command: StorageCommand,
    },
}

impl OutboundCommand {
    /// Destination of this command.
    pub fn target(&self) -> Target {
        match self {
            OutboundCommand::ParamRequestList { target }
            | OutboundCommand::ParamRequestRead { target, .. }
            | OutboundCommand::ParamSet { target, .. }
            | OutboundCommand::MemoryArea { target, .. } => *target,
        }
    }

    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            OutboundCommand::ParamRequestList { .. } => "PARAM_REQUEST_LIST",
            OutboundCommand::ParamRequestRead { .. } => "PARAM_REQUEST_READ",
            OutboundCommand::ParamSet { .. } => "PARAM_SET",
            OutboundCommand::MemoryArea { .. } => "COMMAND_LONG",
        }
    }
}
