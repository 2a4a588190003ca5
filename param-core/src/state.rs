//! Connection state and the vocabulary of the sync state machine.
//!
//! [`ConnectionState`] is a closed enum: every dispatch on it is an
//! exhaustive `match`, so adding a state is a compile error everywhere it
//! has to be handled. The machine itself lives in [`crate::machine`]; this
//! module only defines what goes in and what comes out.

use std::fmt;

use mavparam_types::{MemoryAreaAction, MemoryAreaRequest, MemoryAreaResult, OutboundCommand};
use thiserror::Error;

/// Connection and campaign state of the sync engine.
///
/// Exactly one value at any time, owned by the engine loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// Engine not running.
    #[default]
    NotStarted,
    /// Running, no heartbeat seen (or heartbeat went stale).
    NotConnected,
    /// Link up and quiescent; the only state that accepts requests.
    Connected,
    /// About to clear sync flags and fetch the whole table.
    ReadAll,
    /// Waiting for the bulk transfer to finish.
    ReadingAll,
    /// About to look for the next out-of-sync parameter.
    ReadMissing,
    /// Waiting for a single re-requested parameter.
    ReadingMissing,
    /// About to send the next changed parameter.
    WriteChanged,
    /// Waiting for the vehicle to echo the written parameter.
    WritingChanged,
    /// About to send a write-area command.
    WriteMemArea,
    /// Waiting for the write-area acknowledgement.
    WritingMemArea,
    /// About to send a read-area command.
    LoadMemArea,
    /// Waiting for the read-area acknowledgement.
    LoadingMemArea,
    /// About to send a clear-area command.
    ClearMemArea,
    /// Waiting for the clear-area acknowledgement.
    ClearingMemArea,
}

impl ConnectionState {
    /// Quiescent: connected with no campaign in flight.
    pub fn is_quiescent(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// States that wait for a reply and therefore carry a deadline.
    pub fn is_awaiting_reply(&self) -> bool {
        matches!(
            self,
            Self::ReadingAll
                | Self::ReadingMissing
                | Self::WritingChanged
                | Self::WritingMemArea
                | Self::LoadingMemArea
                | Self::ClearingMemArea
        )
    }

    /// The campaign this state belongs to, if any.
    pub fn campaign(&self) -> Option<Campaign> {
        match self {
            Self::NotStarted | Self::NotConnected | Self::Connected => None,
            Self::ReadAll | Self::ReadingAll | Self::ReadMissing | Self::ReadingMissing => {
                Some(Campaign::ReadAll)
            }
            Self::WriteChanged | Self::WritingChanged => Some(Campaign::WriteChanged),
            Self::WriteMemArea | Self::WritingMemArea => {
                Some(Campaign::MemoryArea(MemoryAreaAction::Write))
            }
            Self::LoadMemArea | Self::LoadingMemArea => {
                Some(Campaign::MemoryArea(MemoryAreaAction::Read))
            }
            Self::ClearMemArea | Self::ClearingMemArea => {
                Some(Campaign::MemoryArea(MemoryAreaAction::Clear))
            }
        }
    }

    /// Entry state of a memory-area campaign.
    pub fn for_memory_area(action: MemoryAreaAction) -> Self {
        match action {
            MemoryAreaAction::Write => Self::WriteMemArea,
            MemoryAreaAction::Read => Self::LoadMemArea,
            MemoryAreaAction::Clear => Self::ClearMemArea,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotStarted => "NOT_STARTED",
            Self::NotConnected => "NOT_CONNECTED",
            Self::Connected => "CONNECTED",
            Self::ReadAll => "READ_ALL",
            Self::ReadingAll => "READING_ALL",
            Self::ReadMissing => "READ_MISSING",
            Self::ReadingMissing => "READING_MISSING",
            Self::WriteChanged => "WRITE_CHANGED",
            Self::WritingChanged => "WRITING_CHANGED",
            Self::WriteMemArea => "WRITE_MEM_AREA",
            Self::WritingMemArea => "WRITING_MEM_AREA",
            Self::LoadMemArea => "LOAD_MEM_AREA",
            Self::LoadingMemArea => "LOADING_MEM_AREA",
            Self::ClearMemArea => "CLEAR_MEM_AREA",
            Self::ClearingMemArea => "CLEARING_MEM_AREA",
        };
        f.write_str(name)
    }
}

/// A multi-step protocol operation spanning several poll cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Campaign {
    /// Bulk read followed by missing-parameter repair.
    ReadAll,
    /// Write every changed parameter.
    WriteChanged,
    /// One write/read/clear of a memory area.
    MemoryArea(MemoryAreaAction),
}

impl fmt::Display for Campaign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Campaign::ReadAll => f.write_str("read-all"),
            Campaign::WriteChanged => f.write_str("write-changed"),
            Campaign::MemoryArea(action) => write!(f, "memory-area {}", action),
        }
    }
}

/// External triggers, sampled by the engine at the start of a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    /// Re-read the whole parameter table.
    Refresh,
    /// Push every locally changed parameter to the vehicle.
    WriteChanged,
    /// Write/read/clear a memory area.
    MemoryArea(MemoryAreaRequest),
    /// Forget that the store is synchronised.
    InvalidateSync,
}

impl Request {
    /// The campaign this request starts; `None` for flag-only requests.
    pub fn campaign(&self) -> Option<Campaign> {
        match self {
            Request::Refresh => Some(Campaign::ReadAll),
            Request::WriteChanged => Some(Campaign::WriteChanged),
            Request::MemoryArea(area) => Some(Campaign::MemoryArea(area.action)),
            Request::InvalidateSync => None,
        }
    }
}

/// Why a request was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RequestError {
    /// Requests are only accepted while quiescent.
    #[error("engine busy or disconnected (state: {state})")]
    NotQuiescent {
        /// State at the time of the request.
        state: ConnectionState,
    },
    /// A memory-area operation is already in flight.
    #[error("memory-area operation already pending")]
    AreaOperationPending,
}

/// Notifications emitted to the application layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// First heartbeat after being disconnected.
    Connected,
    /// Heartbeat went stale; any campaign was abandoned.
    Disconnected {
        /// Campaign that was in flight, if any.
        abandoned: Option<Campaign>,
    },
    /// Every parameter is in sync after a campaign.
    SyncComplete {
        /// Campaign that finished.
        campaign: Campaign,
    },
    /// A campaign ran out of retries.
    SyncAbandoned {
        /// Campaign that was given up.
        campaign: Campaign,
        /// Deadline expiries counted.
        attempts: u32,
    },
    /// A memory-area operation was acknowledged.
    MemoryAreaCompleted(MemoryAreaResult),
    /// No acknowledgement arrived for a memory-area operation.
    MemoryAreaTimedOut(MemoryAreaRequest),
    /// A request went stale between submission and the engine seeing it.
    RequestRejected {
        /// The request that was dropped.
        request: Request,
        /// Why the machine refused it.
        reason: RequestError,
    },
}

/// Instructions returned by the state machine.
///
/// The runtime interprets these; the machine itself performs no I/O.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Hand a command to the outbound queue.
    Send(OutboundCommand),
    /// Publish an event to the application.
    Emit(EngineEvent),
}
