//! Tunables for the sync engine.
//!
//! Every field has a default, so an empty TOML table is a valid
//! configuration. Loading from disk lives in `param-client`.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use mavparam_types::Target;

/// Sync engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// System id of the vehicle to synchronise with (default: 1).
    #[serde(default = "default_target_system")]
    pub target_system: u8,
    /// Component id of the vehicle to synchronise with (default: 1).
    #[serde(default = "default_target_component")]
    pub target_component: u8,
    /// Maximum time the loop blocks on the inbound queue (default: 100ms).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Heartbeat silence after which the link is declared down (default: 4s).
    #[serde(default = "default_heartbeat_timeout_ms")]
    pub heartbeat_timeout_ms: u64,
    /// Deadline for the bulk parameter transfer (default: 3s).
    #[serde(default = "default_read_all_timeout_ms")]
    pub read_all_timeout_ms: u64,
    /// Deadline for a single parameter reply (default: 2s).
    #[serde(default = "default_reply_timeout_ms")]
    pub reply_timeout_ms: u64,
    /// Deadline expiries before a campaign is given up (default: 3).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Deadline for a memory-area acknowledgement (default: 5s).
    #[serde(default = "default_memory_area_timeout_ms")]
    pub memory_area_timeout_ms: u64,
    /// Inbound queue capacity, oldest dropped on overflow (default: 20).
    #[serde(default = "default_inbound_capacity")]
    pub inbound_capacity: usize,
    /// Outbound queue capacity, new commands rejected on overflow (default: 3).
    #[serde(default = "default_outbound_capacity")]
    pub outbound_capacity: usize,
    /// Pending external requests the engine buffers (default: 8).
    #[serde(default = "default_request_capacity")]
    pub request_capacity: usize,
    /// Bounded wait for the engine and link to terminate (default: 5s).
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
}

// Default value functions
fn default_target_system() -> u8 {
    1
}

fn default_target_component() -> u8 {
    1 // MAV_COMP_ID_AUTOPILOT1
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_heartbeat_timeout_ms() -> u64 {
    4000
}

fn default_read_all_timeout_ms() -> u64 {
    3000
}

fn default_reply_timeout_ms() -> u64 {
    2000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_memory_area_timeout_ms() -> u64 {
    5000
}

fn default_inbound_capacity() -> usize {
    20
}

fn default_outbound_capacity() -> usize {
    3
}

fn default_request_capacity() -> usize {
    8
}

fn default_shutdown_timeout_ms() -> u64 {
    5000
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            target_system: default_target_system(),
            target_component: default_target_component(),
            poll_interval_ms: default_poll_interval_ms(),
            heartbeat_timeout_ms: default_heartbeat_timeout_ms(),
            read_all_timeout_ms: default_read_all_timeout_ms(),
            reply_timeout_ms: default_reply_timeout_ms(),
            max_attempts: default_max_attempts(),
            memory_area_timeout_ms: default_memory_area_timeout_ms(),
            inbound_capacity: default_inbound_capacity(),
            outbound_capacity: default_outbound_capacity(),
            request_capacity: default_request_capacity(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
        }
    }
}

impl SyncConfig {
    /// Configuration for the given vehicle, defaults elsewhere.
    pub fn for_target(target: Target) -> Self {
        Self {
            target_system: target.system_id,
            target_component: target.component_id,
            ..Self::default()
        }
    }

    /// Vehicle identity the engine accepts parameters from.
    pub fn target(&self) -> Target {
        Target::new(self.target_system, self.target_component)
    }

    /// Poll timeout of the engine loop.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Heartbeat staleness threshold.
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.heartbeat_timeout_ms)
    }

    /// Bulk transfer deadline.
    pub fn read_all_timeout(&self) -> Duration {
        Duration::from_millis(self.read_all_timeout_ms)
    }

    /// Single reply deadline.
    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }

    /// Memory-area acknowledgement deadline.
    pub fn memory_area_timeout(&self) -> Duration {
        Duration::from_millis(self.memory_area_timeout_ms)
    }

    /// Shutdown wait bound.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Check values that would make the engine unusable.
    ///
    /// Returns a description of the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if self.inbound_capacity == 0 {
            return Err("inbound_capacity must be at least 1".into());
        }
        if self.outbound_capacity == 0 {
            return Err("outbound_capacity must be at least 1".into());
        }
        if self.request_capacity == 0 {
            return Err("request_capacity must be at least 1".into());
        }
        if self.max_attempts == 0 {
            return Err("max_attempts must be at least 1".into());
        }
        if self.poll_interval_ms == 0 {
            return Err("poll_interval_ms must be at least 1".into());
        }
        Ok(())
    }
}
