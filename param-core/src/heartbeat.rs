//! Heartbeat-based link health.
//!
//! Heartbeats are the only "link alive" signal. The monitor records when the
//! last one arrived and reports the two edges the engine cares about: the
//! link coming up and the link going stale.

use std::time::{Duration, Instant};

/// Default staleness threshold.
pub const DEFAULT_HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(4);

/// Tracks the last heartbeat and derives connect/disconnect edges.
#[derive(Debug, Clone)]
pub struct HeartbeatMonitor {
    timeout: Duration,
    last_seen: Option<Instant>,
    link_up: bool,
}

impl HeartbeatMonitor {
    /// Create a monitor that declares the link stale after `timeout` of silence.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            last_seen: None,
            link_up: false,
        }
    }

    /// Record a heartbeat.
    ///
    /// Returns `true` if this heartbeat brought the link up.
    pub fn observe(&mut self, now: Instant) -> bool {
        self.last_seen = Some(now);
        let was_up = self.link_up;
        self.link_up = true;
        !was_up
    }

    /// Check for staleness.
    ///
    /// Returns `true` exactly once per outage: on the first check after more
    /// than `timeout` has passed since the last heartbeat while the link was up.
    pub fn check(&mut self, now: Instant) -> bool {
        if !self.link_up {
            return false;
        }
        let stale = match self.last_seen {
            Some(seen) => now.saturating_duration_since(seen) > self.timeout,
            None => true,
        };
        if stale {
            self.link_up = false;
        }
        stale
    }

    /// Whether the link is currently considered alive.
    pub fn link_up(&self) -> bool {
        self.link_up
    }

    /// When the last heartbeat arrived.
    pub fn last_seen(&self) -> Option<Instant> {
        self.last_seen
    }

    /// Forget all history (engine stopped).
    pub fn reset(&mut self) {
        self.last_seen = None;
        self.link_up = false;
    }
}

impl Default for HeartbeatMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_HEARTBEAT_TIMEOUT)
    }
}
