//! Deadline and attempt tracking for campaigns awaiting replies.

use std::time::{Duration, Instant};

/// Default number of deadline expiries before a campaign is abandoned.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// What to do after a deadline expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    /// Try the step again; the deadline has been re-armed.
    Retry,
    /// The attempt budget is exhausted.
    GiveUp,
}

/// Retry deadline plus attempt counter.
///
/// Reset whenever progress is observed, incremented on each expiry.
#[derive(Debug, Clone)]
pub struct RetryCounter {
    deadline: Option<Instant>,
    attempts: u32,
    max_attempts: u32,
}

impl RetryCounter {
    /// Create an idle counter.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            deadline: None,
            attempts: 0,
            max_attempts,
        }
    }

    /// Start a new campaign: zero attempts, deadline `window` from now.
    pub fn arm(&mut self, now: Instant, window: Duration) {
        self.attempts = 0;
        self.deadline = Some(now + window);
    }

    /// Set the deadline without touching the attempt count.
    pub fn set_deadline(&mut self, now: Instant, window: Duration) {
        self.deadline = Some(now + window);
    }

    /// Progress observed: zero attempts and push the deadline out.
    pub fn extend(&mut self, now: Instant, window: Duration) {
        self.arm(now, window);
    }

    /// Whether the deadline has passed.
    pub fn is_expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now > deadline)
    }

    /// Count one expiry and decide.
    ///
    /// On [`RetryOutcome::Retry`] the deadline is re-armed `window` from now.
    /// On [`RetryOutcome::GiveUp`] the counter is disarmed.
    pub fn record_expiry(&mut self, now: Instant, window: Duration) -> RetryOutcome {
        self.attempts = self.attempts.saturating_add(1);
        if self.attempts >= self.max_attempts {
            self.deadline = None;
            RetryOutcome::GiveUp
        } else {
            self.deadline = Some(now + window);
            RetryOutcome::Retry
        }
    }

    /// Stop tracking a deadline.
    pub fn disarm(&mut self) {
        self.deadline = None;
        self.attempts = 0;
    }

    /// Expiries counted since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Attempt budget.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Current deadline, if armed.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

impl Default for RetryCounter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}
