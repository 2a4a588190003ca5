//! Mock link for testing.
//!
//! Allows injecting inbound messages and capturing transmitted commands for
//! verification.

use super::{InboundQueue, LinkError, LinkReceiver, OutboundQueue};
use async_trait::async_trait;
use mavparam_types::{InboundMessage, OutboundCommand};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Mock link for testing.
///
/// Clones share state, so a test can keep a handle after giving one to the
/// client.
#[derive(Debug, Default, Clone)]
pub struct MockLink {
    inner: Arc<Mutex<MockLinkInner>>,
}

#[derive(Debug, Default)]
struct MockLinkInner {
    inbound: Option<InboundQueue>,
    outbound: Option<OutboundQueue>,
    sent: Vec<OutboundCommand>,
    started: bool,
    stopped: bool,
    fail_next_start: Option<String>,
    hang_on_join: bool,
}

impl MockLink {
    /// Create a new mock link.
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, MockLinkInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deliver a message as if it arrived from the vehicle.
    ///
    /// Returns `false` if the link is not running.
    pub fn inject(&self, message: InboundMessage) -> bool {
        let inner = self.inner();
        match (&inner.inbound, inner.stopped) {
            (Some(queue), false) => queue.push(message).is_ok(),
            _ => false,
        }
    }

    /// Every command transmitted so far, oldest first.
    pub fn sent(&self) -> Vec<OutboundCommand> {
        let mut inner = self.inner();
        inner.collect_outbound();
        inner.sent.clone()
    }

    /// Commands transmitted since the last call.
    pub fn take_sent(&self) -> Vec<OutboundCommand> {
        let mut inner = self.inner();
        inner.collect_outbound();
        std::mem::take(&mut inner.sent)
    }

    /// Whether `start()` succeeded.
    pub fn is_started(&self) -> bool {
        self.inner().started
    }

    /// Whether `stop()` was called.
    pub fn is_stopped(&self) -> bool {
        self.inner().stopped
    }

    /// Cause the next start() to fail with the given error.
    pub fn fail_next_start(&self, error: &str) {
        self.inner().fail_next_start = Some(error.to_string());
    }

    /// Make join() run into its timeout.
    pub fn hang_on_join(&self) {
        self.inner().hang_on_join = true;
    }
}

impl MockLinkInner {
    fn collect_outbound(&mut self) {
        if let Some(queue) = &self.outbound {
            self.sent.extend(queue.drain());
        }
    }
}

#[async_trait]
impl LinkReceiver for MockLink {
    async fn start(
        &self,
        inbound: InboundQueue,
        outbound: OutboundQueue,
    ) -> Result<(), LinkError> {
        let mut inner = self.inner();

        // Check for forced failure
        if let Some(error) = inner.fail_next_start.take() {
            return Err(LinkError::StartFailed(error));
        }
        if inner.started {
            return Err(LinkError::AlreadyStarted);
        }

        inner.inbound = Some(inbound);
        inner.outbound = Some(outbound);
        inner.started = true;
        Ok(())
    }

    fn stop(&self) {
        self.inner().stopped = true;
    }

    async fn join(&self, timeout: Duration) -> Result<(), LinkError> {
        let hang = self.inner().hang_on_join;
        if hang {
            tokio::time::sleep(timeout).await;
            return Err(LinkError::JoinTimeout(timeout));
        }
        Ok(())
    }
}
