//! Link abstraction for mavparam.
//!
//! A link receiver owns the physical (or simulated) connection to the
//! vehicle. It runs on its own task and talks to the engine only through
//! the two bounded queues:
//! - decoded inbound messages are pushed onto the inbound queue
//! - commands pushed by the engine are drained from the outbound queue
//!
//! # Design
//!
//! The trait is async and task-oriented:
//! - `start()` begins receiving and transmitting
//! - `stop()` asks the task to finish (non-blocking)
//! - `join()` waits for it, bounded by a timeout
//!
//! # Example
//!
//! ```ignore
//! let link = MockLink::new();
//! link.start(inbound.clone(), outbound.clone()).await?;
//! link.inject(InboundMessage::Heartbeat(Heartbeat::new(Target::default())));
//! link.stop();
//! link.join(Duration::from_secs(5)).await?;
//! ```

mod mock;
mod sim;

pub use mock::MockLink;
pub use sim::{SimulatedVehicle, VehicleActivity};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mavparam_types::{InboundMessage, OutboundCommand};
use thiserror::Error;

use crate::queue::BoundedQueue;

/// Queue of decoded messages from the vehicle.
pub type InboundQueue = Arc<BoundedQueue<InboundMessage>>;

/// Queue of commands waiting for transmission.
pub type OutboundQueue = Arc<BoundedQueue<OutboundCommand>>;

/// Link errors.
#[derive(Debug, Error)]
pub enum LinkError {
    /// `start()` called twice.
    #[error("link already started")]
    AlreadyStarted,

    /// Link could not be opened.
    #[error("link failed to start: {0}")]
    StartFailed(String),

    /// The link task did not finish in time.
    #[error("link did not stop within {0:?}")]
    JoinTimeout(Duration),

    /// The link task ended abnormally.
    #[error("link task failed: {0}")]
    TaskFailed(String),
}

/// Background receiver/transmitter for one vehicle link.
///
/// Implementations handle the underlying connection (serial, UDP,
/// simulation, mock).
#[async_trait]
pub trait LinkReceiver: Send + Sync + 'static {
    /// Begin feeding `inbound` and draining `outbound`.
    async fn start(&self, inbound: InboundQueue, outbound: OutboundQueue)
        -> Result<(), LinkError>;

    /// Ask the link to finish. Returns immediately.
    fn stop(&self);

    /// Wait for the link task to finish, at most `timeout`.
    async fn join(&self, timeout: Duration) -> Result<(), LinkError>;
}
