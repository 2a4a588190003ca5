//! # mavparam-core
//!
//! Pure logic for mavparam (no I/O, instant tests).
//!
//! This crate implements the parameter synchronisation state machine and the
//! small pieces it is built from, without any link or disk I/O, enabling fast
//! unit tests.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. Time is passed in as an [`std::time::Instant`], so
//! every deadline can be exercised without sleeping:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//! - Easy reasoning about state transitions
//!
//! The actual I/O (queues, link threads, timers) is performed by
//! `mavparam-client`, which interprets the actions produced by [`SyncMachine`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod buffer;
pub mod config;
pub mod heartbeat;
pub mod machine;
pub mod retry;
pub mod state;
pub mod store;

pub use buffer::{BoundedBuffer, BufferError, OverflowPolicy};
pub use config::SyncConfig;
pub use heartbeat::{HeartbeatMonitor, DEFAULT_HEARTBEAT_TIMEOUT};
pub use machine::{PendingWrite, SyncMachine};
pub use retry::{RetryCounter, RetryOutcome, DEFAULT_MAX_ATTEMPTS};
pub use state::{Action, Campaign, ConnectionState, EngineEvent, Request, RequestError};
pub use store::{MemoryParameterStore, Parameter, ParameterStore};
