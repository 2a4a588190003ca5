//! # mavparam-client
//!
//! Client library for MAVLink parameter synchronisation.
//!
//! This is the library applications use to keep a parameter store in sync
//! with a vehicle.
//!
//! ## Features
//!
//! - **Bounded Queues**: fixed-capacity inbound/outbound queues between link and engine
//! - **Link Abstraction**: pluggable link receiver (simulated vehicle, mock)
//! - **Pure State Machine**: uses mavparam-core for side-effect-free logic
//! - **Cooperative Shutdown**: bounded wait for the engine and the link
//!
//! ## Example
//!
//! ```ignore
//! use mavparam_client::{ParamSyncClient, SimulatedVehicle};
//! use mavparam_core::{MemoryParameterStore, SyncConfig};
//!
//! let config = mavparam_client::config::load(Path::new("mavparam.toml"))?;
//! let vehicle = SimulatedVehicle::demo(config.target());
//! let mut client = ParamSyncClient::new(config, MemoryParameterStore::new(), vehicle);
//!
//! client.start().await?;
//! client.request_refresh()?;
//! client.stop().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
mod engine;
pub mod queue;
pub mod transport;

pub use client::{ClientError, Lifecycle, ParamSyncClient};
pub use config::ConfigError;
pub use engine::EngineStatus;
pub use queue::BoundedQueue;
pub use transport::{
    InboundQueue, LinkError, LinkReceiver, MockLink, OutboundQueue, SimulatedVehicle,
    VehicleActivity,
};
