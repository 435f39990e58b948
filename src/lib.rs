//! Topic-addressable WebSocket message relay
//!
//! Clients connect to `/t/<channel>` and every message one client sends is
//! fanned out to every other client attached to the same channel. Nothing is
//! persisted; payloads are opaque and passed through unchanged.
//!
//! # Layout
//!
//! - [`registry`]: channels, fan-out, idle sweep
//! - [`client`]: connection handles, attached clients, capacity-bounded registry
//! - [`broker`]: both registries plus the attach/relay/detach glue
//! - [`server`]: WebSocket listener driving the broker
//! - [`stats`]: counters and status snapshots
//!
//! # Example
//!
//! ```no_run
//! use ws_broker::{BrokerServer, RegistryConfig, ServerConfig};
//!
//! # async fn example() -> ws_broker::Result<()> {
//! let server = BrokerServer::with_registry_config(
//!     ServerConfig::default(),
//!     RegistryConfig::default().max_clients(500),
//! );
//! server.run().await
//! # }
//! ```

pub mod broker;
pub mod client;
pub mod error;
pub mod registry;
pub mod server;
pub mod stats;

#[cfg(test)]
mod testing;

pub use broker::{BackgroundTasks, Broker};
pub use client::{Client, ClientRegistry, CloseOutcome, ConnectionHandle, SendError};
pub use error::{Error, Result};
pub use registry::{Channel, ChannelRegistry, Payload, RegistryConfig, RegistryError};
pub use server::{BrokerServer, ServerConfig};
pub use stats::BrokerStats;
