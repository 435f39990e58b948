//! Channel registry and fan-out engine
//!
//! The registry tracks live channels and routes payloads from one member to
//! every other member of the same channel.
//!
//! # Architecture
//!
//! ```text
//!                        Arc<ChannelRegistry>
//!                   ┌──────────────────────────┐
//!                   │ channels: HashMap<Id,    │
//!                   │   Arc<Channel> {         │
//!                   │     members: key->Client │
//!                   │     closed,              │
//!                   │   }                      │
//!                   │ >                        │
//!                   └────────────┬─────────────┘
//!                                │
//!        ┌───────────────────────┼───────────────────────┐
//!        │                       │                       │
//!        ▼                       ▼                       ▼
//!    [Client A]              [Client B]              [Client C]
//!    read(payload)           send() ──► queue        send() ──► queue
//!        │                       ▲                       ▲
//!        └──► channel.broadcast()┴───────────────────────┘
//! ```
//!
//! # Lock order
//!
//! Registry map, then channel membership. Client teardown takes the channel
//! lock and the client map lock one after the other, never nested.

pub mod channel;
pub mod config;
pub mod error;
pub mod payload;
pub mod store;

pub use channel::{shutdown_notice, Channel, ChannelInfo, Delivery};
pub use config::RegistryConfig;
pub use error::RegistryError;
pub use payload::Payload;
pub use store::{ChannelRegistry, IDLE_REASON};
