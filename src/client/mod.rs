//! Attached clients and the client registry
//!
//! - [`ConnectionHandle`]: transport supplied by the networking layer
//! - [`Client`]: one connection bound to one channel
//! - [`ClientRegistry`]: capacity-bounded map of attached clients

pub mod entry;
pub mod handle;
pub mod registry;

pub use entry::Client;
pub use handle::{CloseOutcome, ConnectionHandle, SendError};
pub use registry::{ClientRegistry, CAPACITY_NOTICE};
