//! Connection handle abstraction
//!
//! The networking layer hands the broker one handle per accepted connection.
//! The core only needs to push payloads, close the transport, and read the
//! identity derived during the handshake.

use std::net::SocketAddr;

use crate::registry::Payload;

/// Why a payload could not be handed to a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    /// Connection (or the client wrapping it) is already closed
    Closed,
    /// Outbound queue is full; the peer is not keeping up
    Full,
}

impl std::fmt::Display for SendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SendError::Closed => write!(f, "connection closed"),
            SendError::Full => write!(f, "outbound queue full"),
        }
    }
}

impl std::error::Error for SendError {}

/// Result of closing a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// This call closed the connection
    Closed,
    /// The connection had been closed before; nothing was done
    AlreadyClosed,
}

/// A bidirectional transport supplied by the networking layer
///
/// Implementations must not block in `send`: a slow peer has to surface as
/// [`SendError::Full`] instead of stalling the caller, since the caller is
/// usually a broadcast loop serving many members.
pub trait ConnectionHandle: Send + Sync + 'static {
    /// Identity key derived from the handshake, `None` if it was missing
    fn identity(&self) -> Option<&str>;

    /// Remote peer address
    fn remote_addr(&self) -> SocketAddr;

    /// Queue a payload for delivery
    fn send(&self, payload: Payload) -> Result<(), SendError>;

    /// Close the transport. Closing twice reports [`CloseOutcome::AlreadyClosed`].
    fn close(&self) -> CloseOutcome;
}
