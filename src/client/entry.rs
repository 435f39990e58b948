//! Attached client
//!
//! A client binds one connection handle to one channel for as long as the
//! connection stays attached.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

use tokio::sync::RwLock;

use crate::registry::{Channel, Delivery, Payload, RegistryError};

use super::handle::{CloseOutcome, ConnectionHandle, SendError};

/// Client map shared between the client registry and its clients
pub(crate) type Roster = RwLock<HashMap<String, Arc<Client>>>;

/// Core-side representation of one attached connection
pub struct Client {
    /// Identity key taken from the handshake
    key: String,

    /// Remote peer address
    remote_addr: SocketAddr,

    /// Owning channel (membership is held by the channel, not the client)
    channel: Arc<Channel>,

    /// Transport
    handle: Arc<dyn ConnectionHandle>,

    /// Client registry map, for detaching on teardown
    roster: Weak<Roster>,

    /// Set once teardown starts; detached clients receive nothing
    detached: AtomicBool,

    /// When the client attached
    created_at: Instant,
}

impl Client {
    /// Build a client for `handle` in `channel`
    ///
    /// Fails when the handshake did not yield an identity key.
    pub(crate) fn new(
        handle: Arc<dyn ConnectionHandle>,
        channel: Arc<Channel>,
        roster: Weak<Roster>,
    ) -> Result<Self, RegistryError> {
        let key = handle
            .identity()
            .ok_or(RegistryError::MalformedHandshake)?
            .to_owned();

        Ok(Self {
            key,
            remote_addr: handle.remote_addr(),
            channel,
            handle,
            roster,
            detached: AtomicBool::new(false),
            created_at: Instant::now(),
        })
    }

    /// Identity key
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Remote peer address
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// The channel this client is attached to
    pub fn channel(&self) -> &Arc<Channel> {
        &self.channel
    }

    /// When the client attached
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Whether teardown has not started yet
    pub fn is_attached(&self) -> bool {
        !self.detached.load(Ordering::Acquire)
    }

    /// Whether this client was attached through `handle`
    pub fn is_bound_to(&self, handle: &dyn ConnectionHandle) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.handle), handle)
    }

    /// Handle an inbound payload from this client's connection
    pub async fn read(&self, payload: Payload) -> Delivery {
        tracing::trace!(
            client = %self.key,
            channel = %self.channel.id(),
            bytes = payload.len(),
            "Received"
        );
        self.channel.broadcast(self, &payload).await
    }

    /// Queue a payload for this client
    pub fn send(&self, payload: Payload) -> Result<(), SendError> {
        if !self.is_attached() {
            return Err(SendError::Closed);
        }
        self.handle.send(payload)
    }

    /// Queue an operator notice; same wire primitive as `send`
    pub fn error(&self, message: &str) -> Result<(), SendError> {
        self.send(Payload::text(message))
    }

    /// Detach from the channel and the client registry, then close the handle
    ///
    /// Only the first call has any effect and returns the handle's close
    /// outcome; later calls report [`CloseOutcome::AlreadyClosed`].
    pub async fn shutdown(&self) -> CloseOutcome {
        if self.detached.swap(true, Ordering::AcqRel) {
            return CloseOutcome::AlreadyClosed;
        }

        self.channel.remove_client(self).await;

        if let Some(roster) = self.roster.upgrade() {
            let mut clients = roster.write().await;
            let registered = clients
                .get(&self.key)
                .is_some_and(|entry| std::ptr::eq(Arc::as_ptr(entry), self));
            if registered {
                clients.remove(&self.key);
            }
        }

        let outcome = self.handle.close();
        if outcome == CloseOutcome::AlreadyClosed {
            tracing::debug!(client = %self.key, "Connection already closed");
        }

        tracing::info!(
            client = %self.key,
            remote = %self.remote_addr,
            channel = %self.channel.id(),
            "Client disconnected"
        );

        outcome
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("key", &self.key)
            .field("remote_addr", &self.remote_addr)
            .field("channel", &self.channel.id())
            .field("attached", &self.is_attached())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientRegistry;
    use crate::testing::MockHandle;

    #[tokio::test]
    async fn test_missing_identity_is_malformed() {
        let channel = Arc::new(Channel::new("room"));
        let handle = MockHandle::anonymous();

        let result = Client::new(handle, channel, Weak::new());

        assert_eq!(result.unwrap_err(), RegistryError::MalformedHandshake);
    }

    #[tokio::test]
    async fn test_shutdown_twice() {
        let clients = ClientRegistry::new(4);
        let channel = Arc::new(Channel::new("room"));
        let handle = MockHandle::new("a");
        let client = clients
            .add(handle.clone(), Arc::clone(&channel))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(client.shutdown().await, CloseOutcome::Closed);
        assert_eq!(client.shutdown().await, CloseOutcome::AlreadyClosed);

        assert_eq!(handle.close_calls(), 1);
        assert!(!client.is_attached());
        assert!(channel.is_empty().await);
        assert!(clients.lookup_key("a").await.is_none());
    }

    #[tokio::test]
    async fn test_detached_client_refuses_sends() {
        let clients = ClientRegistry::new(4);
        let channel = Arc::new(Channel::new("room"));
        let handle = MockHandle::new("a");
        let client = clients.add(handle.clone(), channel).await.unwrap().unwrap();

        client.shutdown().await;

        assert_eq!(client.send(Payload::from("late")), Err(SendError::Closed));
        assert!(handle.texts().is_empty());
    }

    #[tokio::test]
    async fn test_error_uses_text_frame() {
        let clients = ClientRegistry::new(4);
        let channel = Arc::new(Channel::new("room"));
        let handle = MockHandle::new("a");
        let client = clients.add(handle.clone(), channel).await.unwrap().unwrap();

        client.error("heads up").unwrap();

        assert_eq!(handle.sent(), vec![Payload::from("heads up")]);
    }
}
