//! Client registry
//!
//! Tracks every attached client by identity key and enforces the global
//! capacity ceiling.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::registry::{Channel, Payload, RegistryConfig, RegistryError};

use super::entry::{Client, Roster};
use super::handle::ConnectionHandle;

/// Notice sent to connections turned away at capacity
pub const CAPACITY_NOTICE: &str = "Maximum number of clients reached";

/// Registry of attached clients, bounded by `max_clients`
pub struct ClientRegistry {
    clients: Arc<Roster>,
    max_clients: usize,
}

impl ClientRegistry {
    /// Create a registry admitting at most `max_clients` clients
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: Arc::new(RwLock::new(HashMap::new())),
            max_clients,
        }
    }

    /// Create a registry from the shared registry configuration
    pub fn with_config(config: &RegistryConfig) -> Self {
        Self::new(config.max_clients)
    }

    /// Capacity ceiling
    pub fn max_clients(&self) -> usize {
        self.max_clients
    }

    /// Attach a connection to `channel`
    ///
    /// At capacity the connection is sent [`CAPACITY_NOTICE`], closed, and
    /// `Ok(None)` is returned; nothing is registered. Otherwise the new client
    /// is registered in the channel and in this registry.
    pub async fn add(
        &self,
        handle: Arc<dyn ConnectionHandle>,
        channel: Arc<Channel>,
    ) -> Result<Option<Arc<Client>>, RegistryError> {
        let mut clients = self.clients.write().await;

        if clients.len() >= self.max_clients {
            tracing::info!(
                remote = %handle.remote_addr(),
                max_clients = self.max_clients,
                "Maximum number of clients reached"
            );
            if let Err(e) = handle.send(Payload::text(CAPACITY_NOTICE)) {
                tracing::debug!(remote = %handle.remote_addr(), error = %e, "Capacity notice not delivered");
            }
            handle.close();
            return Ok(None);
        }

        let client = Arc::new(Client::new(
            handle,
            Arc::clone(&channel),
            Arc::downgrade(&self.clients),
        )?);

        if clients.contains_key(client.key()) {
            return Err(RegistryError::DuplicateIdentity(client.key().to_owned()));
        }

        channel.add_client(Arc::clone(&client)).await?;
        clients.insert(client.key().to_owned(), Arc::clone(&client));

        tracing::info!(
            client = %client.key(),
            remote = %client.remote_addr(),
            channel = %channel.id(),
            clients = clients.len(),
            "Client connected"
        );

        Ok(Some(client))
    }

    /// Tear down the client behind `handle`; returns whether one was found
    ///
    /// Unknown handles are a no-op, so duplicate disconnect events are harmless.
    pub async fn remove(&self, handle: &dyn ConnectionHandle) -> bool {
        let Some(client) = self.lookup(handle).await else {
            return false;
        };

        client.shutdown().await;
        true
    }

    /// Look up the client attached through `handle`
    ///
    /// A client registered under the same key by a different connection is
    /// not a match.
    pub async fn lookup(&self, handle: &dyn ConnectionHandle) -> Option<Arc<Client>> {
        let key = handle.identity()?;
        self.lookup_key(key)
            .await
            .filter(|client| client.is_bound_to(handle))
    }

    /// Look up a client by identity key
    pub async fn lookup_key(&self, key: &str) -> Option<Arc<Client>> {
        self.clients.read().await.get(key).cloned()
    }

    /// Number of attached clients
    pub async fn count(&self) -> usize {
        self.clients.read().await.len()
    }
}
