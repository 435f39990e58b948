//! Channel and membership types
//!
//! A channel owns the membership map for one topic and performs the fan-out.
//! The `closed` flag lives under the same lock as the members so the idle
//! sweep and a concurrent attach can never both win.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::client::{Client, CloseOutcome, SendError};

use super::error::RegistryError;
use super::payload::Payload;

struct Members {
    clients: HashMap<String, Arc<Client>>,
    closed: bool,
}

/// A named group of attached clients
pub struct Channel {
    id: String,
    members: RwLock<Members>,
    created_at: Instant,
}

/// Outcome of a single fan-out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Members the payload was queued for
    pub delivered: usize,
    /// Members whose connection refused the payload
    pub failed: usize,
}

/// Point-in-time description of a channel
#[derive(Debug, Clone)]
pub struct ChannelInfo {
    /// Channel id
    pub id: String,
    /// Number of attached clients
    pub member_count: usize,
    /// Time since the channel was created
    pub age: Duration,
}

impl Channel {
    pub(crate) fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        tracing::info!(channel = %id, "New channel");

        Self {
            id,
            members: RwLock::new(Members {
                clients: HashMap::new(),
                closed: false,
            }),
            created_at: Instant::now(),
        }
    }

    /// Channel id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// When the channel was created
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Number of attached clients
    pub async fn member_count(&self) -> usize {
        self.members.read().await.clients.len()
    }

    /// Whether no client is attached
    pub async fn is_empty(&self) -> bool {
        self.members.read().await.clients.is_empty()
    }

    /// Whether the channel has been shut down
    pub async fn is_closed(&self) -> bool {
        self.members.read().await.closed
    }

    /// Snapshot for listings and status reports
    pub async fn info(&self) -> ChannelInfo {
        ChannelInfo {
            id: self.id.clone(),
            member_count: self.member_count().await,
            age: self.created_at.elapsed(),
        }
    }

    /// Register a client as a member
    ///
    /// Adding the same client twice is a no-op. A different client with an
    /// identity key that is already present is rejected.
    pub async fn add_client(&self, client: Arc<Client>) -> Result<(), RegistryError> {
        let mut members = self.members.write().await;

        if members.closed {
            return Err(RegistryError::ChannelClosed(self.id.clone()));
        }

        match members.clients.get(client.key()) {
            Some(existing) if Arc::ptr_eq(existing, &client) => return Ok(()),
            Some(_) => return Err(RegistryError::DuplicateIdentity(client.key().to_owned())),
            None => {}
        }

        tracing::debug!(channel = %self.id, client = %client.key(), "Client added to channel");
        members.clients.insert(client.key().to_owned(), client);

        Ok(())
    }

    /// Remove a client; returns whether it was a member
    pub async fn remove_client(&self, client: &Client) -> bool {
        let mut members = self.members.write().await;

        let is_member = members
            .clients
            .get(client.key())
            .is_some_and(|entry| std::ptr::eq(Arc::as_ptr(entry), client));

        if is_member {
            members.clients.remove(client.key());
            tracing::debug!(channel = %self.id, client = %client.key(), "Client removed from channel");
        }

        is_member
    }

    /// Deliver `payload` to every member except `source`
    ///
    /// Sends only enqueue, so the membership read lock is never held across a
    /// slow peer. A refused send is logged and does not affect other members.
    pub async fn broadcast(&self, source: &Client, payload: &Payload) -> Delivery {
        let members = self.members.read().await;
        let mut delivery = Delivery::default();

        for (key, client) in &members.clients {
            // do not echo back to the sender
            if key == source.key() {
                continue;
            }

            match client.send(payload.clone()) {
                Ok(()) => delivery.delivered += 1,
                Err(SendError::Closed) => {
                    // mid-teardown, its entry is about to go
                    tracing::debug!(channel = %self.id, to = %key, "Skipped detached member");
                }
                Err(e) => {
                    delivery.failed += 1;
                    tracing::warn!(
                        channel = %self.id,
                        from = %source.key(),
                        to = %key,
                        error = %e,
                        "Delivery failed"
                    );
                }
            }
        }

        tracing::trace!(
            channel = %self.id,
            from = %source.key(),
            bytes = payload.len(),
            delivered = delivery.delivered,
            "Broadcast"
        );

        delivery
    }

    /// Notify every member, then disconnect them all
    ///
    /// Works on a snapshot taken at the start, since each teardown removes
    /// its own entry. Returns the number of members disconnected.
    pub async fn shutdown(&self, reason: &str) -> usize {
        let snapshot: Vec<Arc<Client>> = {
            let mut members = self.members.write().await;
            members.closed = true;
            members.clients.values().cloned().collect()
        };

        tracing::info!(
            channel = %self.id,
            reason = reason,
            members = snapshot.len(),
            "Shutting down channel"
        );

        let notice = shutdown_notice(&self.id, reason);
        for client in &snapshot {
            if let Err(e) = client.error(&notice) {
                tracing::debug!(channel = %self.id, client = %client.key(), error = %e, "Shutdown notice not delivered");
            }
            if client.shutdown().await == CloseOutcome::AlreadyClosed {
                tracing::debug!(channel = %self.id, client = %client.key(), "Client already closed");
            }
        }

        snapshot.len()
    }

    /// Mark closed if there are no members; used by the sweep
    ///
    /// Never waits: a channel whose lock is busy is in use and not idle.
    pub(super) fn close_if_idle(&self) -> bool {
        match self.members.try_write() {
            Ok(mut members) if members.clients.is_empty() => {
                members.closed = true;
                true
            }
            _ => false,
        }
    }

    /// Refuse further attaches
    pub(super) async fn close(&self) {
        self.members.write().await.closed = true;
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.id)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// Text sent to members when their channel goes away
pub fn shutdown_notice(id: &str, reason: &str) -> String {
    if reason.is_empty() {
        format!("Channel \"{}\" shutting down", id)
    } else {
        format!("Channel \"{}\" shutting down: {}", id, reason)
    }
}
