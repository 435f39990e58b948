//! Channel registry implementation
//!
//! Maps channel ids to live channels. Channels are created lazily on first
//! reference and removed either by an operator or by the idle sweep.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use super::channel::{Channel, ChannelInfo};
use super::error::RegistryError;

/// Reason attached to channels removed by the sweep
pub const IDLE_REASON: &str = "idle";

/// Registry of all live channels
///
/// Thread-safe via `RwLock`. Lookups of existing channels only take the read
/// lock; creation and removal take the write lock, so one id never maps to two
/// channel instances.
pub struct ChannelRegistry {
    channels: RwLock<HashMap<String, Arc<Channel>>>,
}

impl ChannelRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Return the channel for `id`, creating it if needed
    ///
    /// A registered channel that has already been shut down is replaced with
    /// a fresh one.
    pub async fn get_or_create(&self, id: &str) -> Arc<Channel> {
        if let Some(channel) = self.get(id).await {
            if !channel.is_closed().await {
                return channel;
            }
        }

        let mut channels = self.channels.write().await;
        if let Some(channel) = channels.get(id) {
            if !channel.is_closed().await {
                return Arc::clone(channel);
            }
            tracing::debug!(channel = %id, "Replacing closed channel");
        }

        let channel = Arc::new(Channel::new(id));
        channels.insert(id.to_owned(), Arc::clone(&channel));
        channel
    }

    /// Look up a channel without creating it
    pub async fn get(&self, id: &str) -> Option<Arc<Channel>> {
        self.channels.read().await.get(id).cloned()
    }

    /// Shut a channel down and drop it from the registry
    ///
    /// Members receive a notice carrying `reason` before being disconnected.
    /// Returns the number of members that were disconnected.
    pub async fn remove(&self, id: &str, reason: &str) -> Result<usize, RegistryError> {
        let channel = {
            let mut channels = self.channels.write().await;
            let channel = channels
                .remove(id)
                .ok_or_else(|| RegistryError::ChannelNotFound(id.to_owned()))?;
            channel.close().await;
            channel
        };

        tracing::debug!(channel = %id, reason = reason, "Channel removed");

        Ok(channel.shutdown(reason).await)
    }

    /// Remove every channel without members
    ///
    /// The emptiness check marks the channel closed under its membership lock,
    /// so a concurrent attach either lands first and keeps the channel alive
    /// or sees it closed and retries on a fresh one.
    pub async fn sweep(&self) -> usize {
        let idle: Vec<Arc<Channel>> = {
            let mut channels = self.channels.write().await;

            let ids: Vec<String> = channels
                .iter()
                .filter(|(_, channel)| channel.close_if_idle())
                .map(|(id, _)| id.clone())
                .collect();

            ids.iter().filter_map(|id| channels.remove(id)).collect()
        };

        for channel in &idle {
            channel.shutdown(IDLE_REASON).await;
        }

        tracing::debug!(removed = idle.len(), "Channel sweep complete");

        idle.len()
    }

    /// Number of registered channels
    pub async fn count(&self) -> usize {
        self.channels.read().await.len()
    }

    /// Ids of all registered channels, sorted
    pub async fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.channels.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Descriptions of all registered channels, sorted by id
    pub async fn channels(&self) -> Vec<ChannelInfo> {
        let snapshot: Vec<Arc<Channel>> = self.channels.read().await.values().cloned().collect();

        let mut infos = Vec::with_capacity(snapshot.len());
        for channel in snapshot {
            infos.push(channel.info().await);
        }
        infos.sort_by(|a, b| a.id.cmp(&b.id));
        infos
    }

    /// Spawn the periodic idle sweep
    ///
    /// The first sweep runs one full period after spawning. Returns a handle
    /// that can be used to abort the task.
    pub fn spawn_sweep_task(self: &Arc<Self>, period: Duration) -> tokio::task::JoinHandle<()> {
        let registry = Arc::clone(self);
        let period = period.max(Duration::from_millis(1));

        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut ticker = tokio::time::interval_at(start, period);
            loop {
                ticker.tick().await;
                registry.sweep().await;
            }
        })
    }
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new()
    }
}
