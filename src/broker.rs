//! Broker: the two registries plus the glue between them
//!
//! The networking layer drives everything through this type: attach on
//! accept, relay on every inbound frame, detach on close. It also owns the
//! two periodic tasks, the idle sweep and the status report.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::client::{Client, ClientRegistry, ConnectionHandle};
use crate::registry::{ChannelRegistry, Delivery, Payload, RegistryConfig, RegistryError};
use crate::stats::{BrokerStats, RelayCounters};

/// Channel and client registries with their shared configuration
pub struct Broker {
    config: RegistryConfig,
    channels: Arc<ChannelRegistry>,
    clients: Arc<ClientRegistry>,
    counters: RelayCounters,
}

/// Handles of the periodic tasks spawned by [`Broker::spawn_background_tasks`]
pub struct BackgroundTasks {
    /// Idle-channel sweep
    pub sweep: JoinHandle<()>,
    /// Status report
    pub status: JoinHandle<()>,
}

impl BackgroundTasks {
    /// Stop both tasks
    pub fn abort(&self) {
        self.sweep.abort();
        self.status.abort();
    }
}

impl Broker {
    /// Create a broker with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a broker with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            channels: Arc::new(ChannelRegistry::new()),
            clients: Arc::new(ClientRegistry::with_config(&config)),
            counters: RelayCounters::new(),
            config,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Channel registry
    pub fn channels(&self) -> &Arc<ChannelRegistry> {
        &self.channels
    }

    /// Client registry
    pub fn clients(&self) -> &Arc<ClientRegistry> {
        &self.clients
    }

    /// Attach a connection to the channel named `channel_id`
    ///
    /// `Ok(None)` means the connection was turned away at capacity (it has
    /// already been notified and closed). If the channel is swept or removed
    /// between lookup and attach, the attach is retried on a fresh channel.
    pub async fn attach(
        &self,
        handle: Arc<dyn ConnectionHandle>,
        channel_id: &str,
    ) -> Result<Option<Arc<Client>>, RegistryError> {
        loop {
            let channel = self.channels.get_or_create(channel_id).await;

            match self.clients.add(Arc::clone(&handle), channel).await {
                Err(RegistryError::ChannelClosed(_)) => {
                    tracing::debug!(channel = %channel_id, "Channel closed during attach, retrying");
                }
                Ok(Some(client)) => {
                    self.counters.record_attach();
                    return Ok(Some(client));
                }
                Ok(None) => {
                    self.counters.record_reject();
                    return Ok(None);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Detach whatever client is bound to `handle`; no-op if none is
    pub async fn detach(&self, handle: &dyn ConnectionHandle) -> bool {
        self.clients.remove(handle).await
    }

    /// Fan an inbound payload from `client` out to its channel
    pub async fn relay(&self, client: &Client, payload: Payload) -> Delivery {
        let delivery = client.read(payload).await;
        self.counters.record_message(delivery);
        delivery
    }

    /// Force-remove a channel, notifying its members with `reason`
    pub async fn remove_channel(&self, id: &str, reason: &str) -> Result<usize, RegistryError> {
        self.channels.remove(id, reason).await
    }

    /// Current statistics
    pub async fn stats(&self) -> BrokerStats {
        let clients = self.clients.count().await;
        let channels = self.channels.count().await;
        self.counters.snapshot(clients, channels)
    }

    /// Log client and channel counts
    pub async fn report_status(&self) {
        let stats = self.stats().await;

        tracing::info!(
            clients = stats.active_clients,
            max_clients = self.clients.max_clients(),
            channels = stats.active_channels,
            messages = stats.messages_relayed,
            deliveries = stats.deliveries,
            failed_deliveries = stats.failed_deliveries,
            rejected = stats.total_rejected,
            uptime_secs = stats.uptime.as_secs(),
            "Broker status"
        );
    }

    /// Spawn the idle sweep and status report tasks
    pub fn spawn_background_tasks(self: &Arc<Self>) -> BackgroundTasks {
        let sweep = self.channels.spawn_sweep_task(self.config.sweep_interval);
        let status = self.spawn_status_task(self.config.status_interval);

        BackgroundTasks { sweep, status }
    }

    fn spawn_status_task(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let broker = Arc::clone(self);
        let period = period.max(Duration::from_millis(1));

        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut ticker = tokio::time::interval_at(start, period);
            loop {
                ticker.tick().await;
                broker.report_status().await;
            }
        })
    }
}

impl Default for Broker {
    fn default() -> Self {
        Self::new()
    }
}
