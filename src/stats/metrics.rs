//! Statistics for the broker

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::registry::Delivery;

/// Running counters updated by the relay path
#[derive(Debug)]
pub struct RelayCounters {
    started_at: Instant,
    attached: AtomicU64,
    rejected: AtomicU64,
    messages: AtomicU64,
    deliveries: AtomicU64,
    failed_deliveries: AtomicU64,
}

impl RelayCounters {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            attached: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            messages: AtomicU64::new(0),
            deliveries: AtomicU64::new(0),
            failed_deliveries: AtomicU64::new(0),
        }
    }

    /// A client attached
    pub fn record_attach(&self) {
        self.attached.fetch_add(1, Ordering::Relaxed);
    }

    /// A connection was turned away
    pub fn record_reject(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// An inbound payload was fanned out
    pub fn record_message(&self, delivery: Delivery) {
        self.messages.fetch_add(1, Ordering::Relaxed);
        self.deliveries
            .fetch_add(delivery.delivered as u64, Ordering::Relaxed);
        self.failed_deliveries
            .fetch_add(delivery.failed as u64, Ordering::Relaxed);
    }

    /// Time since the counters were created
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Fill the counter fields of a stats snapshot
    pub fn snapshot(&self, active_clients: usize, active_channels: usize) -> BrokerStats {
        BrokerStats {
            active_clients,
            active_channels,
            total_attached: self.attached.load(Ordering::Relaxed),
            total_rejected: self.rejected.load(Ordering::Relaxed),
            messages_relayed: self.messages.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            failed_deliveries: self.failed_deliveries.load(Ordering::Relaxed),
            uptime: self.uptime(),
        }
    }
}

impl Default for RelayCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// Broker-wide statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BrokerStats {
    /// Currently attached clients
    pub active_clients: usize,
    /// Currently registered channels
    pub active_channels: usize,
    /// Clients attached since startup
    pub total_attached: u64,
    /// Connections rejected at capacity since startup
    pub total_rejected: u64,
    /// Inbound payloads fanned out
    pub messages_relayed: u64,
    /// Payloads queued to receivers
    pub deliveries: u64,
    /// Payloads a receiver refused
    pub failed_deliveries: u64,
    /// Uptime
    pub uptime: Duration,
}

impl BrokerStats {
    /// Average receivers per relayed message
    pub fn fanout_ratio(&self) -> f64 {
        if self.messages_relayed > 0 {
            self.deliveries as f64 / self.messages_relayed as f64
        } else {
            0.0
        }
    }
}
