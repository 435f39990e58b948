//! Registry configuration
//!
//! Capacity and timer settings consumed once at startup. They are immutable
//! for the lifetime of the registries built from them.

use std::time::Duration;

/// Default maximum number of concurrently attached clients
pub const DEFAULT_MAX_CLIENTS: usize = 1000;

/// Default period between idle-channel sweeps
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

/// Default period between status reports
pub const DEFAULT_STATUS_INTERVAL: Duration = Duration::from_secs(3600);

/// Registry configuration options
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Maximum concurrently attached clients across all channels
    pub max_clients: usize,

    /// How often channels without members are removed
    pub sweep_interval: Duration,

    /// How often client/channel counts are logged
    pub status_interval: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_clients: DEFAULT_MAX_CLIENTS,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            status_interval: DEFAULT_STATUS_INTERVAL,
        }
    }
}

impl RegistryConfig {
    /// Set the client capacity ceiling
    pub fn max_clients(mut self, max: usize) -> Self {
        self.max_clients = max;
        self
    }

    /// Set the idle-channel sweep period
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Set the status report period
    pub fn status_interval(mut self, interval: Duration) -> Self {
        self.status_interval = interval;
        self
    }
}
