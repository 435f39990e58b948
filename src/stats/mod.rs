//! Broker statistics and status reporting

pub mod metrics;

pub use metrics::{BrokerStats, RelayCounters};
