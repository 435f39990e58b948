//! Server configuration

use std::net::{Ipv4Addr, SocketAddr};

/// Default listening port
pub const DEFAULT_PORT: u16 = 8025;

/// Default per-connection outbound queue length, in frames
pub const DEFAULT_OUTBOUND_BUFFER: usize = 256;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Accepted origin domain suffix; `*` accepts any origin
    pub allow_origin: String,

    /// Frames queued per connection before sends start failing
    pub outbound_buffer: usize,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            allow_origin: "*".to_string(),
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
            tcp_nodelay: true,
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the accepted origin domain
    pub fn allow_origin(mut self, origin: impl Into<String>) -> Self {
        self.allow_origin = origin.into();
        self
    }

    /// Set the outbound queue length (at least one frame)
    pub fn outbound_buffer(mut self, frames: usize) -> Self {
        self.outbound_buffer = frames.max(1);
        self
    }
}
