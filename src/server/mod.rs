//! WebSocket server
//!
//! Networking layer around the broker: accepts TCP connections, performs the
//! WebSocket handshake, routes `/t/<channel>` to the broker and `/test/echo`
//! to a plain echo loop.

pub mod config;
pub mod connection;
pub mod listener;
pub mod route;

pub use config::ServerConfig;
pub use connection::WsConnection;
pub use listener::BrokerServer;
pub use route::{origin_allowed, Handshake, Route};
