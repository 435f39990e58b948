//! Shared helpers for integration tests

#![allow(dead_code)]

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use ws_broker::{CloseOutcome, ConnectionHandle, Payload, SendError};

/// Connection handle that records everything sent to it
pub struct RecordingHandle {
    key: String,
    received: Mutex<Vec<Payload>>,
    closed: AtomicBool,
}

impl RecordingHandle {
    pub fn new(key: &str) -> Arc<Self> {
        Arc::new(Self {
            key: key.to_owned(),
            received: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        })
    }

    pub fn received(&self) -> Vec<Payload> {
        self.received.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.received()
            .iter()
            .filter_map(|p| p.as_text().map(str::to_owned))
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl ConnectionHandle for RecordingHandle {
    fn identity(&self) -> Option<&str> {
        Some(&self.key)
    }

    fn remote_addr(&self) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 41000)
    }

    fn send(&self, payload: Payload) -> Result<(), SendError> {
        if self.is_closed() {
            return Err(SendError::Closed);
        }
        self.received.lock().unwrap().push(payload);
        Ok(())
    }

    fn close(&self) -> CloseOutcome {
        if self.closed.swap(true, Ordering::SeqCst) {
            CloseOutcome::AlreadyClosed
        } else {
            CloseOutcome::Closed
        }
    }
}
