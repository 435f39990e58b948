//! In-memory connection handle for unit tests

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::client::{CloseOutcome, ConnectionHandle, SendError};
use crate::registry::Payload;

pub(crate) struct MockHandle {
    key: Option<String>,
    full: bool,
    sent: Mutex<Vec<Payload>>,
    closed: AtomicBool,
    close_calls: AtomicUsize,
}

impl MockHandle {
    fn build(key: Option<&str>, full: bool) -> Arc<Self> {
        Arc::new(Self {
            key: key.map(str::to_owned),
            full,
            sent: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            close_calls: AtomicUsize::new(0),
        })
    }

    pub(crate) fn new(key: &str) -> Arc<Self> {
        Self::build(Some(key), false)
    }

    /// Handshake without an identity key
    pub(crate) fn anonymous() -> Arc<Self> {
        Self::build(None, false)
    }

    /// Peer whose outbound queue is always full
    pub(crate) fn full(key: &str) -> Arc<Self> {
        Self::build(Some(key), true)
    }

    pub(crate) fn sent(&self) -> Vec<Payload> {
        self.sent.lock().unwrap().clone()
    }

    pub(crate) fn texts(&self) -> Vec<String> {
        self.sent()
            .iter()
            .filter_map(|p| p.as_text().map(str::to_owned))
            .collect()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Close calls that actually closed the handle
    pub(crate) fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

impl ConnectionHandle for MockHandle {
    fn identity(&self) -> Option<&str> {
        self.key.as_deref()
    }

    fn remote_addr(&self) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 40000)
    }

    fn send(&self, payload: Payload) -> Result<(), SendError> {
        if self.is_closed() {
            return Err(SendError::Closed);
        }
        if self.full {
            return Err(SendError::Full);
        }
        self.sent.lock().unwrap().push(payload);
        Ok(())
    }

    fn close(&self) -> CloseOutcome {
        if self.closed.swap(true, Ordering::SeqCst) {
            return CloseOutcome::AlreadyClosed;
        }
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        CloseOutcome::Closed
    }
}
