//! Relayed payload type
//!
//! Payloads are opaque: the broker never looks inside them, it only keeps
//! track of whether the frame arrived as text or binary so receivers get the
//! same frame type the sender used.

use std::sync::Arc;

use bytes::Bytes;

/// A message to be fanned out to channel members
///
/// Cheap to clone: text is shared through `Arc<str>` and binary data through
/// `Bytes` reference counting, so every receiver shares one allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// UTF-8 text frame
    Text(Arc<str>),
    /// Binary frame
    Binary(Bytes),
}

impl Payload {
    /// Create a text payload
    pub fn text(text: impl Into<Arc<str>>) -> Self {
        Payload::Text(text.into())
    }

    /// Create a binary payload
    pub fn binary(data: impl Into<Bytes>) -> Self {
        Payload::Binary(data.into())
    }

    /// Payload size in bytes
    pub fn len(&self) -> usize {
        match self {
            Payload::Text(text) => text.len(),
            Payload::Binary(data) => data.len(),
        }
    }

    /// Whether the payload carries no data
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Text content, if this is a text payload
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(text) => Some(text),
            Payload::Binary(_) => None,
        }
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::text(text)
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::text(text)
    }
}

impl From<Bytes> for Payload {
    fn from(data: Bytes) -> Self {
        Payload::Binary(data)
    }
}
