//! Registry error types
//!
//! Error types for channel and client registry operations. None of these are
//! fatal to the process; callers either report them or treat them as no-ops.

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// No channel is registered under this id
    ChannelNotFound(String),
    /// Channel was shut down (swept or force-removed) before the attach landed
    ChannelClosed(String),
    /// Another live connection already uses this identity key
    DuplicateIdentity(String),
    /// Handshake carried no identity key
    MalformedHandshake,
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::ChannelNotFound(id) => write!(f, "Channel not found: {}", id),
            RegistryError::ChannelClosed(id) => write!(f, "Channel is shutting down: {}", id),
            RegistryError::DuplicateIdentity(key) => {
                write!(f, "Identity key already attached: {}", key)
            }
            RegistryError::MalformedHandshake => {
                write!(f, "Malformed handshake: missing identity key")
            }
        }
    }
}

impl std::error::Error for RegistryError {}
