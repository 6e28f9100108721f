use std::sync::Arc;

use thiserror::Error;

use crate::CorrelationId;

/// Errors that can occur while relaying requests to the remote peer.
///
/// The type is `Clone` so that a single connection-level failure can be
/// fanned out to every pending request.
#[derive(Error, Debug, Clone)]
pub enum RelayError {
    /// Handshake, write, or read failure on the underlying socket.
    #[error("connection error: {0}")]
    Connection(String),

    /// No matching response arrived before the deadline.
    #[error("request timed out")]
    Timeout,

    /// The remote peer closed the connection while a request was pending.
    #[error("connection closed by remote peer")]
    ConnectionClosed,

    /// A correlation id was registered twice.
    #[error("duplicate correlation id: {0}")]
    DuplicateId(CorrelationId),

    /// Malformed or unrecognized inbound frame.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// JSON serialization or deserialization failed
    #[error("serialization error: {0}")]
    Serialization(Arc<serde_json::Error>),

    /// Graph payload violates the business rules.
    #[error("validation error: {0}")]
    Validation(String),

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),
}

impl RelayError {
    /// Returns true for failures of the connection itself, as opposed to
    /// failures local to one request.
    pub fn is_connection_level(&self) -> bool {
        // ---
        matches!(self, Self::Connection(_) | Self::ConnectionClosed)
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(Arc::new(err))
    }
}

impl From<figment::Error> for RelayError {
    fn from(err: figment::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, RelayError>;
