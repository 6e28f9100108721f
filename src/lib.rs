//! Correlated request/response over a single duplex WebSocket.
//!
//! This library turns one long-lived WebSocket connection into an RPC-like
//! primitive: many concurrent callers send requests and each awaits the
//! reply that echoes its correlation id, or a timeout, or a connection
//! failure. It handles correlation id generation, reply routing, per-request
//! timeouts, and fan-out of connection failures to every pending caller.
//!
//! On top of that primitive sits a small graph CRUD relay ([`GraphService`])
//! and its HTTP surface ([`http::router`]).
//!

// Import all sub modules once...
mod client;
mod domain;
mod macros;
mod protocol;
mod transport;

mod relay_config;

mod correlation;
mod error;

pub mod graph;
pub mod http;

pub(crate) use macros::{log_debug, log_error, log_info, log_warn};

// Re-export main types
pub use client::{ConnectionManager, ConnectionState, CorrelationTable, Outcome};
pub use graph::{Edge, Graph, GraphService, Node};

pub use relay_config::{RelayConfig, CONFIG_FILE, DEFAULT_ENDPOINT, DEFAULT_HTTP_ADDR, ENV_PREFIX};

pub use correlation::CorrelationId;
pub use error::{RelayError, Result};

pub use transport::{MemoryConnector, MemoryPeer, MemorySession, WebSocketConnector};

// --- public re-exports
pub use domain::{
    //
    CloseReason,
    Connector,
    ConnectorPtr,
    Frame,
    FrameReader,
    FrameWriter,
    Socket,
    NORMAL_CLOSURE,
};

pub use protocol::{
    //
    Action,
    Envelope,
    JsonReplyMatcher,
    MatcherPtr,
    ReplyEnvelope,
    ReplyMatcher,
};
