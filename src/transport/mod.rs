//! Transport implementations.
//!
//! This module provides concrete implementations of the domain-level
//! `Connector` trait. The connection manager only ever sees the domain
//! traits.
//!
//! Domain code must not depend on transport-specific types.

mod memory;
mod websocket;

pub use memory::{MemoryConnector, MemoryPeer, MemorySession};
pub use websocket::WebSocketConnector;
