// src/domain/transport.rs

//! Duplex socket abstractions.
//!
//! This module defines the domain-level interface the connection manager
//! uses to talk to the remote peer. It intentionally avoids any reference to
//! a concrete protocol or client library.
//!
//! A [`Connector`] performs the handshake against an endpoint and hands back
//! a [`Socket`]: a writer half used by senders and a reader half owned by the
//! single receive loop. Frames are opaque to this layer; correlation is
//! handled elsewhere.
//!
//! Concrete implementations live under `src/transport/`.
use std::sync::Arc;

use bytes::Bytes;

use crate::Result;

/// Close code used for an orderly shutdown.
pub const NORMAL_CLOSURE: u16 = 1000;

/// Reason attached to a close frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CloseReason {
    pub code: u16,
    pub reason: String,
}

impl CloseReason {
    /// Orderly closure with no further explanation.
    pub fn normal() -> Self {
        // ---
        Self {
            code: NORMAL_CLOSURE,
            reason: String::new(),
        }
    }
}

/// One message on the duplex socket.
///
/// `Text` and `Binary` carry opaque payloads. `Close` starts (or answers)
/// the closing handshake.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Bytes),
    Close(Option<CloseReason>),
}

impl Frame {
    /// Build a text frame.
    pub fn text(payload: impl Into<String>) -> Self {
        Frame::Text(payload.into())
    }

    /// Build a binary frame.
    pub fn binary(payload: impl Into<Bytes>) -> Self {
        Frame::Binary(payload.into())
    }

    pub fn is_close(&self) -> bool {
        matches!(self, Frame::Close(_))
    }

    /// Consume the frame and return its payload bytes.
    ///
    /// Returns `None` for close frames.
    pub fn into_payload(self) -> Option<Bytes> {
        // ---
        match self {
            Frame::Text(text) => Some(Bytes::from(text)),
            Frame::Binary(bytes) => Some(bytes),
            Frame::Close(_) => None,
        }
    }
}

/// Writer half of a duplex socket.
///
/// Callers serialize access; implementations may assume one `send` at a time.
#[async_trait::async_trait]
pub trait FrameWriter: Send {
    // ---
    /// Write one complete frame.
    async fn send(&mut self, frame: Frame) -> Result<()>;

    /// Send a close frame (or answer the peer's) and flush.
    ///
    /// Closing an already closed writer is not an error.
    async fn close(&mut self, reason: Option<CloseReason>) -> Result<()>;
}

/// Reader half of a duplex socket.
#[async_trait::async_trait]
pub trait FrameReader: Send {
    /// Wait for the next inbound frame.
    ///
    /// `None` means the stream ended without a close frame. Control frames
    /// such as ping/pong are handled by the implementation and never surface
    /// here.
    async fn next_frame(&mut self) -> Option<Result<Frame>>;
}

/// An established duplex connection, split into its two halves.
pub struct Socket {
    pub writer: Box<dyn FrameWriter>,
    pub reader: Box<dyn FrameReader>,
}

/// Performs the handshake against an endpoint.
///
/// Every call must produce a fresh socket; a socket that has failed is never
/// handed out again.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    // ---
    /// Short name used in log lines (e.g. `"websocket"`).
    fn name(&self) -> &str;

    /// Open a new socket to `endpoint`.
    ///
    /// Errors are reported as [`RelayError::Connection`](crate::RelayError::Connection).
    async fn connect(&self, endpoint: &str) -> Result<Socket>;
}

/// Shared connector pointer.
pub type ConnectorPtr = Arc<dyn Connector>;
