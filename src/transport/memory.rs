//! In-memory duplex transport.
//!
//! This module provides a pure in-process implementation of the domain-level
//! [`Connector`] trait. It is intended primarily for testing and as the
//! reference for socket semantics.
//!
//! ## Reference Semantics
//!
//! - Every successful `connect()` produces a brand-new [`MemorySession`] on
//!   the [`MemoryPeer`] side; sessions are never reused.
//! - Frames written by the client arrive at the session in write order.
//! - Frames pushed by the session arrive at the client reader in push order.
//! - Dropping the session ends the client's read stream without a close
//!   frame, and makes further client writes fail.
//!
//! ## Non-Goals
//!
//! This transport does not emulate network latency, partial writes, or any
//! specific protocol's control frames.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::{
    // ---
    log_debug,
    CloseReason,
    Connector,
    Frame,
    FrameReader,
    FrameWriter,
    RelayError,
    Result,
    Socket,
};

const FRAME_BUFFER: usize = 16;

struct Shared {
    sessions: mpsc::UnboundedSender<MemorySession>,
    refuse: AtomicBool,
    connects: AtomicUsize,
}

/// Connector half of an in-memory socket pair.
///
/// # ⚠️  Testing Only
///
/// Production code should use
/// [`WebSocketConnector`](crate::WebSocketConnector).
#[derive(Clone)]
pub struct MemoryConnector {
    shared: Arc<Shared>,
}

/// Remote side of an in-memory socket pair.
///
/// Tests use it to play the remote peer: accept sessions, read what the
/// client wrote, and push replies, close frames, or faults back.
pub struct MemoryPeer {
    sessions: mpsc::UnboundedReceiver<MemorySession>,
    shared: Arc<Shared>,
}

impl MemoryConnector {
    /// Create a connector and the peer that will accept its connections.
    pub fn pair() -> (Self, MemoryPeer) {
        // ---
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            sessions: tx,
            refuse: AtomicBool::new(false),
            connects: AtomicUsize::new(0),
        });

        let connector = Self {
            shared: Arc::clone(&shared),
        };
        let peer = MemoryPeer {
            sessions: rx,
            shared,
        };
        (connector, peer)
    }
}

#[async_trait::async_trait]
impl Connector for MemoryConnector {
    // ---
    fn name(&self) -> &str {
        "memory"
    }

    async fn connect(&self, endpoint: &str) -> Result<Socket> {
        // ---
        if self.shared.refuse.load(Ordering::Acquire) {
            return Err(RelayError::Connection(format!(
                "{endpoint}: connection refused"
            )));
        }

        let (out_tx, out_rx) = mpsc::channel(FRAME_BUFFER);
        let (in_tx, in_rx) = mpsc::channel(FRAME_BUFFER);

        let session = MemorySession {
            endpoint: endpoint.to_owned(),
            outbound: out_rx,
            inbound: in_tx,
        };

        self.shared
            .sessions
            .send(session)
            .map_err(|_| RelayError::Connection(format!("{endpoint}: memory peer dropped")))?;

        self.shared.connects.fetch_add(1, Ordering::AcqRel);
        log_debug!("memory: connected to {endpoint}");

        Ok(Socket {
            writer: Box::new(MemoryWriter { tx: Some(out_tx) }),
            reader: Box::new(MemoryReader { rx: in_rx }),
        })
    }
}

impl MemoryPeer {
    /// Wait for the next client connection.
    ///
    /// Returns `None` once every connector clone has been dropped.
    pub async fn accept(&mut self) -> Option<MemorySession> {
        self.sessions.recv().await
    }

    /// Make subsequent handshakes fail (or succeed again).
    pub fn refuse_connections(&self, refuse: bool) {
        self.shared.refuse.store(refuse, Ordering::Release);
    }

    /// Number of successful handshakes so far.
    pub fn connection_count(&self) -> usize {
        self.shared.connects.load(Ordering::Acquire)
    }
}

/// Peer end of one in-memory connection.
pub struct MemorySession {
    endpoint: String,
    outbound: mpsc::Receiver<Frame>,
    inbound: mpsc::Sender<Result<Frame>>,
}

impl MemorySession {
    /// Endpoint the client dialed.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Next frame written by the client, or `None` once the client writer is
    /// gone.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.outbound.recv().await
    }

    /// Stop taking client frames. The client's next write fails while its
    /// reader stays open.
    pub fn stop_reading(&mut self) {
        self.outbound.close();
    }

    /// Deliver a frame to the client reader.
    pub async fn send(&self, frame: Frame) -> Result<()> {
        // ---
        self.inbound
            .send(Ok(frame))
            .await
            .map_err(|_| RelayError::Connection("memory client reader dropped".into()))
    }

    /// Start an orderly close from the peer side.
    pub async fn close(&self, reason: Option<CloseReason>) -> Result<()> {
        self.send(Frame::Close(reason)).await
    }

    /// Make the client's next read fail with `message`.
    pub async fn fault(&self, message: impl Into<String>) -> Result<()> {
        // ---
        self.inbound
            .send(Err(RelayError::Connection(message.into())))
            .await
            .map_err(|_| RelayError::Connection("memory client reader dropped".into()))
    }
}

struct MemoryWriter {
    tx: Option<mpsc::Sender<Frame>>,
}

#[async_trait::async_trait]
impl FrameWriter for MemoryWriter {
    // ---
    async fn send(&mut self, frame: Frame) -> Result<()> {
        // ---
        if let Frame::Close(reason) = frame {
            return self.close(reason).await;
        }

        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| RelayError::Connection("memory socket already closed".into()))?;

        tx.send(frame)
            .await
            .map_err(|_| RelayError::Connection("memory peer hung up".into()))
    }

    async fn close(&mut self, reason: Option<CloseReason>) -> Result<()> {
        // ---
        if let Some(tx) = self.tx.take() {
            // Peer may already be gone; closing is best-effort.
            let _ = tx.send(Frame::Close(reason)).await;
        }
        Ok(())
    }
}

struct MemoryReader {
    rx: mpsc::Receiver<Result<Frame>>,
}

#[async_trait::async_trait]
impl FrameReader for MemoryReader {
    async fn next_frame(&mut self) -> Option<Result<Frame>> {
        self.rx.recv().await
    }
}
