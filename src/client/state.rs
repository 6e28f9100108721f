use std::fmt;
use std::sync::{Mutex, MutexGuard};

use crate::log_info;

/// Lifecycle of the connection owned by a
/// [`ConnectionManager`](crate::ConnectionManager).
///
/// ```text
/// Disconnected → Connecting → Open → Closing → Closed
///                     └─────────┴──→ Faulted
/// ```
///
/// `Closed` and `Faulted` are terminal for the socket that reached them;
/// only a new `connect()` (which opens a fresh socket) leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    Closing,
    Closed,
    Faulted,
}

impl ConnectionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Faulted)
    }

    pub fn as_str(self) -> &'static str {
        // ---
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Closed => "closed",
            Self::Faulted => "faulted",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current state tagged with the generation of the socket it describes.
///
/// Each connection attempt bumps the generation. Receive loops and senders
/// only move the state of their own generation, so a loop still winding down
/// on an old socket cannot overwrite the state of a newer one.
pub(crate) struct StateCell {
    // ---
    endpoint: String,
    inner: Mutex<(u64, ConnectionState)>,
}

impl StateCell {
    // ---
    pub(crate) fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            inner: Mutex::new((0, ConnectionState::Disconnected)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, (u64, ConnectionState)> {
        // ---
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub(crate) fn get(&self) -> ConnectionState {
        self.lock().1
    }

    /// Start a new connection attempt; returns its generation.
    pub(crate) fn begin_connect(&self) -> u64 {
        // ---
        let mut inner = self.lock();
        inner.0 += 1;
        inner.1 = ConnectionState::Connecting;
        log_info!("{}: {} (generation {})", self.endpoint, inner.1, inner.0);
        inner.0
    }

    /// Move to `next` if `generation` is still current.
    pub(crate) fn transition(&self, generation: u64, next: ConnectionState) -> bool {
        // ---
        let mut inner = self.lock();
        if inner.0 != generation {
            return false;
        }
        if inner.1 != next {
            log_info!("{}: {} -> {}", self.endpoint, inner.1, next);
            inner.1 = next;
        }
        true
    }

    /// Move to `next` regardless of generation.
    pub(crate) fn force(&self, next: ConnectionState) {
        // ---
        let mut inner = self.lock();
        if inner.1 != next {
            log_info!("{}: {} -> {}", self.endpoint, inner.1, next);
            inner.1 = next;
        }
    }
}
