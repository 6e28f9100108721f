// src/client/mod.rs
//! Connection manager: correlated request/response over one duplex socket.
//!
//! This module contains [`ConnectionManager`], which owns at most one live
//! socket to the configured endpoint and turns it into a "send, then await
//! the matching reply or time out" primitive shared by any number of tasks.
//!
//! # Architecture
//!
//! - `connect()` performs the handshake through a [`Connector`](crate::Connector) and spawns
//!   one background receive loop for the new socket.
//! - `send()` connects lazily if needed, then writes one frame. Writers are
//!   serialized so frames never interleave.
//! - `send_and_await_reply()` registers a slot in the [`CorrelationTable`]
//!   under a fresh [`CorrelationId`], sends, then waits with no lock held.
//!   The receive loop completes the slot when a frame carrying that id
//!   arrives.
//!
//! # Failure model
//!
//! A timeout affects only its own caller. Connection-level failures (close
//! frame, read or write fault) fail every request written on that socket at
//! once and leave the connection `Closed` or `Faulted` until the next
//! `connect()`. Requests already written on a newer socket are untouched.
//! Nothing in here retries.

mod pending;
mod receive;
mod state;

pub use pending::{CorrelationTable, Outcome};
pub use state::ConnectionState;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time;

use pending::PendingSlot;
use receive::ReceiveLoop;
use state::StateCell;

use crate::{
    // ---
    log_debug,
    log_error,
    log_info,
    log_warn,
    ConnectorPtr,
    CorrelationId,
    Frame,
    FrameWriter,
    JsonReplyMatcher,
    MatcherPtr,
    RelayConfig,
    RelayError,
    Result,
    WebSocketConnector,
};

/// Upper bound on closing the writer during `dispose()`.
const DISPOSE_CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Writer half shared by senders and the receive loop (for the close echo).
pub(crate) type SharedWriter = Arc<Mutex<Box<dyn FrameWriter>>>;

/// Manages one duplex connection and the requests waiting on it.
///
/// Cheap to clone (internally `Arc`-backed). All clones share the same
/// socket and correlation table. Each manager owns its own table, so
/// independent managers never see each other's replies.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

struct Inner {
    // ---
    endpoint: Arc<str>,
    connector: ConnectorPtr,
    matcher: MatcherPtr,
    request_timeout: Duration,

    pending: Arc<CorrelationTable>,
    state: Arc<StateCell>,

    /// Current socket, if any. Held while connecting so only one handshake
    /// runs at a time.
    link: Mutex<Option<Link>>,

    disposed: AtomicBool,
}

struct Link {
    generation: u64,
    writer: SharedWriter,
    rx_task: JoinHandle<()>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        // ---
        if let Some(link) = self.link.get_mut().take() {
            link.rx_task.abort();
        }
    }
}

impl ConnectionManager {
    // ---
    /// Create a manager for `config.endpoint` using the given connector.
    ///
    /// Replies are matched with [`JsonReplyMatcher`]. No connection is made
    /// until the first `connect()` or `send()`.
    pub fn new(config: &RelayConfig, connector: ConnectorPtr) -> Self {
        Self::with_matcher(config, connector, Arc::new(JsonReplyMatcher))
    }

    /// Create a manager with a custom reply matcher.
    pub fn with_matcher(config: &RelayConfig, connector: ConnectorPtr, matcher: MatcherPtr) -> Self {
        // ---
        let endpoint: Arc<str> = Arc::from(config.endpoint.as_str());

        Self {
            inner: Arc::new(Inner {
                state: Arc::new(StateCell::new(endpoint.as_ref())),
                endpoint,
                connector,
                matcher,
                request_timeout: config.request_timeout,
                pending: Arc::new(CorrelationTable::new()),
                link: Mutex::new(None),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    /// Convenience constructor over the production WebSocket connector.
    pub fn websocket(config: &RelayConfig) -> Self {
        Self::new(config, Arc::new(WebSocketConnector))
    }

    pub fn endpoint(&self) -> &str {
        &self.inner.endpoint
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.inner.state.get()
    }

    /// The table of requests currently waiting for a reply.
    pub fn pending(&self) -> &CorrelationTable {
        &self.inner.pending
    }

    /// Establish the connection if it is not already open.
    ///
    /// Calling this while `Open` is a no-op. A `Closed` or `Faulted`
    /// connection is replaced by a fresh socket.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Connection`] if the handshake fails (the state
    /// becomes `Faulted`) or the manager has been disposed.
    pub async fn connect(&self) -> Result<()> {
        // ---
        let mut link = self.inner.link.lock().await;
        self.connect_locked(&mut link).await.map(|_| ())
    }

    async fn connect_locked(&self, link: &mut Option<Link>) -> Result<(u64, SharedWriter)> {
        // ---
        if self.inner.disposed.load(Ordering::Acquire) {
            return Err(RelayError::Connection("connection manager disposed".into()));
        }

        if self.inner.state.get() == ConnectionState::Open {
            if let Some(active) = link.as_ref() {
                return Ok((active.generation, Arc::clone(&active.writer)));
            }
        }

        // A previous socket that closed or faulted is never reused, and
        // nothing will answer what was written on it.
        if let Some(stale) = link.take() {
            log_debug!("{}: discarding generation {}", self.inner.endpoint, stale.generation);
            stale.rx_task.abort();

            let failed = self
                .inner
                .pending
                .fail_generation(stale.generation, RelayError::Connection("connection replaced".into()));
            if failed > 0 {
                log_warn!("{}: {failed} request(s) lost with generation {}", self.inner.endpoint, stale.generation);
            }
        }

        let generation = self.inner.state.begin_connect();

        let socket = match self.inner.connector.connect(&self.inner.endpoint).await {
            Ok(socket) => socket,
            Err(err) => {
                log_error!("{}: connect via {} failed: {err}", self.inner.endpoint, self.inner.connector.name());
                self.inner.state.transition(generation, ConnectionState::Faulted);
                return Err(as_connection_error(err));
            }
        };

        let writer: SharedWriter = Arc::new(Mutex::new(socket.writer));

        // Open before the loop starts so an immediate close or fault from
        // the peer is not overwritten.
        self.inner.state.transition(generation, ConnectionState::Open);

        let rx_task = ReceiveLoop {
            generation,
            endpoint: Arc::clone(&self.inner.endpoint),
            reader: socket.reader,
            writer: Arc::clone(&writer),
            pending: Arc::clone(&self.inner.pending),
            state: Arc::clone(&self.inner.state),
            matcher: Arc::clone(&self.inner.matcher),
        }
        .spawn();

        *link = Some(Link {
            generation,
            writer: Arc::clone(&writer),
            rx_task,
        });

        Ok((generation, writer))
    }

    /// Write one frame, connecting first if the connection is not open.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Connection`] if connecting or writing fails. A
    /// failed write leaves the connection `Faulted` and fails every request
    /// already written on that socket; the caller decides whether to retry.
    pub async fn send(&self, frame: Frame) -> Result<()> {
        // ---
        let (generation, writer) = self.open_writer().await?;
        self.write(generation, &writer, frame).await
    }

    async fn open_writer(&self) -> Result<(u64, SharedWriter)> {
        // ---
        let mut link = self.inner.link.lock().await;
        self.connect_locked(&mut link).await
    }

    async fn write(&self, generation: u64, writer: &SharedWriter, frame: Frame) -> Result<()> {
        // ---
        let result = writer.lock().await.send(frame).await;

        if let Err(err) = result {
            let err = as_connection_error(err);
            log_error!("{}: write failed: {err}", self.inner.endpoint);

            self.inner.state.transition(generation, ConnectionState::Faulted);

            let failed = self.inner.pending.fail_generation(generation, err.clone());
            if failed > 0 {
                log_warn!("{}: write fault failed {failed} pending request(s)", self.inner.endpoint);
            }
            return Err(err);
        }

        Ok(())
    }

    /// Send without waiting for any reply. Same as [`send`](Self::send).
    pub async fn send_fire_and_forget(&self, frame: Frame) -> Result<()> {
        self.send(frame).await
    }

    /// Send a request and wait for the reply that echoes its correlation id.
    ///
    /// `encode` receives the freshly generated id and must embed it in the
    /// frame so the remote peer can echo it back.
    ///
    /// Exactly one outcome is returned:
    /// - the reply payload;
    /// - [`RelayError::Timeout`] if `timeout` elapses first;
    /// - [`RelayError::Connection`] / [`RelayError::ConnectionClosed`] if the
    ///   connection fails or closes first.
    ///
    /// The pending entry is removed on every exit path, including when the
    /// returned future is dropped.
    pub async fn send_and_await_reply<F>(&self, encode: F, timeout: Duration) -> Result<Bytes>
    where
        F: FnOnce(&CorrelationId) -> Result<Frame>,
    {
        // ---
        let slot = PendingSlot::register(&self.inner.pending, CorrelationId::generate())?;
        let frame = encode(slot.correlation_id())?;

        let (generation, writer) = self.open_writer().await?;
        if !self.inner.pending.bind(slot.correlation_id(), generation) {
            return Err(RelayError::Connection(
                "connection lost before the request was sent".into(),
            ));
        }
        self.write(generation, &writer, frame).await?;

        let outcome = slot.wait(timeout).await;

        if let Err(RelayError::Timeout) = &outcome {
            log_warn!("{}: request timed out after {timeout:?}", self.inner.endpoint);
        }

        outcome
    }

    /// [`send_and_await_reply`](Self::send_and_await_reply) with the
    /// configured default timeout.
    pub async fn request<F>(&self, encode: F) -> Result<Bytes>
    where
        F: FnOnce(&CorrelationId) -> Result<Frame>,
    {
        self.send_and_await_reply(encode, self.inner.request_timeout)
            .await
    }

    /// Tear the connection down and release the socket.
    ///
    /// Idempotent: only the first call does anything. Aborts and joins the
    /// receive loop (even if it is blocked on a read), closes the writer,
    /// fails all pending requests, and leaves the state `Closed`. Later
    /// `connect()`/`send()` calls fail.
    pub async fn dispose(&self) {
        // ---
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            log_debug!("{}: already disposed", self.inner.endpoint);
            return;
        }

        log_info!("{}: disposing connection", self.inner.endpoint);

        let link = self.inner.link.lock().await.take();

        if let Some(link) = link {
            self.inner.state.transition(link.generation, ConnectionState::Closing);
            self.inner
                .pending
                .fail_generation(link.generation, RelayError::Connection("connection manager disposed".into()));

            link.rx_task.abort();
            if let Err(err) = link.rx_task.await {
                if !err.is_cancelled() {
                    log_warn!("{}: receive loop ended abnormally: {err}", self.inner.endpoint);
                }
            }

            let close = async {
                let mut writer = link.writer.lock().await;
                writer.close(None).await
            };
            match time::timeout(DISPOSE_CLOSE_TIMEOUT, close).await {
                Ok(Ok(())) => {}
                Ok(Err(_err)) => log_debug!("{}: close during dispose failed: {_err}", self.inner.endpoint),
                Err(_) => log_warn!("{}: close during dispose timed out", self.inner.endpoint),
            }
        }

        self.inner.state.force(ConnectionState::Closed);

        let failed = self
            .inner
            .pending
            .drain_all(RelayError::Connection("connection manager disposed".into()));
        if failed > 0 {
            log_warn!("{}: disposed with {failed} request(s) pending", self.inner.endpoint);
        }
    }
}

/// Socket-level failures always surface as [`RelayError::Connection`].
pub(crate) fn as_connection_error(err: RelayError) -> RelayError {
    // ---
    match err {
        err @ RelayError::Connection(_) => err,
        other => RelayError::Connection(other.to_string()),
    }
}
