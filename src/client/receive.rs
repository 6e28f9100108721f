//! Background receive loop.
//!
//! Exactly one loop runs per open socket. It owns the reader half, routes
//! data frames to the [`CorrelationTable`] by correlation id, and on close or
//! fault fails every request written on its socket before exiting. It never restarts
//! itself; the next `connect()` spawns a new loop for a new socket.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time;

use super::pending::CorrelationTable;
use super::state::{ConnectionState, StateCell};
use super::{as_connection_error, SharedWriter};
use crate::{
    // ---
    log_debug,
    log_error,
    log_warn,
    CloseReason,
    Frame,
    FrameReader,
    MatcherPtr,
    RelayError,
};

/// Upper bound on echoing the peer's close frame.
const CLOSE_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(2);

pub(super) struct ReceiveLoop {
    pub(super) generation: u64,
    pub(super) endpoint: Arc<str>,
    pub(super) reader: Box<dyn FrameReader>,
    pub(super) writer: SharedWriter,
    pub(super) pending: Arc<CorrelationTable>,
    pub(super) state: Arc<StateCell>,
    pub(super) matcher: MatcherPtr,
}

impl ReceiveLoop {
    // ---
    pub(super) fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        // ---
        log_debug!("{}: receive loop started (generation {})", self.endpoint, self.generation);

        loop {
            match self.reader.next_frame().await {
                Some(Ok(Frame::Close(reason))) => {
                    self.handle_close(reason).await;
                    break;
                }
                Some(Ok(frame)) => self.dispatch(frame),
                Some(Err(err)) => {
                    self.handle_fault(err);
                    break;
                }
                None => {
                    self.handle_fault(RelayError::Connection(
                        "stream ended without a close frame".into(),
                    ));
                    break;
                }
            }
        }

        log_debug!("{}: receive loop stopped (generation {})", self.endpoint, self.generation);
    }

    /// Route one data frame to the request it answers, if any.
    fn dispatch(&self, frame: Frame) {
        // ---
        let Some(payload) = frame.into_payload() else {
            return;
        };

        match self.matcher.correlation_id(&payload) {
            Ok(Some(correlation_id)) => {
                if !self.pending.resolve(&correlation_id, payload) {
                    log_debug!("{}: no pending request for correlation_id: {correlation_id}", self.endpoint);
                }
            }
            Ok(None) => {
                log_debug!("{}: dropping unsolicited frame ({} bytes)", self.endpoint, payload.len());
            }
            Err(_err) => {
                log_warn!("{}: dropping malformed frame: {_err}", self.endpoint);
            }
        }
    }

    /// Orderly close initiated by the peer.
    ///
    /// Pending requests are failed before the close is echoed, so they are
    /// released even if the echo stalls or the loop is aborted by a
    /// reconnect.
    async fn handle_close(&mut self, reason: Option<CloseReason>) {
        // ---
        log_debug!("{}: peer sent close frame {reason:?}", self.endpoint);

        self.state.transition(self.generation, ConnectionState::Closing);

        let failed = self.pending.fail_generation(self.generation, RelayError::ConnectionClosed);
        if failed > 0 {
            log_warn!("{}: connection closed with {failed} request(s) pending", self.endpoint);
        }

        let echo = async {
            let mut writer = self.writer.lock().await;
            writer.close(reason).await
        };
        match time::timeout(CLOSE_HANDSHAKE_TIMEOUT, echo).await {
            Ok(Ok(())) => {}
            Ok(Err(_err)) => log_debug!("{}: close echo failed: {_err}", self.endpoint),
            Err(_) => log_warn!("{}: close echo timed out", self.endpoint),
        }

        self.state.transition(self.generation, ConnectionState::Closed);
    }

    /// Read failure: fan the error out to every pending request.
    fn handle_fault(&self, err: RelayError) {
        // ---
        let err = as_connection_error(err);

        log_error!("{}: receive failed: {err}", self.endpoint);

        self.state.transition(self.generation, ConnectionState::Faulted);

        let failed = self.pending.fail_generation(self.generation, err);
        if failed > 0 {
            log_warn!("{}: connection faulted with {failed} request(s) pending", self.endpoint);
        }
    }
}
