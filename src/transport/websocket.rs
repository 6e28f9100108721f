//! WebSocket transport built on `tokio-tungstenite`.
//!
//! One [`WebSocketConnector::connect`] call performs one client handshake
//! and splits the resulting stream: the sink becomes the [`FrameWriter`],
//! the stream becomes the [`FrameReader`].
//!
//! Ping/pong is handled inside tungstenite. Pong replies are queued by the
//! library and flushed on the next write, so they never surface as frames.

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::{
    // ---
    log_debug,
    log_error,
    CloseReason,
    Connector,
    Frame,
    FrameReader,
    FrameWriter,
    RelayError,
    Result,
    Socket,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Production connector: dials `ws://` or `wss://` endpoints.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebSocketConnector;

#[async_trait::async_trait]
impl Connector for WebSocketConnector {
    // ---
    fn name(&self) -> &str {
        "websocket"
    }

    async fn connect(&self, endpoint: &str) -> Result<Socket> {
        // ---
        let (ws, _response) = connect_async(endpoint).await.map_err(|err| {
            log_error!("websocket: handshake with {endpoint} failed: {err}");
            RelayError::Connection(format!("handshake with {endpoint} failed: {err}"))
        })?;

        log_debug!("websocket: handshake with {endpoint} complete");

        let (sink, stream) = ws.split();

        Ok(Socket {
            writer: Box::new(WsWriter { sink }),
            reader: Box::new(WsReader { stream }),
        })
    }
}

struct WsWriter {
    sink: SplitSink<WsStream, Message>,
}

#[async_trait::async_trait]
impl FrameWriter for WsWriter {
    // ---
    async fn send(&mut self, frame: Frame) -> Result<()> {
        // ---
        let message = match frame {
            Frame::Text(text) => Message::Text(text.into()),
            Frame::Binary(bytes) => Message::Binary(bytes),
            Frame::Close(reason) => return self.close(reason).await,
        };

        self.sink
            .send(message)
            .await
            .map_err(|err| RelayError::Connection(format!("websocket write failed: {err}")))
    }

    async fn close(&mut self, reason: Option<CloseReason>) -> Result<()> {
        // ---
        let frame = reason.map(|reason| CloseFrame {
            code: CloseCode::from(reason.code),
            reason: reason.reason.into(),
        });

        match self.sink.send(Message::Close(frame)).await {
            Ok(()) => {}
            Err(err) if is_already_closed(&err) => return Ok(()),
            Err(err) => {
                return Err(RelayError::Connection(format!(
                    "websocket close failed: {err}"
                )))
            }
        }

        match self.sink.close().await {
            Ok(()) => Ok(()),
            Err(err) if is_already_closed(&err) => Ok(()),
            Err(err) => Err(RelayError::Connection(format!(
                "websocket close failed: {err}"
            ))),
        }
    }
}

struct WsReader {
    stream: SplitStream<WsStream>,
}

#[async_trait::async_trait]
impl FrameReader for WsReader {
    // ---
    async fn next_frame(&mut self) -> Option<Result<Frame>> {
        // ---
        loop {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(err) => {
                    return Some(Err(RelayError::Connection(format!(
                        "websocket read failed: {err}"
                    ))))
                }
            };

            let frame = match message {
                Message::Text(text) => Frame::Text(text.as_str().to_owned()),
                Message::Binary(bytes) => Frame::Binary(bytes),
                Message::Close(close) => Frame::Close(close.map(|close| CloseReason {
                    code: u16::from(close.code),
                    reason: close.reason.as_str().to_owned(),
                })),
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            };

            return Some(Ok(frame));
        }
    }
}

fn is_already_closed(err: &tungstenite::Error) -> bool {
    // ---
    matches!(
        err,
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed
    )
}
