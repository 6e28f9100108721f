// tests/websocket.rs
//
// Runs the connection manager against a real local WebSocket peer.

mod common;

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

use graph_relay::{
    //
    ConnectionManager,
    ConnectionState,
    RelayConfig,
    RelayError,
};

use common::{get, init_logging, reply_data, wait_for_state};

const LONG: Duration = Duration::from_secs(5);

/// What the test peer does with each correlated request.
#[derive(Clone, Copy)]
enum PeerMode {
    /// Echo `data` back under the same correlation id.
    Echo,
    /// Close the socket after the first request.
    CloseAfterFirst,
}

struct TestPeer {
    // ---
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl TestPeer {
    // ---
    async fn start(mode: PeerMode) -> Self {
        // ---
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, mode));
            }
        });

        Self { addr, handle }
    }

    fn endpoint(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    fn manager(&self) -> ConnectionManager {
        // ---
        init_logging();
        let config = RelayConfig::default().with_endpoint(self.endpoint());
        ConnectionManager::websocket(&config)
    }
}

impl Drop for TestPeer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve(stream: tokio::net::TcpStream, mode: PeerMode) {
    // ---
    let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
        return;
    };

    while let Some(Ok(message)) = ws.next().await {
        let text = match message {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };

        let request: Value = serde_json::from_str(text.as_str()).unwrap();
        let Some(correlation_id) = request.get("correlationId").cloned() else {
            continue;
        };

        match mode {
            PeerMode::Echo => {
                let reply = json!({
                    "correlationId": correlation_id,
                    "success": true,
                    "data": request["data"],
                });
                if ws.send(Message::text(reply.to_string())).await.is_err() {
                    break;
                }
            }
            PeerMode::CloseAfterFirst => {
                let _ = ws
                    .close(Some(CloseFrame {
                        code: CloseCode::Normal,
                        reason: "bye".into(),
                    }))
                    .await;
                // Drain until the client's close echo arrives.
                while let Some(Ok(message)) = ws.next().await {
                    if message.is_close() {
                        break;
                    }
                }
                break;
            }
        }
    }
}

#[tokio::test]
async fn test_request_over_websocket() {
    // ---
    let peer = TestPeer::start(PeerMode::Echo).await;
    let manager = peer.manager();

    let payload = get(&manager, "hello", LONG).await.unwrap();

    assert_eq!(reply_data(&payload), "hello");
    assert_eq!(manager.state(), ConnectionState::Open);

    manager.dispose().await;
    assert_eq!(manager.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn test_concurrent_requests_over_websocket() {
    // ---
    let peer = TestPeer::start(PeerMode::Echo).await;
    let manager = peer.manager();
    manager.connect().await.unwrap();

    let handles: Vec<_> = (0..20)
        .map(|i| {
            let manager = manager.clone();
            tokio::spawn(async move { get(&manager, &format!("n{i}"), LONG).await })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let payload = handle.await.unwrap().unwrap();
        assert_eq!(reply_data(&payload), format!("n{i}").as_str());
    }

    assert!(manager.pending().is_empty());
    manager.dispose().await;
}

#[tokio::test]
async fn test_server_close_fails_pending_request() {
    // ---
    let peer = TestPeer::start(PeerMode::CloseAfterFirst).await;
    let manager = peer.manager();

    let outcome = get(&manager, "bye", LONG).await;

    assert!(matches!(outcome, Err(RelayError::ConnectionClosed)), "{outcome:?}");
    wait_for_state(&manager, ConnectionState::Closed).await;
    assert!(manager.pending().is_empty());
}

#[tokio::test]
async fn test_handshake_failure_is_connection_error() {
    // ---
    init_logging();

    // Bind then drop to get a port nobody listens on.
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let config = RelayConfig::default().with_endpoint(format!("ws://{addr}/ws"));
    let manager = ConnectionManager::websocket(&config);

    let err = manager.connect().await.unwrap_err();

    assert!(matches!(err, RelayError::Connection(_)));
    assert_eq!(manager.state(), ConnectionState::Faulted);
}
