// tests/common/mod.rs

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde_json::Value;
use tokio::task::JoinHandle;

use graph_relay::{
    //
    Action,
    ConnectionManager,
    ConnectionState,
    CorrelationId,
    Envelope,
    Frame,
    MemoryConnector,
    MemoryPeer,
    MemorySession,
    RelayConfig,
    ReplyEnvelope,
    Result,
};

pub const ENDPOINT: &str = "memory://relay-test";

/// Manager over an in-memory socket pair.
pub fn memory_manager(request_timeout: Duration) -> (ConnectionManager, MemoryPeer) {
    // ---
    init_logging();

    let (connector, peer) = MemoryConnector::pair();
    let config = RelayConfig::default()
        .with_endpoint(ENDPOINT)
        .with_request_timeout(request_timeout);

    (ConnectionManager::new(&config, Arc::new(connector)), peer)
}

/// Send a `Get` request carrying `data` and wait for its reply.
pub async fn get(manager: &ConnectionManager, data: &str, timeout: Duration) -> Result<Bytes> {
    // ---
    let data = data.to_owned();
    manager
        .send_and_await_reply(
            move |correlation_id| {
                Envelope::new(Action::Get, data)
                    .with_correlation_id(correlation_id.clone())
                    .to_frame()
            },
            timeout,
        )
        .await
}

/// Parse a frame the client wrote.
pub fn parse(frame: Frame) -> Value {
    // ---
    let payload = frame.into_payload().expect("expected a data frame");
    serde_json::from_slice(&payload).expect("client wrote invalid JSON")
}

pub fn correlation_id_of(request: &Value) -> CorrelationId {
    CorrelationId::from(request["correlationId"].as_str().expect("request without correlationId"))
}

/// Reply to `request`, echoing its `data`.
pub async fn reply_echo(session: &MemorySession, request: &Value) {
    // ---
    let reply = ReplyEnvelope::ok(correlation_id_of(request), request["data"].clone());
    session.send(reply.to_frame().unwrap()).await.unwrap();
}

/// Data of a successful reply.
pub fn reply_data(payload: &Bytes) -> Value {
    // ---
    let reply = ReplyEnvelope::decode(payload).unwrap();
    assert!(reply.success);
    reply.data.unwrap_or(Value::Null)
}

/// Peer that answers every correlated request on every session with an echo.
pub fn spawn_echo_peer(mut peer: MemoryPeer) -> JoinHandle<()> {
    // ---
    tokio::spawn(async move {
        while let Some(mut session) = peer.accept().await {
            tokio::spawn(async move {
                while let Some(frame) = session.recv().await {
                    if frame.is_close() {
                        break;
                    }
                    let request = parse(frame);
                    if request.get("correlationId").is_some() {
                        reply_echo(&session, &request).await;
                    }
                }
            });
        }
    })
}

/// Poll until the manager reaches `state`.
pub async fn wait_for_state(manager: &ConnectionManager, state: ConnectionState) {
    // ---
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while manager.state() != state {
        assert!(
            tokio::time::Instant::now() < deadline,
            "state stuck at {} waiting for {state}",
            manager.state()
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[cfg(feature = "logging")]
mod imp {
    use std::sync::Once;

    static INIT: Once = Once::new();

    pub fn init() {
        INIT.call_once(|| {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .with_test_writer()
                .try_init();
        });
    }
}

#[cfg(not(feature = "logging"))]
mod imp {
    pub fn init() {}
}

pub fn init_logging() {
    imp::init();
}
