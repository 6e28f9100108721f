// tests/http.rs

mod common;

use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use graph_relay::{
    //
    Graph,
    GraphService,
    MemoryPeer,
    ReplyEnvelope,
};

use common::{correlation_id_of, memory_manager, parse};

fn app(request_timeout: Duration) -> (Router, MemoryPeer) {
    // ---
    let (manager, peer) = memory_manager(request_timeout);
    (graph_relay::http::router(GraphService::new(manager)), peer)
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn empty_request(method: Method, uri: &str) -> Request<Body> {
    Request::builder().method(method).uri(uri).body(Body::empty()).unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn two_edge_graph() -> Value {
    json!({
        "node": { "label": "root" },
        "edges": [{ "label": "left" }, { "label": "right" }]
    })
}

/// Peer that knows exactly one graph.
fn spawn_store_peer(mut peer: MemoryPeer, stored: Graph) {
    // ---
    tokio::spawn(async move {
        let Some(mut session) = peer.accept().await else {
            return;
        };
        while let Some(frame) = session.recv().await {
            if frame.is_close() {
                break;
            }
            let request = parse(frame);
            if request["action"] != "Get" {
                continue;
            }
            let correlation_id = correlation_id_of(&request);
            let reply = if request["data"] == stored.id.to_string() {
                ReplyEnvelope::ok(correlation_id, serde_json::to_value(&stored).unwrap())
            } else {
                ReplyEnvelope::failure(correlation_id, "not found")
            };
            session.send(reply.to_frame().unwrap()).await.unwrap();
        }
    });
}

#[tokio::test]
async fn test_liveness() {
    // ---
    let (app, _peer) = app(Duration::from_secs(1));

    let response = app.oneshot(empty_request(Method::GET, "/test")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, graph_relay::http::LIVENESS_MESSAGE);
}

#[tokio::test]
async fn test_create_returns_created_with_location() {
    // ---
    let (app, mut peer) = app(Duration::from_secs(1));

    let response = app
        .oneshot(json_request(Method::POST, "/api/graph", two_edge_graph()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let location = response.headers()[header::LOCATION].to_str().unwrap().to_owned();

    let created: Graph = serde_json::from_str(&body_text(response).await).unwrap();
    assert!(!created.id.is_nil());
    assert_eq!(location, format!("/api/graph/{}", created.id));

    let mut session = peer.accept().await.unwrap();
    let sent = parse(session.recv().await.unwrap());
    assert_eq!(sent["action"], "Create");
    assert_eq!(sent["data"]["id"], created.id.to_string());
}

#[tokio::test]
async fn test_create_with_wrong_edge_count_is_bad_request() {
    // ---
    let (app, peer) = app(Duration::from_secs(1));
    let body = json!({ "node": { "label": "root" }, "edges": [{ "label": "only" }] });

    let response = app.oneshot(json_request(Method::POST, "/api/graph", body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_text(response).await, "Graph must have exactly 2 edges");
    assert_eq!(peer.connection_count(), 0);
}

#[tokio::test]
async fn test_get_found_and_not_found() {
    // ---
    let (app, peer) = app(Duration::from_secs(2));
    let stored: Graph = serde_json::from_value(two_edge_graph()).unwrap();
    let stored = stored.with_fresh_ids();
    spawn_store_peer(peer, stored.clone());

    let found = app
        .clone()
        .oneshot(empty_request(Method::GET, &format!("/api/graph/{}", stored.id)))
        .await
        .unwrap();
    assert_eq!(found.status(), StatusCode::OK);
    let graph: Graph = serde_json::from_str(&body_text(found).await).unwrap();
    assert_eq!(graph, stored);

    let missing = app
        .oneshot(empty_request(Method::GET, &format!("/api/graph/{}", Uuid::new_v4())))
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_get_timeout_is_gateway_timeout() {
    // ---
    let (app, _peer) = app(Duration::from_millis(50));

    let response = app
        .oneshot(empty_request(Method::GET, &format!("/api/graph/{}", Uuid::new_v4())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
}

#[tokio::test]
async fn test_unreachable_peer_is_bad_gateway() {
    // ---
    let (app, peer) = app(Duration::from_secs(1));
    peer.refuse_connections(true);

    let response = app
        .oneshot(empty_request(Method::DELETE, &format!("/api/graph/{}", Uuid::new_v4())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_update_and_delete() {
    // ---
    let (app, mut peer) = app(Duration::from_secs(1));
    let id = Uuid::new_v4();

    let updated = app
        .clone()
        .oneshot(json_request(Method::PUT, &format!("/api/graph/{id}"), two_edge_graph()))
        .await
        .unwrap();
    assert_eq!(updated.status(), StatusCode::OK);

    let invalid = app
        .clone()
        .oneshot(json_request(
            Method::PUT,
            &format!("/api/graph/{id}"),
            json!({ "node": { "label": "x" }, "edges": [] }),
        ))
        .await
        .unwrap();
    assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);

    let deleted = app
        .oneshot(empty_request(Method::DELETE, &format!("/api/graph/{id}")))
        .await
        .unwrap();
    assert_eq!(deleted.status(), StatusCode::OK);

    let mut session = peer.accept().await.unwrap();
    let update = parse(session.recv().await.unwrap());
    assert_eq!(update["action"], "Update");
    assert_eq!(update["data"]["id"], id.to_string());

    let delete = parse(session.recv().await.unwrap());
    assert_eq!(delete["action"], "Delete");
    assert_eq!(delete["data"], id.to_string());
}
