//! HTTP surface for the graph relay.
//!
//! ```text
//! POST   /api/graph        create   -> 201 + Location
//! GET    /api/graph/{id}   get      -> 200 | 404
//! PUT    /api/graph/{id}   update   -> 200
//! DELETE /api/graph/{id}   delete   -> 200
//! GET    /test             liveness
//! ```

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use uuid::Uuid;

use crate::{
    // ---
    log_error,
    Graph,
    GraphService,
    RelayError,
};

/// Body returned by `GET /test`.
pub const LIVENESS_MESSAGE: &str = "graph-relay is running!";

/// Build the router over `service`.
pub fn router(service: GraphService) -> Router {
    // ---
    Router::new()
        .route("/api/graph", axum::routing::post(create_graph))
        .route(
            "/api/graph/{id}",
            get(get_graph).put(update_graph).delete(delete_graph),
        )
        .route("/test", get(liveness))
        .with_state(service)
}

/// Handler failure mapped to an HTTP status.
#[derive(Debug)]
pub enum ApiError {
    NotFound,
    Relay(RelayError),
}

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        Self::Relay(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // ---
        match self {
            Self::NotFound => StatusCode::NOT_FOUND.into_response(),
            Self::Relay(RelayError::Validation(message)) => {
                (StatusCode::BAD_REQUEST, message).into_response()
            }
            Self::Relay(RelayError::Timeout) => {
                log_error!("http: upstream request timed out");
                (StatusCode::GATEWAY_TIMEOUT, "Upstream request timed out").into_response()
            }
            Self::Relay(err) if err.is_connection_level() => {
                log_error!("http: upstream unavailable: {err}");
                (StatusCode::BAD_GATEWAY, "Upstream unavailable").into_response()
            }
            Self::Relay(_err) => {
                log_error!("http: request failed: {_err}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}

async fn create_graph(
    State(service): State<GraphService>,
    Json(graph): Json<Graph>,
) -> Result<Response, ApiError> {
    // ---
    let created = service.create(graph).await?;
    let location = format!("/api/graph/{}", created.id);

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(created),
    )
        .into_response())
}

async fn get_graph(
    State(service): State<GraphService>,
    Path(id): Path<Uuid>,
) -> Result<Json<Graph>, ApiError> {
    // ---
    match service.get(id).await? {
        Some(graph) => Ok(Json(graph)),
        None => Err(ApiError::NotFound),
    }
}

async fn update_graph(
    State(service): State<GraphService>,
    Path(id): Path<Uuid>,
    Json(graph): Json<Graph>,
) -> Result<StatusCode, ApiError> {
    // ---
    service.update(id, graph).await?;
    Ok(StatusCode::OK)
}

async fn delete_graph(
    State(service): State<GraphService>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    // ---
    service.delete(id).await?;
    Ok(StatusCode::OK)
}

async fn liveness() -> &'static str {
    LIVENESS_MESSAGE
}
