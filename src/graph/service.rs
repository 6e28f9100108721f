use uuid::Uuid;

use super::Graph;
use crate::{
    // ---
    log_debug,
    log_info,
    log_warn,
    Action,
    ConnectionManager,
    Envelope,
    ReplyEnvelope,
    Result,
};

/// Relays graph CRUD operations to the remote peer.
///
/// `create`, `update` and `delete` are fire-and-forget: they return once
/// the message is written. `get` is the only operation that waits for a
/// correlated reply.
#[derive(Clone)]
pub struct GraphService {
    connection: ConnectionManager,
}

impl GraphService {
    // ---
    pub fn new(connection: ConnectionManager) -> Self {
        Self { connection }
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    /// Validate `graph`, give it fresh ids and send it to the peer.
    ///
    /// Returns the graph as sent.
    pub async fn create(&self, graph: Graph) -> Result<Graph> {
        // ---
        graph.validate()?;

        let created = graph.with_fresh_ids();
        let frame = Envelope::new(Action::Create, &created).to_frame()?;
        self.connection.send(frame).await?;

        log_info!("graph {}: create sent", created.id);
        Ok(created)
    }

    /// Ask the peer for the graph stored under `id`.
    ///
    /// `Ok(None)` when the peer answers unsuccessfully or without data.
    pub async fn get(&self, id: Uuid) -> Result<Option<Graph>> {
        // ---
        log_debug!("graph {id}: requesting");

        let payload = self
            .connection
            .request(|correlation_id| {
                Envelope::new(Action::Get, id)
                    .with_correlation_id(correlation_id.clone())
                    .to_frame()
            })
            .await?;

        let reply = ReplyEnvelope::decode(&payload)?;

        match reply {
            ReplyEnvelope {
                success: true,
                data: Some(data),
                ..
            } if !data.is_null() => Ok(Some(serde_json::from_value(data)?)),
            ReplyEnvelope { error, .. } => {
                log_warn!(
                    "graph {id}: unsuccessful reply ({})",
                    error.as_deref().unwrap_or("no data")
                );
                Ok(None)
            }
        }
    }

    /// Validate `graph` and send it as the new content of `id`.
    pub async fn update(&self, id: Uuid, graph: Graph) -> Result<()> {
        // ---
        graph.validate()?;

        let updated = Graph { id, ..graph };
        let frame = Envelope::new(Action::Update, &updated).to_frame()?;
        self.connection.send(frame).await?;

        log_info!("graph {id}: update sent");
        Ok(())
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        // ---
        let frame = Envelope::new(Action::Delete, id).to_frame()?;
        self.connection.send(frame).await?;

        log_info!("graph {id}: delete sent");
        Ok(())
    }
}
