use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{RelayError, Result};

/// Number of edges every graph must carry.
pub const REQUIRED_EDGE_COUNT: usize = 2;

/// A labelled node.
///
/// Field names are camelCase on the wire; PascalCase is accepted on input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    #[serde(default, alias = "Id")]
    pub id: Uuid,
    #[serde(default, alias = "Label")]
    pub label: String,
}

/// A labelled edge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    #[serde(default, alias = "Id")]
    pub id: Uuid,
    #[serde(default, alias = "Label")]
    pub label: String,
}

/// One node plus its edges.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Graph {
    #[serde(default, alias = "Id")]
    pub id: Uuid,
    #[serde(default, alias = "Node")]
    pub node: Node,
    #[serde(default, alias = "Edges")]
    pub edges: Vec<Edge>,
}

impl Graph {
    /// Check the business rules.
    ///
    /// # Errors
    ///
    /// [`RelayError::Validation`] unless the graph has exactly
    /// [`REQUIRED_EDGE_COUNT`] edges.
    pub fn validate(&self) -> Result<()> {
        // ---
        if self.edges.len() != REQUIRED_EDGE_COUNT {
            return Err(RelayError::Validation(format!(
                "Graph must have exactly {REQUIRED_EDGE_COUNT} edges"
            )));
        }
        Ok(())
    }

    /// Copy with new random ids for the graph, its node and every edge.
    pub fn with_fresh_ids(&self) -> Self {
        // ---
        Self {
            id: Uuid::new_v4(),
            node: Node {
                id: Uuid::new_v4(),
                label: self.node.label.clone(),
            },
            edges: self
                .edges
                .iter()
                .map(|edge| Edge {
                    id: Uuid::new_v4(),
                    label: edge.label.clone(),
                })
                .collect(),
        }
    }
}
