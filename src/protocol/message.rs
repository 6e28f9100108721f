use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{CorrelationId, Frame, Result};

/// Operation requested from the remote peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Create,
    Get,
    Update,
    Delete,
}

/// Outbound message: `{action, correlationId?, data, timestamp}`.
///
/// `correlationId` is present only on messages that expect a reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<CorrelationId>,
    pub data: T,
    pub timestamp: DateTime<Utc>,
}

impl<T: Serialize> Envelope<T> {
    /// Stamp a new envelope with the current UTC time.
    pub fn new(action: Action, data: T) -> Self {
        // ---
        Self {
            action,
            correlation_id: None,
            data,
            timestamp: Utc::now(),
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: CorrelationId) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    /// Encode as a JSON text frame.
    pub fn to_frame(&self) -> Result<Frame> {
        Ok(Frame::Text(serde_json::to_string(self)?))
    }
}

/// Reply from the remote peer: `{correlationId, success, data?, error?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyEnvelope {
    #[serde(default)]
    pub correlation_id: Option<CorrelationId>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReplyEnvelope {
    /// Successful reply carrying `data`.
    pub fn ok(correlation_id: CorrelationId, data: Value) -> Self {
        // ---
        Self {
            correlation_id: Some(correlation_id),
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Unsuccessful reply with an explanation.
    pub fn failure(correlation_id: CorrelationId, error: impl Into<String>) -> Self {
        // ---
        Self {
            correlation_id: Some(correlation_id),
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }

    pub fn decode(payload: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(payload)?)
    }

    pub fn to_frame(&self) -> Result<Frame> {
        Ok(Frame::Text(serde_json::to_string(self)?))
    }
}
