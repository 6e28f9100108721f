use std::sync::Arc;

use serde_json::Value;

use crate::{CorrelationId, RelayError, Result};

/// Extracts the echoed correlation id from an inbound payload.
///
/// The receive loop calls this once per data frame and routes the frame
/// solely by the returned id.
///
/// - `Ok(Some(id))`: the frame answers the request registered under `id`.
/// - `Ok(None)`: a well-formed frame that answers nothing (unsolicited).
/// - `Err(RelayError::Protocol(_))`: malformed frame; it is dropped.
pub trait ReplyMatcher: Send + Sync {
    fn correlation_id(&self, payload: &[u8]) -> Result<Option<CorrelationId>>;
}

/// Shared matcher pointer.
pub type MatcherPtr = Arc<dyn ReplyMatcher>;

/// Reads the top-level `correlationId` string of a JSON object.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonReplyMatcher;

impl ReplyMatcher for JsonReplyMatcher {
    // ---
    fn correlation_id(&self, payload: &[u8]) -> Result<Option<CorrelationId>> {
        // ---
        let value: Value = serde_json::from_slice(payload)
            .map_err(|err| RelayError::Protocol(format!("inbound frame is not JSON: {err}")))?;

        let Value::Object(fields) = value else {
            return Err(RelayError::Protocol(
                "inbound frame is not a JSON object".into(),
            ));
        };

        match fields.get("correlationId") {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(id)) => Ok(Some(CorrelationId::from(id.as_str()))),
            Some(other) => Err(RelayError::Protocol(format!(
                "correlationId must be a string, got {other}"
            ))),
        }
    }
}
