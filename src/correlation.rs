use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Token that matches a reply frame to the request that caused it.
///
/// The requester picks the id, embeds it in the outbound envelope, and the
/// remote peer echoes it back in its reply. Fresh ids are random 128-bit
/// UUID v4 values, so collisions between concurrent callers are not a
/// practical concern.
///
/// On the wire the id is a plain JSON string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Generate a new random correlation id.
    pub fn generate() -> Self {
        // ---
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for CorrelationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for CorrelationId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<Uuid> for CorrelationId {
    fn from(value: Uuid) -> Self {
        Self(value.to_string())
    }
}
