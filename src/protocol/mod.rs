//! Wire envelope and reply correlation.
//!
//! Outbound messages are `{action, correlationId?, data, timestamp}` JSON
//! objects. The remote peer echoes `correlationId` in its reply, which is how
//! the receive loop finds the waiting caller.
mod matcher;
mod message;

pub use matcher::{JsonReplyMatcher, MatcherPtr, ReplyMatcher};
pub use message::{Action, Envelope, ReplyEnvelope};
