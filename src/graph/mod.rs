//! Graph entity and the service that relays its CRUD operations.
//!
//! The relay keeps no graph state of its own. Every operation becomes one
//! [`Envelope`](crate::Envelope) sent to the remote peer; only `get` waits
//! for a reply.

mod model;
mod service;

pub use model::{Edge, Graph, Node, REQUIRED_EDGE_COUNT};
pub use service::GraphService;
