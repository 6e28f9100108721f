//! Domain layer public interface.
//!
//! This module defines the socket abstractions that are independent of any
//! concrete wire protocol or client library.
//!
//! All domain consumers must import symbols via this module, not by
//! referencing individual files directly.

mod transport;

// --- Transport domain re-exports ---

pub use transport::{
    //
    CloseReason,
    Connector,
    ConnectorPtr,
    Frame,
    FrameReader,
    FrameWriter,
    Socket,
    NORMAL_CLOSURE,
};
