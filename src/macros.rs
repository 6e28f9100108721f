// src/macros.rs

//
// Logging macros
//
// logging feature enabled  → tracing, under the `graph_relay` target
// logging feature disabled → log_error goes to stderr, the rest compile out
//

#![allow(unused_macros)]

#[cfg(feature = "logging")]
macro_rules! relay_log {
    ($level:ident, $($arg:tt)*) => {
        tracing::$level!(target: "graph_relay", $($arg)*)
    };
}

#[cfg(not(feature = "logging"))]
macro_rules! relay_log {
    ($level:ident, $($arg:tt)*) => {
        ()
    };
}

#[cfg(feature = "logging")]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::macros::relay_log!(error, $($arg)*)
    };
}

// Errors stay visible even without a subscriber.
#[cfg(not(feature = "logging"))]
macro_rules! log_error {
    ($($arg:tt)*) => {
        eprintln!($($arg)*)
    };
}

macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::macros::relay_log!(warn, $($arg)*)
    };
}

macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::macros::relay_log!(info, $($arg)*)
    };
}

macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::macros::relay_log!(debug, $($arg)*)
    };
}

pub(crate) use log_debug;
pub(crate) use log_error;
pub(crate) use log_info;
pub(crate) use log_warn;
pub(crate) use relay_log;
