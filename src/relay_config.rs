//! Public relay configuration.
//!
//! Defaults cover a local development setup. `load()` layers an optional
//! `graph-relay.json` file and `GRAPH_RELAY_*` environment variables on top.

use std::net::SocketAddr;
use std::time::Duration;

use figment::providers::{Env, Format, Json, Serialized};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::{RelayError, Result};

/// Remote peer used when nothing else is configured.
pub const DEFAULT_ENDPOINT: &str = "ws://localhost:5002/ws";

/// Default HTTP listen address.
pub const DEFAULT_HTTP_ADDR: &str = "127.0.0.1:5001";

/// Optional config file read by [`RelayConfig::load`].
pub const CONFIG_FILE: &str = "graph-relay.json";

/// Prefix of environment variables read by [`RelayConfig::load`].
pub const ENV_PREFIX: &str = "GRAPH_RELAY_";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection and service configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    // ---
    /// WebSocket URL of the remote peer.
    pub endpoint: String,

    /// Timeout used by [`ConnectionManager::request`](crate::ConnectionManager::request).
    ///
    /// Default: 30 seconds
    pub request_timeout: Duration,

    /// Address the HTTP surface binds to.
    pub http_addr: SocketAddr,

    /// Log filter used when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_owned(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            http_addr: SocketAddr::from(([127, 0, 0, 1], 5001)),
            log_level: "info".to_owned(),
        }
    }
}

/// Flat on-disk / environment shape.
#[derive(Debug, Serialize, Deserialize)]
struct RawConfig {
    endpoint: String,
    request_timeout_ms: u64,
    http_addr: String,
    log_level: String,
}

impl Default for RawConfig {
    fn default() -> Self {
        // ---
        let defaults = RelayConfig::default();
        Self {
            endpoint: defaults.endpoint,
            request_timeout_ms: duration_to_millis(defaults.request_timeout),
            http_addr: defaults.http_addr.to_string(),
            log_level: defaults.log_level,
        }
    }
}

impl RelayConfig {
    /// Set the remote peer URL.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set the default request timeout.
    ///
    /// # Example
    ///
    /// ```
    /// use graph_relay::RelayConfig;
    /// use std::time::Duration;
    ///
    /// let config = RelayConfig::default().with_request_timeout(Duration::from_secs(5));
    /// assert_eq!(config.request_timeout, Duration::from_secs(5));
    /// ```
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_http_addr(mut self, addr: SocketAddr) -> Self {
        self.http_addr = addr;
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Defaults, then `graph-relay.json` if present, then `GRAPH_RELAY_*`.
    pub fn figment() -> Figment {
        // ---
        Figment::from(Serialized::defaults(RawConfig::default()))
            .merge(Json::file(CONFIG_FILE))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    /// Load from the standard sources (see [`figment`](Self::figment)).
    ///
    /// # Errors
    ///
    /// [`RelayError::Config`] if a source is malformed or a value fails to
    /// parse.
    pub fn load() -> Result<Self> {
        Self::from_figment(Self::figment())
    }

    /// Extract a config from an arbitrary figment.
    ///
    /// Keys missing from `figment` fall back to the defaults.
    pub fn from_figment(figment: Figment) -> Result<Self> {
        // ---
        let raw: RawConfig = Figment::from(Serialized::defaults(RawConfig::default()))
            .merge(figment)
            .extract()?;

        let http_addr = raw
            .http_addr
            .parse::<SocketAddr>()
            .map_err(|err| RelayError::Config(format!("invalid http_addr {:?}: {err}", raw.http_addr)))?;

        if raw.request_timeout_ms == 0 {
            return Err(RelayError::Config("request_timeout_ms must be greater than zero".into()));
        }

        Ok(Self {
            endpoint: raw.endpoint,
            request_timeout: Duration::from_millis(raw.request_timeout_ms),
            http_addr,
            log_level: raw.log_level,
        })
    }
}

fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
