//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits and every field has a default, so an empty
//! file (or no file at all) is a valid configuration.

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

/// Identification sent to every origin in place of the client's own.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:10.0.3) Gecko/20120305 Firefox/10.0.3";

/// Root configuration for the caching proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, shutdown drain).
    pub listener: ListenerConfig,

    /// Object cache sizing.
    pub cache: CacheConfig,

    /// Origin connection settings.
    pub origin: OriginConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// How long shutdown waits for in-flight connections, in seconds.
    pub drain_timeout_secs: u64,
}

impl ListenerConfig {
    /// Replace the port of `bind_address`, keeping its host part.
    pub fn set_port(&mut self, port: u16) {
        self.bind_address = match self.bind_address.parse::<SocketAddr>() {
            Ok(mut addr) => {
                addr.set_port(port);
                addr.to_string()
            }
            Err(_) => format!("0.0.0.0:{}", port),
        };
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            drain_timeout_secs: 5,
        }
    }
}

/// Object cache sizing.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    /// Number of cache slots; each holds one response.
    pub slots: usize,

    /// Largest response, in bytes, that may be cached.
    pub max_object_size: usize,

    /// Longest a cache hit may spend writing to its client, in seconds. The
    /// slot stays read-locked for that time, so inserts touching it wait too.
    pub hit_write_timeout_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            slots: 10,
            max_object_size: 100 * 1024,
            hit_write_timeout_secs: 10,
        }
    }
}

/// Origin connection settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct OriginConfig {
    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Value of the `User-Agent` header sent to origins.
    pub user_agent: String,
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 5,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default tracing filter, overridden by `RUST_LOG`.
    pub log_filter: String,

    /// Serve Prometheus metrics.
    pub metrics_enabled: bool,

    /// Metrics endpoint address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: "caching_proxy=info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
