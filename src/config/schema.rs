//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! server. All types derive Serde traits for deserialization from config
//! files; every field has a default so a minimal (or empty) config works.

use serde::{Deserialize, Serialize};

/// Root configuration for the server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind address, connection cap).
    pub listener: ListenerConfig,

    /// Request size limits.
    pub limits: LimitsConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Handler pool sizing.
    pub handler_pool: HandlerPoolConfig,

    /// Per-connection buffering and pipelining.
    pub connection: ConnectionConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent connections; accepts pause beyond this.
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 10_000,
        }
    }
}

/// Request size limits, enforced during parsing.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum request body size in bytes (413 beyond).
    pub max_body_bytes: usize,

    /// Maximum header block size in bytes (431 beyond).
    pub max_header_bytes: usize,

    /// Maximum request target length in bytes (414 beyond).
    pub max_uri_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 1024 * 1024,
            max_header_bytes: 16 * 1024,
            max_uri_bytes: 8 * 1024,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Idle connection timeout in seconds.
    pub idle_secs: u64,

    /// Cooperative handler timeout in seconds; 0 disables it.
    pub handler_secs: u64,

    /// Graceful shutdown drain deadline in seconds.
    pub drain_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            idle_secs: 60,
            handler_secs: 30,
            drain_secs: 15,
        }
    }
}

/// Handler pool sizing. Workers plus queue slots bound in-flight
/// invocations; submissions past that wait (backpressure on the owning
/// connection).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HandlerPoolConfig {
    /// Concurrent handler invocations.
    pub workers: usize,

    /// Additional queued invocations before submission blocks.
    pub queue_depth: usize,
}

impl HandlerPoolConfig {
    pub fn max_in_flight(&self) -> usize {
        self.workers + self.queue_depth
    }
}

impl Default for HandlerPoolConfig {
    fn default() -> Self {
        Self {
            workers: 64,
            queue_depth: 256,
        }
    }
}

/// Per-connection buffering and pipelining.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Pause reading once buffered response bytes exceed this.
    pub high_watermark_bytes: usize,

    /// Resume reading once buffered response bytes fall to this.
    pub low_watermark_bytes: usize,

    /// Maximum pipelined exchanges in flight per connection.
    pub max_pipelined: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            high_watermark_bytes: 256 * 1024,
            low_watermark_bytes: 64 * 1024,
            max_pipelined: 32,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,

    /// Default log filter when TRELLIS_LOG is unset.
    pub log_filter: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
            metrics_address: "127.0.0.1:9100".to_string(),
            log_filter: "trellis=info".to_string(),
        }
    }
}
