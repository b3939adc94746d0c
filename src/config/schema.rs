//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files and
//! every section carries defaults so a minimal config file works.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root configuration for the execution gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, request timeout).
    pub listener: ListenerConfig,

    /// Upstream (third-party API) settings for the server execution path.
    pub upstream: UpstreamConfig,

    /// Delegate connection settings (auth handshake, liveness).
    pub connection: ConnectionConfig,

    /// Routing defaults for calls that do not name a policy explicitly.
    pub routing: RoutingConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Static session tokens accepted on the `auth` frame, token → user id.
    pub auth_tokens: BTreeMap<String, String>,

    /// Seed credential snapshots, user id → snapshot.
    pub credentials: BTreeMap<String, CredentialSeed>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Request timeout for the backend-facing API in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 60,
        }
    }
}

/// Upstream settings for direct (server-side) execution.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the third-party API, no trailing slash
    /// (e.g., "https://www.example.com").
    pub base_url: String,

    /// Outbound request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Cookie names that must be present in a credential snapshot for the
    /// server path to be viable. Missing any of them fails the call before
    /// network I/O.
    pub required_cookies: Vec<String>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.example.com".to_string(),
            request_timeout_secs: 30,
            required_cookies: vec!["session_id".to_string()],
        }
    }
}

/// Delegate connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// How long a freshly opened connection may take to present its `auth`
    /// frame before being dropped, in seconds.
    pub auth_timeout_secs: u64,

    /// Interval between gateway-initiated pings, in seconds.
    pub ping_interval_secs: u64,

    /// Liveness window: a connection with no pong for this long is forced
    /// to disconnected, in seconds. Must exceed the ping interval.
    pub pong_timeout_secs: u64,

    /// Bound on queued outbound frames per connection.
    pub outbound_queue: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            auth_timeout_secs: 10,
            ping_interval_secs: 25,
            pong_timeout_secs: 60,
            outbound_queue: 64,
        }
    }
}

/// Routing defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Default execution path for calls that do not carry a policy:
    /// "delegate" or "server".
    pub default_policy: String,

    /// Per-user overrides of the default policy, user id → policy name.
    pub user_policies: BTreeMap<String, String>,

    /// Default deadline for delegated calls in seconds, used when the
    /// caller does not pass one.
    pub default_call_timeout_secs: u64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            default_policy: "delegate".to_string(),
            user_policies: BTreeMap::new(),
            default_call_timeout_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// A credential snapshot as configured on disk.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CredentialSeed {
    /// CSRF token, if known.
    pub csrf_token: Option<String>,

    /// Known cookie subset, name → value.
    pub cookies: BTreeMap<String, String>,
}
