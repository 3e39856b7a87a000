//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gate.
//! All types derive Serde traits for deserialization from config files.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Root configuration for the inflight admission gate.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GateConfig {
    /// Shared counter store connection.
    pub store: StoreConfig,

    /// Retry policy for store operations.
    pub retries: RetryConfig,

    /// Inflight counter behaviour.
    pub counter: CounterConfig,

    /// Admission thresholds.
    pub qos: QosConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Operator diagnostic API.
    pub admin: AdminConfig,
}

/// Redis connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Redis URL (e.g., "redis://127.0.0.1:6379/0").
    pub url: String,

    /// Maximum pooled connections.
    pub pool_size: u32,

    /// Time allowed to obtain a pooled connection, in seconds.
    pub connection_timeout_secs: u64,

    /// Deadline for a single command, in milliseconds.
    pub command_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379/0".to_string(),
            pool_size: 16,
            connection_timeout_secs: 5,
            command_timeout_ms: 500,
        }
    }
}

/// Retry configuration for store operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Additional attempts after the first one.
    pub max_retries: u32,

    /// Delay before the first retry, in milliseconds.
    pub backoff_base_ms: u64,

    /// Factor applied to the delay after each failed retry.
    pub backoff_multiplier: f64,

    /// Upper bound for a single delay, in milliseconds.
    pub max_delay_ms: u64,

    /// Fraction of the delay added as random jitter (0.0 disables).
    pub jitter_ratio: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base_ms: 50,
            backoff_multiplier: 2.0,
            max_delay_ms: 1000,
            jitter_ratio: 0.0,
        }
    }
}

/// Inflight counter settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CounterConfig {
    /// Key namespace; keys are `<namespace>:inflight:<provider_id>`.
    pub namespace: String,

    /// TTL renewed on every successful increment, in seconds.
    pub ttl_secs: u64,
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            namespace: "gateway".to_string(),
            ttl_secs: 300,
        }
    }
}

/// Admission thresholds. Hot-reloadable.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct QosConfig {
    /// Reject when a provider's inflight count reaches this value.
    pub default_threshold: i64,

    /// Per-provider overrides keyed by provider id.
    pub providers: HashMap<String, i64>,
}

impl QosConfig {
    /// Threshold applied to `provider`.
    pub fn threshold_for(&self, provider: &str) -> i64 {
        self.providers
            .get(provider)
            .copied()
            .unwrap_or(self.default_threshold)
    }
}

impl Default for QosConfig {
    fn default() -> Self {
        Self {
            default_threshold: 64,
            providers: HashMap::new(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive.
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

/// Log line format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
