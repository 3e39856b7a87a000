//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::GateConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GateConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse, apply environment overrides, and validate configuration text.
pub fn parse_config(content: &str) -> Result<GateConfig, ConfigError> {
    let mut config: GateConfig = toml::from_str(content)?;
    apply_env_overrides(&mut config, |name| std::env::var(name).ok());

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay `INFLIGHT_*` environment variables onto `config`.
///
/// The lookup is injected so callers can test without touching the process
/// environment.
pub fn apply_env_overrides<F>(config: &mut GateConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup("INFLIGHT_REDIS_URL") {
        config.store.url = url;
    }
    if let Some(namespace) = lookup("INFLIGHT_NAMESPACE") {
        config.counter.namespace = namespace;
    }
    if let Some(key) = lookup("INFLIGHT_ADMIN_API_KEY") {
        config.admin.api_key = key;
    }
    if let Some(level) = lookup("INFLIGHT_LOG_LEVEL") {
        config.observability.log_level = level;
    }
}
