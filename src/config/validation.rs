//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds > 0, TTL > 0, timeouts > 0)
//! - Check the store URL and the key namespace
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GateConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;

use url::Url;

use crate::config::schema::{GateConfig, QosConfig};
use crate::counter::key::validate_segment;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a complete configuration.
pub fn validate_config(config: &GateConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match Url::parse(&config.store.url) {
        Ok(url) if matches!(url.scheme(), "redis" | "rediss" | "redis+unix" | "unix") => {}
        Ok(url) => errors.push(ValidationError::new(
            "store.url",
            format!("unsupported scheme `{}`", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new("store.url", e.to_string())),
    }
    if config.store.pool_size == 0 {
        errors.push(ValidationError::new("store.pool_size", "must be greater than 0"));
    }
    if config.store.command_timeout_ms == 0 {
        errors.push(ValidationError::new(
            "store.command_timeout_ms",
            "must be greater than 0",
        ));
    }

    if !config.retries.backoff_multiplier.is_finite() || config.retries.backoff_multiplier < 1.0 {
        errors.push(ValidationError::new(
            "retries.backoff_multiplier",
            "must be a finite number >= 1.0",
        ));
    }
    if !(0.0..=1.0).contains(&config.retries.jitter_ratio) {
        errors.push(ValidationError::new(
            "retries.jitter_ratio",
            "must be between 0.0 and 1.0",
        ));
    }
    if config.retries.max_delay_ms < config.retries.backoff_base_ms {
        errors.push(ValidationError::new(
            "retries.max_delay_ms",
            "must not be lower than backoff_base_ms",
        ));
    }

    if let Err(e) = validate_segment(&config.counter.namespace) {
        errors.push(ValidationError::new("counter.namespace", e.to_string()));
    }
    if config.counter.ttl_secs == 0 {
        errors.push(ValidationError::new("counter.ttl_secs", "must be greater than 0"));
    }

    errors.extend(validate_qos(&config.qos));

    if config.admin.enabled && config.admin.api_key.trim().is_empty() {
        errors.push(ValidationError::new(
            "admin.api_key",
            "must be set when the admin API is enabled",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate the hot-reloadable QoS section on its own.
pub fn validate_qos(qos: &QosConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    if qos.default_threshold <= 0 {
        errors.push(ValidationError::new(
            "qos.default_threshold",
            "must be greater than 0",
        ));
    }
    let mut providers: Vec<_> = qos.providers.iter().collect();
    providers.sort();
    for (provider, threshold) in providers {
        if let Err(e) = validate_segment(provider) {
            errors.push(ValidationError::new(
                format!("qos.providers.{}", provider),
                e.to_string(),
            ));
        }
        if *threshold <= 0 {
            errors.push(ValidationError::new(
                format!("qos.providers.{}", provider),
                "threshold must be greater than 0",
            ));
        }
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&GateConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = GateConfig::default();
        config.store.url = "http://localhost".into();
        config.counter.ttl_secs = 0;
        config.counter.namespace = "bad ns".into();
        config.qos.default_threshold = 0;
        config.retries.backoff_multiplier = 0.5;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "store.url",
                "retries.backoff_multiplier",
                "counter.namespace",
                "counter.ttl_secs",
                "qos.default_threshold",
            ]
        );
    }

    #[test]
    fn test_provider_overrides_checked() {
        let mut qos = QosConfig::default();
        qos.providers.insert("openai".into(), 10);
        qos.providers.insert("mistral".into(), -1);
        qos.providers.insert("a:b".into(), 3);

        let errors = validate_qos(&qos);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].field, "qos.providers.a:b");
        assert_eq!(errors[1].field, "qos.providers.mistral");
    }
}
