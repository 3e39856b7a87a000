//! Counter key construction.

use std::fmt;

use serde::Serialize;

use crate::store::StoreError;

const INFLIGHT_SEGMENT: &str = "inflight";

/// Name of one provider's shared inflight counter: `<namespace>:inflight:<provider_id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub struct CounterKey {
    key: String,
    provider_len: usize,
}

impl CounterKey {
    pub fn new(namespace: &str, provider_id: &str) -> Result<Self, StoreError> {
        validate_segment(namespace)?;
        validate_segment(provider_id)?;
        Ok(Self {
            key: format!("{}:{}:{}", namespace, INFLIGHT_SEGMENT, provider_id),
            provider_len: provider_id.len(),
        })
    }

    /// Parse a full key as listed by the store.
    pub fn parse(raw: &str) -> Result<Self, StoreError> {
        let mut parts = raw.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(namespace), Some(INFLIGHT_SEGMENT), Some(provider)) => Self::new(namespace, provider),
            _ => Err(StoreError::InvalidKey(raw.to_string())),
        }
    }

    /// Prefix shared by every counter in `namespace`.
    pub fn prefix(namespace: &str) -> Result<String, StoreError> {
        validate_segment(namespace)?;
        Ok(format!("{}:{}:", namespace, INFLIGHT_SEGMENT))
    }

    pub fn as_str(&self) -> &str {
        &self.key
    }

    pub fn provider(&self) -> &str {
        &self.key[self.key.len() - self.provider_len..]
    }
}

impl fmt::Display for CounterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

impl From<CounterKey> for String {
    fn from(key: CounterKey) -> Self {
        key.key
    }
}

/// Check one `:`-separated key segment.
///
/// Glob metacharacters are refused so a namespace prefix can be listed with
/// a plain `prefix*` pattern.
pub fn validate_segment(segment: &str) -> Result<(), StoreError> {
    if segment.is_empty() {
        return Err(StoreError::InvalidKey("empty key segment".to_string()));
    }
    if let Some(c) = segment
        .chars()
        .find(|c| c.is_whitespace() || c.is_control() || matches!(c, ':' | '*' | '?' | '[' | ']' | '\\'))
    {
        return Err(StoreError::InvalidKey(format!(
            "segment `{}` contains forbidden character {:?}",
            segment, c
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_format() {
        let key = CounterKey::new("gateway", "albert-large").unwrap();
        assert_eq!(key.as_str(), "gateway:inflight:albert-large");
        assert_eq!(key.provider(), "albert-large");
        assert_eq!(key.to_string(), "gateway:inflight:albert-large");
    }

    #[test]
    fn test_rejects_malformed_segments() {
        assert!(CounterKey::new("gateway", "").is_err());
        assert!(CounterKey::new("gateway", "a b").is_err());
        assert!(CounterKey::new("gateway", "a:b").is_err());
        assert!(CounterKey::new("gateway", "a*").is_err());
        assert!(CounterKey::new("", "p").is_err());
    }

    #[test]
    fn test_parse_roundtrip_from_listing() {
        let key = CounterKey::parse("gateway:inflight:42").unwrap();
        assert_eq!(key, CounterKey::new("gateway", "42").unwrap());
        assert!(CounterKey::parse("gateway:other:42").is_err());
        assert!(CounterKey::parse("gateway:inflight").is_err());
    }

    #[test]
    fn test_prefix() {
        assert_eq!(CounterKey::prefix("gateway").unwrap(), "gateway:inflight:");
    }
}
