//! Pipeline and model-transport configuration
//!
//! Both structs have sensible defaults and `with_*` builders. `from_env()`
//! reads `VINTNER_*` variables; unset variables keep the default, malformed
//! ones are reported as `ConfigError`.

use crate::catalog::{RatingSource, SourceWhitelist};
use std::time::Duration;
use thiserror::Error;

/// Errors from reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

fn invalid(key: &'static str, value: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.into(),
    }
}

fn parse_var<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| invalid(key, &raw, e.to_string())),
    }
}

/// Configuration for the enrichment pipeline.
#[derive(Debug, Clone)]
pub struct EnrichmentConfig {
    /// Ratings below this confidence are discarded (0.0..=1.0)
    pub min_confidence: f64,
    /// Total model call attempts, including the first (>= 1)
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles for each later attempt
    pub base_delay: Duration,
    /// Rating sources whose scores may be persisted
    pub whitelist: SourceWhitelist,
    /// Enrichments the background queue runs at once
    pub max_concurrency: usize,
    /// Pending enrichments the background queue holds before rejecting
    pub queue_capacity: usize,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.4,
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            whitelist: SourceWhitelist::builtin(),
            max_concurrency: 4,
            queue_capacity: 64,
        }
    }
}

impl EnrichmentConfig {
    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_whitelist(mut self, whitelist: SourceWhitelist) -> Self {
        self.whitelist = whitelist;
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    /// Read configuration from `VINTNER_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = parse_var::<f64, _>(&lookup, "VINTNER_MIN_CONFIDENCE")? {
            config.min_confidence = v;
        }
        if let Some(v) = parse_var::<u32, _>(&lookup, "VINTNER_MAX_ATTEMPTS")? {
            config.max_attempts = v;
        }
        if let Some(v) = parse_var::<u64, _>(&lookup, "VINTNER_BASE_DELAY_MS")? {
            config.base_delay = Duration::from_millis(v);
        }
        if let Some(v) = parse_var::<usize, _>(&lookup, "VINTNER_MAX_CONCURRENCY")? {
            config.max_concurrency = v;
        }
        if let Some(v) = parse_var::<usize, _>(&lookup, "VINTNER_QUEUE_CAPACITY")? {
            config.queue_capacity = v;
        }
        if let Some(raw) = lookup("VINTNER_RATING_SOURCES") {
            config.whitelist = parse_sources(&raw)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(invalid(
                "VINTNER_MIN_CONFIDENCE",
                &self.min_confidence.to_string(),
                "must be within 0.0..=1.0",
            ));
        }
        if self.max_attempts == 0 {
            return Err(invalid("VINTNER_MAX_ATTEMPTS", "0", "must be at least 1"));
        }
        if self.max_concurrency == 0 {
            return Err(invalid("VINTNER_MAX_CONCURRENCY", "0", "must be at least 1"));
        }
        if self.queue_capacity == 0 {
            return Err(invalid("VINTNER_QUEUE_CAPACITY", "0", "must be at least 1"));
        }
        Ok(())
    }
}

/// Parse `id=Display Name;id=Display Name`.
fn parse_sources(raw: &str) -> Result<SourceWhitelist, ConfigError> {
    let mut sources = Vec::new();
    for entry in raw.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        let (id, name) = entry
            .split_once('=')
            .ok_or_else(|| invalid("VINTNER_RATING_SOURCES", entry, "expected id=Name"))?;
        let (id, name) = (id.trim(), name.trim());
        if id.is_empty() || name.is_empty() {
            return Err(invalid("VINTNER_RATING_SOURCES", entry, "empty id or name"));
        }
        sources.push(RatingSource::new(id, name));
    }
    if sources.is_empty() {
        return Err(invalid("VINTNER_RATING_SOURCES", raw, "no sources listed"));
    }
    Ok(SourceWhitelist::new(sources))
}

/// Configuration for the chat-completion transport.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Base URL; `/chat/completions` is appended
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 60,
            temperature: 0.2,
            max_tokens: 1500,
        }
    }
}

impl LlmConfig {
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("VINTNER_LLM_ENDPOINT") {
            config.endpoint = v;
        }
        config.api_key = lookup("VINTNER_LLM_API_KEY");
        if let Some(v) = lookup("VINTNER_LLM_MODEL") {
            config.model = v;
        }
        if let Some(v) = parse_var::<u64, _>(&lookup, "VINTNER_LLM_TIMEOUT_SECS")? {
            config.timeout_secs = v;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = EnrichmentConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.min_confidence, 0.4);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.base_delay, Duration::from_millis(1000));
        assert_eq!(config.whitelist, SourceWhitelist::builtin());
    }

    #[test]
    fn env_values_override_defaults() {
        let config = EnrichmentConfig::from_lookup(lookup(&[
            ("VINTNER_MIN_CONFIDENCE", "0.7"),
            ("VINTNER_MAX_ATTEMPTS", "5"),
            ("VINTNER_BASE_DELAY_MS", "250"),
            ("VINTNER_RATING_SOURCES", "gambero-rosso=Gambero Rosso; vivino=Vivino"),
        ]))
        .unwrap();
        assert_eq!(config.min_confidence, 0.7);
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.base_delay, Duration::from_millis(250));
        assert_eq!(config.whitelist.len(), 2);
        assert_eq!(config.whitelist.get("vivino").unwrap().name, "Vivino");
    }

    #[test]
    fn out_of_range_confidence_is_rejected() {
        let err = EnrichmentConfig::from_lookup(lookup(&[("VINTNER_MIN_CONFIDENCE", "1.5")]))
            .unwrap_err();
        assert!(err.to_string().contains("VINTNER_MIN_CONFIDENCE"));
    }

    #[test]
    fn zero_attempts_is_rejected() {
        assert!(EnrichmentConfig::from_lookup(lookup(&[("VINTNER_MAX_ATTEMPTS", "0")])).is_err());
    }

    #[test]
    fn malformed_number_is_rejected() {
        assert!(EnrichmentConfig::from_lookup(lookup(&[("VINTNER_BASE_DELAY_MS", "soon")])).is_err());
    }

    #[test]
    fn malformed_source_entry_is_rejected() {
        assert!(EnrichmentConfig::from_lookup(lookup(&[("VINTNER_RATING_SOURCES", "vivino")])).is_err());
    }

    #[test]
    fn llm_config_reads_key_and_model() {
        let config = LlmConfig::from_lookup(lookup(&[
            ("VINTNER_LLM_API_KEY", "sk-test"),
            ("VINTNER_LLM_MODEL", "local-model"),
            ("VINTNER_LLM_ENDPOINT", "http://localhost:8080/v1"),
        ]))
        .unwrap();
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.model, "local-model");
        assert_eq!(config.endpoint, "http://localhost:8080/v1");
        assert_eq!(config.timeout_secs, 60);
    }
}
