//! Runtime configuration.
//!
//! Loaded from an optional YAML file, then overridden from the environment:
//!
//! ```yaml
//! service:
//!   provider: http
//!   timeout: 30s
//!   options:
//!     shield_url: http://localhost:8000
//!     agent_url: http://localhost:8001
//! reveal:
//!   speed: 20ms
//!   settle_delay: 500ms
//!   grace: 15s
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const SERVICE_ENV: &str = "SENTINEL_SERVICE";
pub const SHIELD_URL_ENV: &str = "SENTINEL_SHIELD_URL";
pub const AGENT_URL_ENV: &str = "SENTINEL_AGENT_URL";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Top-level runtime configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    pub service: ServiceConfig,
    pub reveal: RevealConfig,
}

/// Which analysis service to use and how long to wait for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// Registered service type, e.g. "mock" or "http"
    pub provider: String,

    /// Per-call timeout
    #[serde(with = "duration_str")]
    pub timeout: Duration,

    /// Service-specific options, passed to the factory
    pub options: JsonValue,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            provider: "mock".to_string(),
            timeout: Duration::from_secs(30),
            options: JsonValue::Object(Default::default()),
        }
    }
}

/// Timing of the progressive reveal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RevealConfig {
    /// Delay between characters
    #[serde(with = "duration_str")]
    pub speed: Duration,

    /// Pause after the last character before completion is reported
    #[serde(with = "duration_str")]
    pub settle_delay: Duration,

    /// How long a finished post-analysis waits for the reveal before it is
    /// fast-forwarded
    #[serde(with = "duration_str")]
    pub grace: Duration,
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self {
            speed: Duration::from_millis(20),
            settle_delay: Duration::from_millis(500),
            grace: Duration::from_secs(15),
        }
    }
}

mod duration_str {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(D::Error::custom)
    }
}

impl RuntimeConfig {
    /// Parse a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: RuntimeConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Load from an optional file and apply `SENTINEL_*` overrides read
    /// through `lookup`, usually `|key| std::env::var(key).ok()`.
    pub fn load(
        path: Option<&Path>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(lookup);
        config.validate()?;
        tracing::debug!(
            provider = %config.service.provider,
            timeout = ?config.service.timeout,
            "Runtime config loaded"
        );
        Ok(config)
    }

    /// Apply `SENTINEL_*` overrides using `lookup` to read variables.
    ///
    /// URL overrides only apply to the http provider.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(provider) = lookup(SERVICE_ENV) {
            self.service.provider = provider;
        }
        if self.service.provider != "http" {
            return;
        }
        for (env, key) in [(SHIELD_URL_ENV, "shield_url"), (AGENT_URL_ENV, "agent_url")] {
            if let Some(url) = lookup(env) {
                self.set_option(key, JsonValue::String(url));
            }
        }
    }

    /// Set one service option, replacing non-object options.
    pub fn set_option(&mut self, key: &str, value: JsonValue) {
        if !self.service.options.is_object() {
            self.service.options = JsonValue::Object(Default::default());
        }
        if let JsonValue::Object(map) = &mut self.service.options {
            map.insert(key.to_string(), value);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service.provider.trim().is_empty() {
            return Err(ConfigError::Invalid("service.provider is empty".into()));
        }
        if self.service.timeout.is_zero() {
            return Err(ConfigError::Invalid("service.timeout must be positive".into()));
        }
        if self.reveal.speed.is_zero() {
            return Err(ConfigError::Invalid("reveal.speed must be positive".into()));
        }
        if !self.service.options.is_object() {
            return Err(ConfigError::Invalid("service.options must be a mapping".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.service.provider, "mock");
        assert_eq!(config.service.timeout, Duration::from_secs(30));
        assert_eq!(config.reveal.speed, Duration::from_millis(20));
        assert_eq!(config.reveal.settle_delay, Duration::from_millis(500));
        assert_eq!(config.reveal.grace, Duration::from_secs(15));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_yaml() {
        let config = RuntimeConfig::from_yaml_str(
            r#"
service:
  provider: http
  timeout: 5s
  options:
    shield_url: http://shield:8000
reveal:
  speed: 5ms
"#,
        )
        .unwrap();
        assert_eq!(config.service.provider, "http");
        assert_eq!(config.service.timeout, Duration::from_secs(5));
        assert_eq!(config.service.options["shield_url"], "http://shield:8000");
        assert_eq!(config.reveal.speed, Duration::from_millis(5));
        // Unset fields keep their defaults
        assert_eq!(config.reveal.grace, Duration::from_secs(15));
    }

    #[test]
    fn test_bad_duration_rejected() {
        let result = RuntimeConfig::from_yaml_str("reveal:\n  speed: fast\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = RuntimeConfig::from_yaml_str("reveal:\n  sped: 5ms\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_zero_speed_invalid() {
        let result = RuntimeConfig::from_yaml_str("reveal:\n  speed: 0s\n");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (SERVICE_ENV, "http"),
            (SHIELD_URL_ENV, "http://shield:9000"),
        ]
        .into_iter()
        .collect();

        let mut config = RuntimeConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.service.provider, "http");
        assert_eq!(config.service.options["shield_url"], "http://shield:9000");
        assert!(config.service.options.get("agent_url").is_none());
    }

    #[test]
    fn test_url_overrides_ignored_for_mock() {
        let mut config = RuntimeConfig::default();
        config.apply_overrides(|key| {
            (key == SHIELD_URL_ENV).then(|| "http://shield:9000".to_string())
        });
        assert_eq!(config.service.provider, "mock");
        assert!(config.service.options.get("shield_url").is_none());
    }

    #[test]
    fn test_load_without_file_applies_overrides() {
        let config = RuntimeConfig::load(None, |key| match key {
            SERVICE_ENV => Some("http".to_string()),
            AGENT_URL_ENV => Some("http://agents:9001".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.service.provider, "http");
        assert_eq!(config.service.options["agent_url"], "http://agents:9001");
        assert_eq!(config.reveal, RevealConfig::default());
    }

    #[test]
    fn test_load_rejects_blank_provider_override() {
        let result = RuntimeConfig::load(None, |key| (key == SERVICE_ENV).then(|| " ".to_string()));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = RuntimeConfig::from_yaml_file("/nonexistent/sentinel.yaml");
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_durations_serialize_human_readable() {
        let yaml = serde_yaml::to_string(&RuntimeConfig::default()).unwrap();
        assert!(yaml.contains("speed: 20ms"));
        assert!(yaml.contains("grace: 15s"));
    }
}
