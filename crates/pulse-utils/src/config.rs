//! Configuration management utilities

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Source of environment values.
///
/// Production code passes [`process_env`]; tests pass a closure over a map so
/// nothing mutates the real process environment.
pub type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Read a variable from the process environment
pub fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Errors raised while reading configuration values
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable was present but could not be parsed
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
}

/// Read and parse an optional variable. Blank values count as unset.
pub fn parse_var<T: FromStr>(lookup: EnvLookup<'_>, key: &str) -> Result<Option<T>, ConfigError> {
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => {
            raw.trim()
                .parse::<T>()
                .map(Some)
                .map_err(|_| ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: raw,
                })
        }
        _ => Ok(None),
    }
}

/// Read an optional string variable. Blank values count as unset.
pub fn string_var(lookup: EnvLookup<'_>, key: &str) -> Option<String> {
    lookup(key).filter(|v| !v.trim().is_empty())
}

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::InvalidValue {
                key: "log format".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application name
    pub app_name: String,
    /// Environment (dev, prod, etc.)
    pub environment: String,
    /// Log line format
    pub log_format: LogFormat,
    /// Default `EnvFilter` directive used when `RUST_LOG` is unset
    pub default_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "market-pulse".to_string(),
            environment: "development".to_string(),
            log_format: LogFormat::Pretty,
            default_filter: "info".to_string(),
        }
    }
}

impl Config {
    /// Load from `PULSE_ENV` and `PULSE_LOG_FORMAT`
    pub fn from_env(lookup: EnvLookup<'_>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            environment: string_var(lookup, "PULSE_ENV").unwrap_or(defaults.environment),
            log_format: parse_var(lookup, "PULSE_LOG_FORMAT")?.unwrap_or(defaults.log_format),
            ..defaults
        })
    }

    /// Override the default filter directive
    pub fn with_default_filter(mut self, filter: impl Into<String>) -> Self {
        self.default_filter = filter.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_parse_var() {
        let lookup = lookup_from(&[("N", "12"), ("BAD", "x"), ("BLANK", "  ")]);
        assert_eq!(parse_var::<u32>(&lookup, "N").unwrap(), Some(12));
        assert_eq!(parse_var::<u32>(&lookup, "BLANK").unwrap(), None);
        assert_eq!(parse_var::<u32>(&lookup, "MISSING").unwrap(), None);
        assert!(parse_var::<u32>(&lookup, "BAD").is_err());
    }

    #[test]
    fn test_config_from_env() {
        let lookup = lookup_from(&[("PULSE_LOG_FORMAT", "json"), ("PULSE_ENV", "production")]);
        let config = Config::from_env(&lookup).unwrap();
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.environment, "production");
        assert_eq!(config.app_name, "market-pulse");
    }

    #[test]
    fn test_log_format_rejects_unknown() {
        assert!("xml".parse::<LogFormat>().is_err());
        assert_eq!("TEXT".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
    }
}
