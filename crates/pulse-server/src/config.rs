//! Service configuration

use crate::error::{Result, ServiceError};
use pulse_analysis::AnalysisConfig;
use pulse_analysis::config::DEFAULT_INSIGHT_MODEL;
use pulse_utils::EnvLookup;
use pulse_utils::config::{parse_var, string_var};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5001";

/// Configuration for the analysis service and its HTTP surface
#[derive(Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP server listens on
    pub bind_addr: String,

    /// Directory finished HTML reports are written to
    pub reports_dir: PathBuf,

    /// Directory chart assets are written to, one subdirectory per session
    pub charts_dir: PathBuf,

    /// Sessions allowed to run at once; the rest wait as `PENDING`
    pub max_concurrent_sessions: usize,

    /// Upper bound for a single pipeline stage, unset for no limit
    pub stage_timeout: Option<Duration>,

    /// Age after which finished sessions are swept, unset to keep them
    pub retention: Option<Duration>,

    /// Buffered progress events per subscriber before it lags
    pub event_buffer: usize,

    /// Fallback credential for AI insights
    #[serde(skip)]
    pub gemini_api_key: Option<String>,

    /// Market data and insight settings
    pub analysis: AnalysisConfig,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind_addr", &self.bind_addr)
            .field("reports_dir", &self.reports_dir)
            .field("charts_dir", &self.charts_dir)
            .field("max_concurrent_sessions", &self.max_concurrent_sessions)
            .field("stage_timeout", &self.stage_timeout)
            .field("retention", &self.retention)
            .field("event_buffer", &self.event_buffer)
            .field("gemini_api_key", &self.gemini_api_key.as_ref().map(|_| "[REDACTED]"))
            .field("analysis", &self.analysis)
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            reports_dir: PathBuf::from("reports"),
            charts_dir: PathBuf::from("charts"),
            max_concurrent_sessions: 8,
            stage_timeout: None,
            retention: None,
            event_buffer: 64,
            gemini_api_key: None,
            analysis: AnalysisConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Create a new configuration builder
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }

    /// Load configuration from environment values
    ///
    /// Unset or blank variables keep their defaults.
    pub fn from_env(lookup: EnvLookup<'_>) -> Result<Self> {
        let mut builder = Self::builder();

        if let Some(addr) = string_var(lookup, "PULSE_BIND_ADDR") {
            builder = builder.bind_addr(addr);
        }
        if let Some(dir) = string_var(lookup, "PULSE_REPORTS_DIR") {
            builder = builder.reports_dir(dir);
        }
        if let Some(dir) = string_var(lookup, "PULSE_CHARTS_DIR") {
            builder = builder.charts_dir(dir);
        }
        if let Some(max) = parse_var::<usize>(lookup, "PULSE_MAX_CONCURRENT_SESSIONS")? {
            builder = builder.max_concurrent_sessions(max);
        }
        if let Some(secs) = parse_var::<u64>(lookup, "PULSE_STAGE_TIMEOUT_SECS")? {
            builder = builder.stage_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = parse_var::<u64>(lookup, "PULSE_RETENTION_SECS")? {
            builder = builder.retention(Duration::from_secs(secs));
        }
        if let Some(size) = parse_var::<usize>(lookup, "PULSE_EVENT_BUFFER")? {
            builder = builder.event_buffer(size);
        }
        if let Some(key) = string_var(lookup, "GEMINI_API_KEY") {
            builder = builder.gemini_api_key(key);
        }

        let mut analysis = AnalysisConfig::default();
        if let Some(model) = string_var(lookup, "GEMINI_MODEL") {
            analysis.insight_model = model;
        }

        builder.analysis(analysis).build()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.bind_addr.trim().is_empty() {
            return Err(ServiceError::Config("bind_addr must not be empty".to_string()));
        }

        if self.max_concurrent_sessions == 0 {
            return Err(ServiceError::Config(
                "max_concurrent_sessions must be greater than 0".to_string(),
            ));
        }

        if self.event_buffer == 0 {
            return Err(ServiceError::Config("event_buffer must be greater than 0".to_string()));
        }

        if self.stage_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ServiceError::Config("stage_timeout must be greater than 0".to_string()));
        }

        if self.retention.is_some_and(|r| r.is_zero()) {
            return Err(ServiceError::Config("retention must be greater than 0".to_string()));
        }

        self.analysis
            .validate()
            .map_err(|e| ServiceError::Config(e.to_string()))
    }
}

/// Builder for ServerConfig
#[derive(Debug, Default)]
pub struct ServerConfigBuilder {
    bind_addr: Option<String>,
    reports_dir: Option<PathBuf>,
    charts_dir: Option<PathBuf>,
    max_concurrent_sessions: Option<usize>,
    stage_timeout: Option<Duration>,
    retention: Option<Duration>,
    event_buffer: Option<usize>,
    gemini_api_key: Option<String>,
    analysis: Option<AnalysisConfig>,
}

impl ServerConfigBuilder {
    pub fn bind_addr(mut self, addr: impl Into<String>) -> Self {
        self.bind_addr = Some(addr.into());
        self
    }

    pub fn reports_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.reports_dir = Some(dir.into());
        self
    }

    pub fn charts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.charts_dir = Some(dir.into());
        self
    }

    pub fn max_concurrent_sessions(mut self, max: usize) -> Self {
        self.max_concurrent_sessions = Some(max);
        self
    }

    pub fn stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = Some(timeout);
        self
    }

    pub fn retention(mut self, retention: Duration) -> Self {
        self.retention = Some(retention);
        self
    }

    pub fn event_buffer(mut self, size: usize) -> Self {
        self.event_buffer = Some(size);
        self
    }

    pub fn gemini_api_key(mut self, key: impl Into<String>) -> Self {
        self.gemini_api_key = Some(key.into());
        self
    }

    pub fn analysis(mut self, analysis: AnalysisConfig) -> Self {
        self.analysis = Some(analysis);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<ServerConfig> {
        let defaults = ServerConfig::default();
        let config = ServerConfig {
            bind_addr: self.bind_addr.unwrap_or(defaults.bind_addr),
            reports_dir: self.reports_dir.unwrap_or(defaults.reports_dir),
            charts_dir: self.charts_dir.unwrap_or(defaults.charts_dir),
            max_concurrent_sessions: self
                .max_concurrent_sessions
                .unwrap_or(defaults.max_concurrent_sessions),
            stage_timeout: self.stage_timeout.or(defaults.stage_timeout),
            retention: self.retention.or(defaults.retention),
            event_buffer: self.event_buffer.unwrap_or(defaults.event_buffer),
            gemini_api_key: self.gemini_api_key.or(defaults.gemini_api_key),
            analysis: self.analysis.unwrap_or(defaults.analysis),
        };

        config.validate()?;
        Ok(config)
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
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr, "0.0.0.0:5001");
        assert_eq!(config.max_concurrent_sessions, 8);
        assert_eq!(config.event_buffer, 64);
        assert!(config.stage_timeout.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_env() {
        let lookup = lookup_from(&[
            ("PULSE_BIND_ADDR", "127.0.0.1:8080"),
            ("PULSE_REPORTS_DIR", "/tmp/reports"),
            ("PULSE_MAX_CONCURRENT_SESSIONS", "2"),
            ("PULSE_STAGE_TIMEOUT_SECS", "30"),
            ("PULSE_RETENTION_SECS", "3600"),
            ("GEMINI_API_KEY", "secret"),
            ("GEMINI_MODEL", "gemini-2.5-pro"),
        ]);
        let config = ServerConfig::from_env(&lookup).unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.reports_dir, PathBuf::from("/tmp/reports"));
        assert_eq!(config.charts_dir, PathBuf::from("charts"));
        assert_eq!(config.max_concurrent_sessions, 2);
        assert_eq!(config.stage_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.retention, Some(Duration::from_secs(3600)));
        assert_eq!(config.gemini_api_key.as_deref(), Some("secret"));
        assert_eq!(config.analysis.insight_model, "gemini-2.5-pro");
    }

    #[test]
    fn test_from_env_defaults() {
        let lookup = lookup_from(&[("GEMINI_API_KEY", "  ")]);
        let config = ServerConfig::from_env(&lookup).unwrap();
        assert!(config.gemini_api_key.is_none());
        assert_eq!(config.analysis.insight_model, DEFAULT_INSIGHT_MODEL);
    }

    #[test]
    fn test_from_env_rejects_bad_values() {
        let lookup = lookup_from(&[("PULSE_MAX_CONCURRENT_SESSIONS", "many")]);
        assert!(ServerConfig::from_env(&lookup).is_err());

        let lookup = lookup_from(&[("PULSE_EVENT_BUFFER", "0")]);
        assert!(ServerConfig::from_env(&lookup).is_err());
    }

    #[test]
    fn test_builder_validation() {
        assert!(ServerConfig::builder().max_concurrent_sessions(0).build().is_err());
        assert!(ServerConfig::builder().stage_timeout(Duration::ZERO).build().is_err());
        assert!(ServerConfig::builder().bind_addr(" ").build().is_err());
    }

    #[test]
    fn test_zero_retention_rejected() {
        let err = ServerConfig::builder().retention(Duration::ZERO).build().unwrap_err();
        assert!(err.to_string().contains("retention"));

        let lookup = lookup_from(&[("PULSE_RETENTION_SECS", "0")]);
        assert!(ServerConfig::from_env(&lookup).is_err());

        let config = ServerConfig::builder().retention(Duration::from_secs(1)).build().unwrap();
        assert_eq!(config.retention, Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = ServerConfig::builder().gemini_api_key("top-secret").build().unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("top-secret"));
        assert!(debug.contains("REDACTED"));
    }
}
