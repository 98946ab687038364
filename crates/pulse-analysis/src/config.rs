//! Configuration for market analysis runs

use crate::error::{AnalysisError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default model used for AI briefings
pub const DEFAULT_INSIGHT_MODEL: &str = "gemini-2.5-flash";

/// Configuration for market data access and analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// How long fetched quote histories stay cached
    pub cache_ttl: Duration,

    /// Maximum market data requests per minute
    pub requests_per_minute: u32,

    /// Whether to synthesize today's bar from intraday data
    pub include_intraday: bool,

    /// Lookback in days when no start date is given
    pub default_lookback_days: i64,

    /// Model name passed to the insight provider
    pub insight_model: String,

    /// Output token budget for AI briefings
    pub insight_max_tokens: usize,

    /// Sampling temperature for AI briefings
    pub insight_temperature: f32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(300), // 5 minutes
            requests_per_minute: 60,
            include_intraday: true,
            default_lookback_days: 365,
            insight_model: DEFAULT_INSIGHT_MODEL.to_string(),
            insight_max_tokens: 2048,
            insight_temperature: 0.4,
        }
    }
}

impl AnalysisConfig {
    /// Create a new configuration builder
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.requests_per_minute == 0 {
            return Err(AnalysisError::ConfigError(
                "requests_per_minute must be greater than 0".to_string(),
            ));
        }

        if self.default_lookback_days <= 0 {
            return Err(AnalysisError::ConfigError(
                "default_lookback_days must be greater than 0".to_string(),
            ));
        }

        if self.insight_max_tokens == 0 {
            return Err(AnalysisError::ConfigError(
                "insight_max_tokens must be greater than 0".to_string(),
            ));
        }

        if self.insight_model.trim().is_empty() {
            return Err(AnalysisError::ConfigError("insight_model must not be empty".to_string()));
        }

        Ok(())
    }
}

/// Builder for AnalysisConfig
#[derive(Debug, Default)]
pub struct AnalysisConfigBuilder {
    cache_ttl: Option<Duration>,
    requests_per_minute: Option<u32>,
    include_intraday: Option<bool>,
    default_lookback_days: Option<i64>,
    insight_model: Option<String>,
    insight_max_tokens: Option<usize>,
    insight_temperature: Option<f32>,
}

impl AnalysisConfigBuilder {
    /// Set the quote history cache TTL
    pub fn cache_ttl(mut self, duration: Duration) -> Self {
        self.cache_ttl = Some(duration);
        self
    }

    /// Set the market data request rate
    pub fn requests_per_minute(mut self, rpm: u32) -> Self {
        self.requests_per_minute = Some(rpm);
        self
    }

    /// Enable or disable the synthesized intraday bar
    pub fn include_intraday(mut self, enabled: bool) -> Self {
        self.include_intraday = Some(enabled);
        self
    }

    /// Set the default lookback window
    pub fn default_lookback_days(mut self, days: i64) -> Self {
        self.default_lookback_days = Some(days);
        self
    }

    /// Set the insight model name
    pub fn insight_model(mut self, model: impl Into<String>) -> Self {
        self.insight_model = Some(model.into());
        self
    }

    /// Set the insight token budget
    pub fn insight_max_tokens(mut self, tokens: usize) -> Self {
        self.insight_max_tokens = Some(tokens);
        self
    }

    /// Set the insight sampling temperature
    pub fn insight_temperature(mut self, temperature: f32) -> Self {
        self.insight_temperature = Some(temperature);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<AnalysisConfig> {
        let default = AnalysisConfig::default();

        let config = AnalysisConfig {
            cache_ttl: self.cache_ttl.unwrap_or(default.cache_ttl),
            requests_per_minute: self.requests_per_minute.unwrap_or(default.requests_per_minute),
            include_intraday: self.include_intraday.unwrap_or(default.include_intraday),
            default_lookback_days: self
                .default_lookback_days
                .unwrap_or(default.default_lookback_days),
            insight_model: self.insight_model.unwrap_or(default.insight_model),
            insight_max_tokens: self.insight_max_tokens.unwrap_or(default.insight_max_tokens),
            insight_temperature: self.insight_temperature.unwrap_or(default.insight_temperature),
        };

        config.validate()?;
        Ok(config)
    }
}
