//! Error types for market analysis operations

use pulse_llm::LLMError;
use thiserror::Error;

/// Market analysis specific errors
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Invalid market symbol provided
    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    /// Date range that cannot be analysed
    #[error("Invalid date range: {0}")]
    InvalidDateRange(String),

    /// Data not available for the requested symbol
    #[error("Data not available for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    /// Rate limit exceeded for a data provider
    #[error("Rate limit exceeded for {provider}")]
    RateLimitExceeded { provider: String },

    /// Yahoo Finance API error
    #[error("Yahoo Finance error: {0}")]
    YahooFinanceError(String),

    /// Not enough bars to compute a result
    #[error("Insufficient data: need at least {needed} bars, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// Technical indicator calculation error
    #[error("Technical indicator error: {0}")]
    IndicatorError(String),

    /// Insight provider failure
    #[error("Insight generation failed: {0}")]
    Insight(#[from] LLMError),

    /// Chart asset could not be produced
    #[error("Chart error: {0}")]
    ChartError(String),

    /// HTML report could not be rendered
    #[error("Report error: {0}")]
    ReportError(String),

    /// Filesystem error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Result type alias for analysis operations
pub type Result<T> = std::result::Result<T, AnalysisError>;

impl From<ta::errors::TaError> for AnalysisError {
    fn from(err: ta::errors::TaError) -> Self {
        AnalysisError::IndicatorError(err.to_string())
    }
}

impl From<minijinja::Error> for AnalysisError {
    fn from(err: minijinja::Error) -> Self {
        AnalysisError::ReportError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AnalysisError::InvalidSymbol("???".to_string());
        assert_eq!(err.to_string(), "Invalid symbol: ???");

        let err = AnalysisError::DataUnavailable {
            symbol: "AAPL".to_string(),
            reason: "no data found".to_string(),
        };
        assert_eq!(err.to_string(), "Data not available for AAPL: no data found");

        let err = AnalysisError::InsufficientData { needed: 2, available: 1 };
        assert_eq!(err.to_string(), "Insufficient data: need at least 2 bars, got 1");
    }

    #[test]
    fn test_llm_error_conversion() {
        let err: AnalysisError = LLMError::RateLimitExceeded("quota".to_string()).into();
        assert!(matches!(err, AnalysisError::Insight(_)));
        assert!(err.to_string().starts_with("Insight generation failed"));
    }
}
