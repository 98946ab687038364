//! Technical market analysis
//!
//! This crate provides the computational building blocks of a market
//! analysis run. It includes:
//!
//! - Market data access (Yahoo Finance, plus an in-memory source for offline use)
//! - Trend, momentum, volatility and volume indicators
//! - Pattern analysis (Fibonacci levels, pivots, projections, risk metrics)
//! - Buy/sell/hold signal aggregation
//! - AI-written briefings through a [`pulse_llm::LLMProvider`]
//! - Chart data assets and the final HTML report
//! - A searchable catalog of well-known symbols
//!
//! # Example
//!
//! ```rust,ignore
//! use pulse_analysis::{AnalysisConfig, DateRange, YahooFinanceClient};
//! use pulse_analysis::market::fetch_series;
//!
//! let config = AnalysisConfig::default();
//! let source = YahooFinanceClient::new(&config);
//! let range = DateRange::last_days(chrono::Utc::now().date_naive(), 365)?;
//! let series = fetch_series(&source, "AAPL", &range, true, range.end).await?;
//! let indicators = pulse_analysis::indicators::compute(&series)?;
//! ```

pub mod cache;
pub mod chart;
pub mod config;
pub mod error;
pub mod indicators;
pub mod insights;
pub mod market;
pub mod patterns;
pub mod report;
pub mod signals;
pub mod symbols;

// Re-export main types for convenience
pub use chart::{ChartAsset, ChartRenderer, ChartRequest, SeriesChartRenderer};
pub use config::AnalysisConfig;
pub use error::{AnalysisError, Result};
pub use indicators::IndicatorSet;
pub use insights::InsightGenerator;
pub use market::{DateRange, InMemoryMarketData, MarketDataSource, PriceSeries, Quote, YahooFinanceClient};
pub use patterns::PatternAnalysis;
pub use report::{ReportArtifact, ReportInput};
pub use signals::{Signal, TradingSignals};
pub use symbols::SymbolMatch;
