//! Yahoo Finance market data source

use super::{DateRange, MarketDataSource, Quote};
use crate::cache::{HistoryCache, HistoryKey};
use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use time::OffsetDateTime;
use yahoo_finance_api as yahoo;

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

const PROVIDER: &str = "yahoo";

/// Yahoo Finance client with rate limiting and a history cache
#[derive(Clone)]
pub struct YahooFinanceClient {
    cache: HistoryCache,
    rate_limiter: SharedRateLimiter,
}

impl YahooFinanceClient {
    /// Create a client from analysis settings
    pub fn new(config: &AnalysisConfig) -> Self {
        let rpm = NonZeroU32::new(config.requests_per_minute).unwrap_or(NonZeroU32::MIN);
        Self {
            cache: HistoryCache::new(config.cache_ttl),
            rate_limiter: Arc::new(RateLimiter::direct(Quota::per_minute(rpm))),
        }
    }

    fn connector() -> Result<yahoo::YahooConnector> {
        yahoo::YahooConnector::new().map_err(|e| AnalysisError::YahooFinanceError(e.to_string()))
    }

    fn midnight_utc(date: NaiveDate) -> Result<OffsetDateTime> {
        let ts = date
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp())
            .ok_or_else(|| AnalysisError::InvalidDateRange(format!("invalid date {date}")))?;
        OffsetDateTime::from_unix_timestamp(ts)
            .map_err(|e| AnalysisError::InvalidDateRange(format!("invalid timestamp for {date}: {e}")))
    }

    fn convert(quotes: &[yahoo::Quote]) -> Vec<Quote> {
        quotes
            .iter()
            .filter_map(|q| {
                let timestamp = DateTime::from_timestamp(q.timestamp as i64, 0)?;
                Some(Quote {
                    timestamp,
                    open: q.open,
                    high: q.high,
                    low: q.low,
                    close: q.close,
                    volume: q.volume,
                    adjclose: q.adjclose,
                })
            })
            .collect()
    }

    /// Yahoo reports unknown symbols and empty windows as errors; both mean
    /// "no bars" to the caller.
    fn is_no_data(err: &yahoo::YahooError) -> bool {
        let message = err.to_string().to_lowercase();
        message.contains("no data") || message.contains("not found") || message.contains("empty")
    }

    async fn fetch_history(&self, symbol: &str, range: &DateRange) -> Result<Vec<Quote>> {
        self.rate_limiter.until_ready().await;

        let start = Self::midnight_utc(range.start)?;
        let end = Self::midnight_utc(range.end)?;

        let response = match Self::connector()?.get_quote_history(symbol, start, end).await {
            Ok(response) => response,
            Err(e) if Self::is_no_data(&e) => return Ok(Vec::new()),
            Err(e) => return Err(AnalysisError::YahooFinanceError(e.to_string())),
        };

        match response.quotes() {
            Ok(quotes) => Ok(Self::convert(&quotes)
                .into_iter()
                .filter(|q| range.contains(q.date()))
                .collect()),
            Err(e) if Self::is_no_data(&e) => Ok(Vec::new()),
            Err(e) => Err(AnalysisError::YahooFinanceError(e.to_string())),
        }
    }

    async fn fetch_intraday(&self, symbol: &str) -> Result<Vec<Quote>> {
        self.rate_limiter.until_ready().await;

        let response = Self::connector()?
            .get_quote_range(symbol, "1m", "1d")
            .await
            .map_err(|e| AnalysisError::YahooFinanceError(e.to_string()))?;

        let quotes = response
            .quotes()
            .map_err(|e| AnalysisError::YahooFinanceError(e.to_string()))?;

        let today = Utc::now().date_naive();
        Ok(Self::convert(&quotes)
            .into_iter()
            .filter(|q| q.date() == today)
            .collect())
    }
}

#[async_trait]
impl MarketDataSource for YahooFinanceClient {
    #[tracing::instrument(skip(self), fields(provider = PROVIDER))]
    async fn daily_history(&self, symbol: &str, range: &DateRange) -> Result<Vec<Quote>> {
        let key = HistoryKey::new(symbol, "1d", range.to_string());
        let quotes = self
            .cache
            .get_or_fetch(key, || self.fetch_history(symbol, range))
            .await?;
        Ok(quotes.as_ref().clone())
    }

    #[tracing::instrument(skip(self), fields(provider = PROVIDER))]
    async fn intraday(&self, symbol: &str) -> Result<Vec<Quote>> {
        // Intraday bars change by the minute and are never cached.
        self.fetch_intraday(symbol).await
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}
