//! In-memory market data for offline runs and tests

use super::{DateRange, MarketDataSource, Quote};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

/// A market data source backed by fixed series
///
/// Unknown symbols yield an empty history, the same outcome a live source
/// gives for a symbol it does not list.
#[derive(Debug, Default)]
pub struct InMemoryMarketData {
    daily: RwLock<HashMap<String, Vec<Quote>>>,
    intraday: RwLock<HashMap<String, Vec<Quote>>>,
}

impl InMemoryMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register daily bars for a symbol
    pub fn with_daily(self, symbol: impl Into<String>, quotes: Vec<Quote>) -> Self {
        if let Ok(mut daily) = self.daily.write() {
            daily.insert(symbol.into().to_uppercase(), quotes);
        }
        self
    }

    /// Register intraday bars for a symbol
    pub fn with_intraday(self, symbol: impl Into<String>, quotes: Vec<Quote>) -> Self {
        if let Ok(mut intraday) = self.intraday.write() {
            intraday.insert(symbol.into().to_uppercase(), quotes);
        }
        self
    }

    /// Register a deterministic synthetic series of `days` bars ending the
    /// day before `end`
    pub fn with_synthetic(self, symbol: impl Into<String>, end: NaiveDate, days: i64, base: f64) -> Self {
        let start = end - Duration::days(days);
        self.with_daily(symbol, synthetic_quotes(start, days as usize, base))
    }

    fn lookup(map: &RwLock<HashMap<String, Vec<Quote>>>, symbol: &str) -> Vec<Quote> {
        map.read()
            .ok()
            .and_then(|m| m.get(&symbol.to_uppercase()).cloned())
            .unwrap_or_default()
    }
}

#[async_trait]
impl MarketDataSource for InMemoryMarketData {
    async fn daily_history(&self, symbol: &str, range: &DateRange) -> Result<Vec<Quote>> {
        Ok(Self::lookup(&self.daily, symbol)
            .into_iter()
            .filter(|q| range.contains(q.date()))
            .collect())
    }

    async fn intraday(&self, symbol: &str) -> Result<Vec<Quote>> {
        Ok(Self::lookup(&self.intraday, symbol))
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Deterministic daily bars starting at `start`
///
/// A gentle uptrend with a slow oscillation on top, so every indicator has
/// something non-trivial to measure.
pub fn synthetic_quotes(start: NaiveDate, days: usize, base: f64) -> Vec<Quote> {
    (0..days)
        .filter_map(|i| {
            let date = start + Duration::days(i as i64);
            let timestamp = Utc.from_utc_datetime(&date.and_hms_opt(14, 30, 0)?);
            let t = i as f64;
            let open = base + 0.15 * t + 6.0 * (t / 9.0).sin();
            let close = base + 0.15 * (t + 0.5) + 6.0 * ((t + 0.5) / 9.0).sin();
            let swing = 0.6 + 0.4 * (t / 5.0).cos().abs();

            Some(Quote {
                timestamp,
                open,
                high: open.max(close) + swing,
                low: open.min(close) - swing,
                close,
                volume: 1_000_000 + (i as u64 % 7) * 125_000,
                adjclose: close,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_synthetic_quotes_are_well_formed() {
        let quotes = synthetic_quotes(date(2024, 1, 1), 300, 100.0);
        assert_eq!(quotes.len(), 300);
        for q in &quotes {
            assert!(q.high >= q.open.max(q.close));
            assert!(q.low <= q.open.min(q.close));
            assert!(q.volume > 0);
        }
        assert!(quotes.last().unwrap().close > quotes[0].close);
        assert_eq!(quotes, synthetic_quotes(date(2024, 1, 1), 300, 100.0));
    }

    #[tokio::test]
    async fn test_daily_history_filters_by_range() {
        let end = date(2024, 6, 1);
        let source = InMemoryMarketData::new().with_synthetic("aapl", end, 100, 150.0);

        let range = DateRange::last_days(end, 10).unwrap();
        let quotes = source.daily_history("AAPL", &range).await.unwrap();
        assert_eq!(quotes.len(), 10);
        assert!(quotes.iter().all(|q| range.contains(q.date())));
    }

    #[tokio::test]
    async fn test_unknown_symbol_is_empty() {
        let source = InMemoryMarketData::new();
        let range = DateRange::last_days(date(2024, 6, 1), 10).unwrap();

        assert!(source.daily_history("ZZZZ", &range).await.unwrap().is_empty());
        assert!(source.intraday("ZZZZ").await.unwrap().is_empty());
        assert_eq!(source.name(), "memory");
    }
}
