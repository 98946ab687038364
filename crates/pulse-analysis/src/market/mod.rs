//! Market data access
//!
//! A [`MarketDataSource`] supplies daily and intraday bars. [`fetch_series`]
//! turns those into the [`PriceSeries`] every later analysis step consumes,
//! appending a synthesized bar for today when the daily history lags behind.

pub mod memory;
pub mod yahoo;

pub use memory::InMemoryMarketData;
pub use yahoo::YahooFinanceClient;

use crate::error::{AnalysisError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One OHLCV bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    pub adjclose: f64,
}

impl Quote {
    /// Calendar date of the bar in UTC
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }

    /// Typical price `(high + low + close) / 3`
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }
}

// The `ta` indicators read bars through these traits.
impl ta::Open for Quote {
    fn open(&self) -> f64 {
        self.open
    }
}

impl ta::High for Quote {
    fn high(&self) -> f64 {
        self.high
    }
}

impl ta::Low for Quote {
    fn low(&self) -> f64 {
        self.low
    }
}

impl ta::Close for Quote {
    fn close(&self) -> f64 {
        self.close
    }
}

impl ta::Volume for Quote {
    fn volume(&self) -> f64 {
        self.volume as f64
    }
}

/// Half-open calendar window `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Create a range, rejecting empty or inverted windows
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start >= end {
            return Err(AnalysisError::InvalidDateRange(format!(
                "start date {start} must be before end date {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// The `days` days leading up to `end`
    pub fn last_days(end: NaiveDate, days: i64) -> Result<Self> {
        Self::new(end - Duration::days(days), end)
    }

    /// Whether `date` falls inside the window
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }

    /// Number of calendar days covered
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

/// Ordered daily bars for one symbol
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSeries {
    pub symbol: String,
    pub bars: Vec<Quote>,
    /// True when the last bar was synthesized from intraday data
    pub includes_intraday: bool,
}

impl PriceSeries {
    /// Create a series, sorting bars by time
    pub fn new(symbol: impl Into<String>, mut bars: Vec<Quote>) -> Self {
        bars.sort_by_key(|q| q.timestamp);
        Self {
            symbol: symbol.into(),
            bars,
            includes_intraday: false,
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last(&self) -> Option<&Quote> {
        self.bars.last()
    }

    /// Closing prices in order
    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|q| q.close).collect()
    }

    /// Bar dates in order, formatted `YYYY-MM-DD`
    pub fn dates(&self) -> Vec<String> {
        self.bars.iter().map(|q| q.date().to_string()).collect()
    }

    /// Error unless the series holds at least `needed` bars
    pub fn require(&self, needed: usize) -> Result<()> {
        if self.bars.len() < needed {
            return Err(AnalysisError::InsufficientData {
                needed,
                available: self.bars.len(),
            });
        }
        Ok(())
    }
}

/// A provider of market bars
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Daily bars with dates inside `range`
    async fn daily_history(&self, symbol: &str, range: &DateRange) -> Result<Vec<Quote>>;

    /// Today's one-minute bars
    async fn intraday(&self, symbol: &str) -> Result<Vec<Quote>>;

    /// Provider name for logs
    fn name(&self) -> &str;
}

/// Collapse intraday bars into a single daily bar
///
/// Open of the first bar, extreme high and low, close of the last bar and
/// summed volume. Returns `None` for an empty slice.
pub fn synthesize_daily_bar(intraday: &[Quote]) -> Option<Quote> {
    let first = intraday.first()?;
    let last = intraday.last()?;

    let high = intraday.iter().map(|q| q.high).fold(f64::MIN, f64::max);
    let low = intraday.iter().map(|q| q.low).fold(f64::MAX, f64::min);
    let volume = intraday.iter().map(|q| q.volume).sum();

    Some(Quote {
        timestamp: last.timestamp,
        open: first.open,
        high,
        low,
        close: last.close,
        volume,
        adjclose: last.close,
    })
}

/// Load the analysis series for `symbol`
///
/// Fails with [`AnalysisError::DataUnavailable`] when the source returns no
/// daily bars. When `include_intraday` is set, the window reaches `today` and
/// the newest bar is older than `today`, a bar for today is synthesized from
/// intraday data; failures on that path are logged and ignored.
pub async fn fetch_series(
    source: &dyn MarketDataSource,
    symbol: &str,
    range: &DateRange,
    include_intraday: bool,
    today: NaiveDate,
) -> Result<PriceSeries> {
    let history = source.daily_history(symbol, range).await?;
    if history.is_empty() {
        return Err(AnalysisError::DataUnavailable {
            symbol: symbol.to_string(),
            reason: "no data found for symbol".to_string(),
        });
    }

    let mut series = PriceSeries::new(symbol, history);
    tracing::debug!(
        symbol,
        source = source.name(),
        bars = series.len(),
        "Fetched daily history"
    );

    let lagging = series.last().is_some_and(|q| q.date() < today);
    if include_intraday && range.end >= today && lagging {
        match source.intraday(symbol).await {
            Ok(bars) => {
                if let Some(bar) = synthesize_daily_bar(&bars) {
                    tracing::debug!(symbol, close = bar.close, "Appending intraday bar");
                    series.bars.push(bar);
                    series.includes_intraday = true;
                }
            },
            Err(e) => {
                tracing::warn!(symbol, error = %e, "Intraday data unavailable, continuing without it");
            },
        }
    }

    Ok(series)
}
