//! Technical indicators
//!
//! Each family module turns a [`PriceSeries`] into a snapshot of the latest
//! readings plus the full lines used for charting. Values that have not yet
//! warmed up (fewer bars than the indicator window) are `None`.

pub mod momentum;
pub mod trend;
pub mod volatility;
pub mod volume;

pub use momentum::{MomentumIndicators, MomentumSeries};
pub use trend::{TrendIndicators, TrendSeries, TrendStrength};
pub use volatility::{BandPosition, VolatilityIndicators, VolatilityLevel, VolatilitySeries};
pub use volume::{VolumeIndicators, VolumeSeries, VolumeTrend};

use crate::error::Result;
use crate::market::PriceSeries;
use serde::{Deserialize, Serialize};
use std::fmt;
use ta::Next;

/// Fewest bars the indicator step accepts
pub const MIN_BARS: usize = 2;

/// An indicator line aligned with the series bars
pub type Line = Vec<Option<f64>>;

/// Reading of a bounded oscillator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RangeSignal {
    Overbought,
    Oversold,
    Neutral,
}

impl RangeSignal {
    /// Classify `value` against the `low`/`high` thresholds
    pub fn classify(value: f64, low: f64, high: f64) -> Self {
        if value > high {
            Self::Overbought
        } else if value < low {
            Self::Oversold
        } else {
            Self::Neutral
        }
    }
}

impl fmt::Display for RangeSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overbought => write!(f, "Overbought"),
            Self::Oversold => write!(f, "Oversold"),
            Self::Neutral => write!(f, "Neutral"),
        }
    }
}

/// All indicator families for one series
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorSet {
    pub current_price: f64,
    pub trend: TrendIndicators,
    pub momentum: MomentumIndicators,
    pub volatility: VolatilityIndicators,
    pub volume: VolumeIndicators,
    #[serde(skip)]
    pub series: IndicatorSeries,
}

/// Full indicator lines, for charts
#[derive(Debug, Clone, Default)]
pub struct IndicatorSeries {
    pub trend: TrendSeries,
    pub momentum: MomentumSeries,
    pub volatility: VolatilitySeries,
    pub volume: VolumeSeries,
}

/// Compute every indicator family
pub fn compute(series: &PriceSeries) -> Result<IndicatorSet> {
    series.require(MIN_BARS)?;

    let current_price = series.last().map_or(0.0, |q| q.close);
    let (trend, trend_series) = trend::compute(series)?;
    let (momentum, momentum_series) = momentum::compute(series)?;
    let (volatility, volatility_series) = volatility::compute(series)?;
    let (volume, volume_series) = volume::compute(series)?;

    tracing::debug!(
        symbol = %series.symbol,
        bars = series.len(),
        rsi = ?momentum.rsi,
        adx = ?trend.adx,
        "Indicators computed"
    );

    Ok(IndicatorSet {
        current_price,
        trend,
        momentum,
        volatility,
        volume,
        series: IndicatorSeries {
            trend: trend_series,
            momentum: momentum_series,
            volatility: volatility_series,
            volume: volume_series,
        },
    })
}

/// Feed `inputs` through a `ta` indicator, masking the warm-up window
pub(crate) fn run<I, T>(mut indicator: I, inputs: impl IntoIterator<Item = T>, warmup: usize) -> Line
where
    I: Next<T, Output = f64>,
{
    inputs
        .into_iter()
        .enumerate()
        .map(|(i, input)| {
            let value = indicator.next(input);
            (i + 1 >= warmup && value.is_finite()).then_some(value)
        })
        .collect()
}

/// Mask values before `warmup` bars and any non-finite value
pub(crate) fn warmed(values: impl IntoIterator<Item = f64>, warmup: usize) -> Line {
    values
        .into_iter()
        .enumerate()
        .map(|(i, v)| (i + 1 >= warmup && v.is_finite()).then_some(v))
        .collect()
}

/// Most recent value of a line
pub(crate) fn latest(line: &[Option<f64>]) -> Option<f64> {
    line.last().copied().flatten()
}

/// Trailing mean over `window` present values
///
/// A position is `None` unless all of the last `window` entries are present.
pub(crate) fn rolling_mean(line: &[Option<f64>], window: usize) -> Line {
    (0..line.len())
        .map(|i| {
            if window == 0 || i + 1 < window {
                return None;
            }
            line[i + 1 - window..=i]
                .iter()
                .copied()
                .sum::<Option<f64>>()
                .map(|sum| sum / window as f64)
        })
        .collect()
}

/// Trailing sum over `window` values
pub(crate) fn rolling_sum(values: &[f64], window: usize) -> Line {
    (0..values.len())
        .map(|i| {
            (window > 0 && i + 1 >= window).then(|| values[i + 1 - window..=i].iter().sum::<f64>())
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::market::memory::synthetic_quotes;
    use crate::market::PriceSeries;
    use chrono::NaiveDate;

    /// A year of synthetic bars
    pub fn year_series() -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        PriceSeries::new("TEST", synthetic_quotes(start, 365, 100.0))
    }

    /// A short series, too short for most windows
    pub fn short_series(days: usize) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        PriceSeries::new("TEST", synthetic_quotes(start, days, 100.0))
    }
}
