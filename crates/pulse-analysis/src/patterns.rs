//! Price structure analysis
//!
//! Fibonacci retracements over the full window, classic pivots from the
//! latest bar, a linear-regression projection and return-based risk metrics.

use crate::error::Result;
use crate::indicators::IndicatorSet;
use crate::market::PriceSeries;
use serde::{Deserialize, Serialize};
use std::fmt;

const FIB_RATIOS: [(&str, f64); 7] = [
    ("0.0", 0.0),
    ("0.236", 0.236),
    ("0.382", 0.382),
    ("0.500", 0.5),
    ("0.618", 0.618),
    ("0.786", 0.786),
    ("1.0", 1.0),
];

const PROJECTION_DAYS: usize = 5;
const TRADING_DAYS: f64 = 252.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FibonacciLevel {
    pub label: String,
    pub ratio: f64,
    pub price: f64,
}

/// Retracement levels between the window's swing high and low
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FibonacciLevels {
    pub swing_high: f64,
    pub swing_low: f64,
    /// Ordered from the swing high down to the swing low
    pub levels: Vec<FibonacciLevel>,
    pub closest_level: String,
}

/// Classic floor-trader pivots
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportResistance {
    pub pivot: f64,
    pub resistance_1: f64,
    pub resistance_2: f64,
    pub support_1: f64,
    pub support_2: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Bullish,
    Bearish,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bullish => write!(f, "Bullish"),
            Self::Bearish => write!(f, "Bearish"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceRange {
    pub expected_high: f64,
    pub expected_low: f64,
}

/// Short-horizon projection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceForecast {
    pub next_5_days: Vec<f64>,
    pub slope: f64,
    pub trend: Direction,
    /// Current price plus or minus one ATR
    pub volatility_range: Option<PriceRange>,
}

/// Return-based performance and risk metrics, in percent except Sharpe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskMetrics {
    pub total_return: f64,
    pub volatility: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub avg_daily_return: f64,
    pub positive_days: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternAnalysis {
    pub fibonacci: FibonacciLevels,
    pub support_resistance: SupportResistance,
    pub forecast: PriceForecast,
    pub risk: RiskMetrics,
}

pub fn analyze(series: &PriceSeries, indicators: &IndicatorSet) -> Result<PatternAnalysis> {
    series.require(2)?;

    Ok(PatternAnalysis {
        fibonacci: fibonacci(series),
        support_resistance: support_resistance(series)?,
        forecast: forecast(series, indicators.volatility.atr),
        risk: risk_metrics(series),
    })
}

pub fn fibonacci(series: &PriceSeries) -> FibonacciLevels {
    let swing_high = series.bars.iter().map(|q| q.high).fold(f64::MIN, f64::max);
    let swing_low = series.bars.iter().map(|q| q.low).fold(f64::MAX, f64::min);
    let diff = swing_high - swing_low;
    let price = series.last().map_or(0.0, |q| q.close);

    let levels: Vec<FibonacciLevel> = FIB_RATIOS
        .iter()
        .map(|&(label, ratio)| FibonacciLevel {
            label: label.to_string(),
            ratio,
            price: swing_high - ratio * diff,
        })
        .collect();

    let closest_level = levels
        .iter()
        .min_by(|a, b| (a.price - price).abs().total_cmp(&(b.price - price).abs()))
        .map(|l| l.label.clone())
        .unwrap_or_default();

    FibonacciLevels {
        swing_high,
        swing_low,
        levels,
        closest_level,
    }
}

pub fn support_resistance(series: &PriceSeries) -> Result<SupportResistance> {
    series.require(1)?;
    let (high, low, close) = series
        .last()
        .map(|q| (q.high, q.low, q.close))
        .unwrap_or_default();

    let pivot = (high + low + close) / 3.0;
    Ok(SupportResistance {
        pivot,
        resistance_1: 2.0 * pivot - low,
        resistance_2: pivot + (high - low),
        support_1: 2.0 * pivot - high,
        support_2: pivot - (high - low),
    })
}

/// Least-squares line through `(index, close)`, projected forward
pub fn forecast(series: &PriceSeries, atr: Option<f64>) -> PriceForecast {
    let closes = series.closes();
    let n = closes.len() as f64;

    let mean_x = (n - 1.0) / 2.0;
    let mean_y = closes.iter().sum::<f64>() / n;
    let (mut cov, mut var) = (0.0, 0.0);
    for (i, y) in closes.iter().enumerate() {
        let dx = i as f64 - mean_x;
        cov += dx * (y - mean_y);
        var += dx * dx;
    }
    let slope = if var > 0.0 { cov / var } else { 0.0 };
    let intercept = mean_y - slope * mean_x;

    let next_5_days = (0..PROJECTION_DAYS)
        .map(|k| intercept + slope * (closes.len() + k) as f64)
        .collect();

    let price = closes.last().copied().unwrap_or_default();
    PriceForecast {
        next_5_days,
        slope,
        trend: if slope > 0.0 {
            Direction::Bullish
        } else {
            Direction::Bearish
        },
        volatility_range: atr.map(|atr| PriceRange {
            expected_high: price + atr,
            expected_low: price - atr,
        }),
    }
}

pub fn risk_metrics(series: &PriceSeries) -> RiskMetrics {
    let closes = series.closes();
    let returns: Vec<f64> = closes
        .windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| w[1] / w[0] - 1.0)
        .collect();

    let count = returns.len() as f64;
    let mean = if returns.is_empty() {
        0.0
    } else {
        returns.iter().sum::<f64>() / count
    };
    // Sample standard deviation
    let std = if returns.len() > 1 {
        (returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (count - 1.0)).sqrt()
    } else {
        0.0
    };

    let mut peak = f64::MIN;
    let mut max_drawdown = 0.0_f64;
    for &close in &closes {
        peak = peak.max(close);
        if peak > 0.0 {
            max_drawdown = max_drawdown.min(close / peak - 1.0);
        }
    }

    let first = closes.first().copied().unwrap_or_default();
    let last = closes.last().copied().unwrap_or_default();

    RiskMetrics {
        total_return: if first == 0.0 { 0.0 } else { (last / first - 1.0) * 100.0 },
        volatility: std * TRADING_DAYS.sqrt() * 100.0,
        sharpe_ratio: if std == 0.0 { 0.0 } else { mean / std * TRADING_DAYS.sqrt() },
        max_drawdown: max_drawdown * 100.0,
        avg_daily_return: mean * 100.0,
        positive_days: if returns.is_empty() {
            0.0
        } else {
            returns.iter().filter(|r| **r > 0.0).count() as f64 / count * 100.0
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{self, test_support::year_series};
    use crate::market::Quote;
    use chrono::{Duration, TimeZone, Utc};

    fn from_closes(closes: &[f64]) -> PriceSeries {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 14, 30, 0).unwrap();
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Quote {
                timestamp: start + Duration::days(i as i64),
                open: close,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 100,
                adjclose: close,
            })
            .collect();
        PriceSeries::new("T", bars)
    }

    #[test]
    fn test_fibonacci_levels() {
        let series = from_closes(&[101.0, 150.0, 199.0, 120.0]);
        let fib = fibonacci(&series);

        assert_eq!(fib.swing_high, 200.0);
        assert_eq!(fib.swing_low, 100.0);
        assert_eq!(fib.levels.len(), 7);
        assert_eq!(fib.levels[0].price, 200.0);
        assert_eq!(fib.levels[6].price, 100.0);
        assert!((fib.levels[3].price - 150.0).abs() < 1e-9);
        // 120 is nearest the 0.786 level (121.4)
        assert_eq!(fib.closest_level, "0.786");
    }

    #[test]
    fn test_pivots() {
        let series = from_closes(&[10.0, 20.0]);
        let sr = support_resistance(&series).unwrap();

        // Last bar: high 21, low 19, close 20
        assert!((sr.pivot - 20.0).abs() < 1e-9);
        assert!((sr.resistance_1 - 21.0).abs() < 1e-9);
        assert!((sr.support_1 - 19.0).abs() < 1e-9);
        assert!((sr.resistance_2 - 22.0).abs() < 1e-9);
        assert!((sr.support_2 - 18.0).abs() < 1e-9);
    }

    #[test]
    fn test_linear_forecast() {
        let series = from_closes(&[10.0, 12.0, 14.0, 16.0]);
        let f = forecast(&series, Some(1.5));

        assert!((f.slope - 2.0).abs() < 1e-9);
        assert_eq!(f.trend, Direction::Bullish);
        assert_eq!(f.next_5_days.len(), 5);
        assert!((f.next_5_days[0] - 18.0).abs() < 1e-9);
        assert!((f.next_5_days[4] - 26.0).abs() < 1e-9);

        let range = f.volatility_range.unwrap();
        assert!((range.expected_high - 17.5).abs() < 1e-9);
        assert!((range.expected_low - 14.5).abs() < 1e-9);

        assert!(forecast(&series, None).volatility_range.is_none());
    }

    #[test]
    fn test_risk_metrics() {
        let series = from_closes(&[100.0, 110.0, 99.0, 108.9]);
        let risk = risk_metrics(&series);

        assert!((risk.total_return - 8.9).abs() < 1e-9);
        assert!((risk.max_drawdown - (-10.0)).abs() < 1e-9);
        assert!((risk.positive_days - 200.0 / 3.0).abs() < 1e-9);
        assert!(risk.volatility > 0.0);
    }

    #[test]
    fn test_flat_series_has_zero_sharpe() {
        let risk = risk_metrics(&from_closes(&[5.0, 5.0, 5.0]));
        assert_eq!(risk.sharpe_ratio, 0.0);
        assert_eq!(risk.max_drawdown, 0.0);
        assert_eq!(risk.positive_days, 0.0);
    }

    #[test]
    fn test_analyze_full_year() {
        let series = year_series();
        let set = indicators::compute(&series).unwrap();
        let analysis = analyze(&series, &set).unwrap();

        assert_eq!(analysis.forecast.trend, Direction::Bullish);
        assert!(analysis.forecast.volatility_range.is_some());
        assert!(analysis.support_resistance.resistance_1 > analysis.support_resistance.support_1);
    }
}
