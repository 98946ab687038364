//! Momentum oscillators: RSI, stochastic, Williams %R and rate of change

use super::{Line, RangeSignal, latest, rolling_mean, run};
use crate::error::Result;
use crate::market::PriceSeries;
use serde::{Deserialize, Serialize};
use ta::indicators::{FastStochastic, RateOfChange, RelativeStrengthIndex};

const RSI_PERIOD: usize = 14;
const STOCH_PERIOD: usize = 14;
const STOCH_SIGNAL: usize = 3;
const ROC_PERIOD: usize = 12;

/// Latest momentum readings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MomentumIndicators {
    pub rsi: Option<f64>,
    pub stoch_k: Option<f64>,
    pub stoch_d: Option<f64>,
    pub williams_r: Option<f64>,
    /// Percent change over the last 12 bars
    pub roc: Option<f64>,
    /// RSI above 70 / below 30
    pub rsi_signal: Option<RangeSignal>,
    /// %K above 80 / below 20
    pub stoch_signal: Option<RangeSignal>,
}

#[derive(Debug, Clone, Default)]
pub struct MomentumSeries {
    pub rsi: Line,
    pub stoch_k: Line,
    pub stoch_d: Line,
    pub williams_r: Line,
    pub roc: Line,
}

pub fn compute(series: &PriceSeries) -> Result<(MomentumIndicators, MomentumSeries)> {
    let closes = series.closes();

    let rsi = run(RelativeStrengthIndex::new(RSI_PERIOD)?, closes.iter().copied(), RSI_PERIOD + 1);
    let stoch_k = run(FastStochastic::new(STOCH_PERIOD)?, series.bars.iter(), STOCH_PERIOD);
    let stoch_d = rolling_mean(&stoch_k, STOCH_SIGNAL);
    // %R is %K shifted onto the [-100, 0] scale.
    let williams_r: Line = stoch_k.iter().map(|k| k.map(|k| k - 100.0)).collect();
    let roc = run(RateOfChange::new(ROC_PERIOD)?, closes.iter().copied(), ROC_PERIOD + 1);

    let snapshot = MomentumIndicators {
        rsi: latest(&rsi),
        stoch_k: latest(&stoch_k),
        stoch_d: latest(&stoch_d),
        williams_r: latest(&williams_r),
        roc: latest(&roc),
        rsi_signal: latest(&rsi).map(|v| RangeSignal::classify(v, 30.0, 70.0)),
        stoch_signal: latest(&stoch_k).map(|v| RangeSignal::classify(v, 20.0, 80.0)),
    };

    Ok((
        snapshot,
        MomentumSeries {
            rsi,
            stoch_k,
            stoch_d,
            williams_r,
            roc,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::test_support::{short_series, year_series};
    use crate::market::Quote;
    use chrono::{Duration, TimeZone, Utc};

    fn rising(days: usize) -> PriceSeries {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 14, 30, 0).unwrap();
        let bars = (0..days)
            .map(|i| {
                let close = 100.0 + i as f64;
                Quote {
                    timestamp: start + Duration::days(i as i64),
                    open: close - 0.5,
                    high: close + 0.1,
                    low: close - 1.0,
                    close,
                    volume: 1_000,
                    adjclose: close,
                }
            })
            .collect();
        PriceSeries::new("UP", bars)
    }

    #[test]
    fn test_oscillators_bounded() {
        let (_, lines) = compute(&year_series()).unwrap();
        for v in lines.rsi.iter().chain(&lines.stoch_k).chain(&lines.stoch_d).flatten() {
            assert!((0.0..=100.0).contains(v));
        }
        for v in lines.williams_r.iter().flatten() {
            assert!((-100.0..=0.0).contains(v));
        }
    }

    #[test]
    fn test_steady_rise_is_overbought() {
        let (snapshot, _) = compute(&rising(40)).unwrap();
        assert_eq!(snapshot.rsi_signal, Some(RangeSignal::Overbought));
        assert_eq!(snapshot.stoch_signal, Some(RangeSignal::Overbought));
        assert!(snapshot.roc.unwrap() > 0.0);
    }

    #[test]
    fn test_roc_matches_definition() {
        let series = rising(40);
        let (snapshot, _) = compute(&series).unwrap();
        let closes = series.closes();
        let n = closes.len();
        let expected = (closes[n - 1] - closes[n - 13]) / closes[n - 13] * 100.0;
        assert!((snapshot.roc.unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_short_series_has_no_readings() {
        let (snapshot, lines) = compute(&short_series(5)).unwrap();
        assert!(snapshot.rsi.is_none());
        assert!(snapshot.rsi_signal.is_none());
        assert!(snapshot.stoch_d.is_none());
        assert_eq!(lines.rsi.len(), 5);
    }
}
