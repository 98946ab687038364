//! Trend indicators: moving averages, MACD and ADX

use super::{Line, latest, run, warmed};
use crate::error::Result;
use crate::market::{PriceSeries, Quote};
use serde::{Deserialize, Serialize};
use std::fmt;
use ta::Next;
use ta::indicators::{
    ExponentialMovingAverage, MovingAverageConvergenceDivergence, SimpleMovingAverage,
};

const ADX_PERIOD: usize = 14;
const STRONG_TREND_ADX: f64 = 25.0;

/// Whether ADX shows a trending market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendStrength {
    Strong,
    Weak,
}

impl fmt::Display for TrendStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strong => write!(f, "Strong"),
            Self::Weak => write!(f, "Weak"),
        }
    }
}

/// Latest trend readings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrendIndicators {
    pub sma_20: Option<f64>,
    pub sma_50: Option<f64>,
    pub sma_200: Option<f64>,
    pub ema_12: Option<f64>,
    pub ema_26: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_histogram: Option<f64>,
    pub adx: Option<f64>,
    pub plus_di: Option<f64>,
    pub minus_di: Option<f64>,
    /// SMA50 above SMA200
    pub golden_cross: bool,
    pub price_above_sma200: bool,
    /// MACD line above its signal line
    pub macd_bullish: bool,
    pub trend_strength: Option<TrendStrength>,
}

#[derive(Debug, Clone, Default)]
pub struct TrendSeries {
    pub sma_20: Line,
    pub sma_50: Line,
    pub sma_200: Line,
    pub ema_12: Line,
    pub ema_26: Line,
    pub macd: Line,
    pub macd_signal: Line,
    pub macd_histogram: Line,
    pub adx: Line,
    pub plus_di: Line,
    pub minus_di: Line,
}

pub fn compute(series: &PriceSeries) -> Result<(TrendIndicators, TrendSeries)> {
    let closes = series.closes();

    let sma_20 = run(SimpleMovingAverage::new(20)?, closes.iter().copied(), 20);
    let sma_50 = run(SimpleMovingAverage::new(50)?, closes.iter().copied(), 50);
    let sma_200 = run(SimpleMovingAverage::new(200)?, closes.iter().copied(), 200);
    let ema_12 = run(ExponentialMovingAverage::new(12)?, closes.iter().copied(), 12);
    let ema_26 = run(ExponentialMovingAverage::new(26)?, closes.iter().copied(), 26);

    let mut macd_indicator = MovingAverageConvergenceDivergence::new(12, 26, 9)?;
    let outputs: Vec<_> = closes.iter().map(|&c| macd_indicator.next(c)).collect();
    let macd = warmed(outputs.iter().map(|o| o.macd), 26);
    let macd_signal = warmed(outputs.iter().map(|o| o.signal), 26 + 9 - 1);
    let macd_histogram = warmed(outputs.iter().map(|o| o.histogram), 26 + 9 - 1);

    let (adx, plus_di, minus_di) = directional_movement(&series.bars, ADX_PERIOD);

    let price = closes.last().copied();
    let snapshot = TrendIndicators {
        sma_20: latest(&sma_20),
        sma_50: latest(&sma_50),
        sma_200: latest(&sma_200),
        ema_12: latest(&ema_12),
        ema_26: latest(&ema_26),
        macd: latest(&macd),
        macd_signal: latest(&macd_signal),
        macd_histogram: latest(&macd_histogram),
        adx: latest(&adx),
        plus_di: latest(&plus_di),
        minus_di: latest(&minus_di),
        golden_cross: above(latest(&sma_50), latest(&sma_200)),
        price_above_sma200: above(price, latest(&sma_200)),
        macd_bullish: above(latest(&macd), latest(&macd_signal)),
        trend_strength: latest(&adx).map(|v| {
            if v > STRONG_TREND_ADX {
                TrendStrength::Strong
            } else {
                TrendStrength::Weak
            }
        }),
    };

    Ok((
        snapshot,
        TrendSeries {
            sma_20,
            sma_50,
            sma_200,
            ema_12,
            ema_26,
            macd,
            macd_signal,
            macd_histogram,
            adx,
            plus_di,
            minus_di,
        },
    ))
}

/// `a > b` when both are known
fn above(a: Option<f64>, b: Option<f64>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a > b)
}

/// Wilder's directional movement system
///
/// Returns `(adx, +di, -di)`. DI lines start at bar `period`, ADX at bar
/// `2 * period - 1`.
fn directional_movement(bars: &[Quote], period: usize) -> (Line, Line, Line) {
    let n = bars.len();
    let mut adx = vec![None; n];
    let mut plus_di = vec![None; n];
    let mut minus_di = vec![None; n];

    if period == 0 || n <= period {
        return (adx, plus_di, minus_di);
    }

    let p = period as f64;
    let (mut tr_s, mut plus_s, mut minus_s) = (0.0, 0.0, 0.0);
    let mut dx_window = Vec::with_capacity(period);
    let mut adx_prev: Option<f64> = None;

    for i in 1..n {
        let (cur, prev) = (&bars[i], &bars[i - 1]);
        let up = cur.high - prev.high;
        let down = prev.low - cur.low;
        let plus_dm = if up > down && up > 0.0 { up } else { 0.0 };
        let minus_dm = if down > up && down > 0.0 { down } else { 0.0 };
        let tr = (cur.high - cur.low)
            .max((cur.high - prev.close).abs())
            .max((cur.low - prev.close).abs());

        if i <= period {
            tr_s += tr;
            plus_s += plus_dm;
            minus_s += minus_dm;
            if i < period {
                continue;
            }
        } else {
            tr_s = tr_s - tr_s / p + tr;
            plus_s = plus_s - plus_s / p + plus_dm;
            minus_s = minus_s - minus_s / p + minus_dm;
        }

        let (pdi, mdi) = if tr_s > 0.0 {
            (100.0 * plus_s / tr_s, 100.0 * minus_s / tr_s)
        } else {
            (0.0, 0.0)
        };
        plus_di[i] = Some(pdi);
        minus_di[i] = Some(mdi);

        let dx = if pdi + mdi > 0.0 {
            100.0 * (pdi - mdi).abs() / (pdi + mdi)
        } else {
            0.0
        };

        adx_prev = match adx_prev {
            Some(prev) => Some((prev * (p - 1.0) + dx) / p),
            None => {
                dx_window.push(dx);
                (dx_window.len() == period).then(|| dx_window.iter().sum::<f64>() / p)
            },
        };
        adx[i] = adx_prev;
    }

    (adx, plus_di, minus_di)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::test_support::{short_series, year_series};

    #[test]
    fn test_moving_averages_warm_up() {
        let series = short_series(60);
        let (snapshot, lines) = compute(&series).unwrap();

        assert!(snapshot.sma_20.is_some());
        assert!(snapshot.sma_50.is_some());
        assert!(snapshot.sma_200.is_none());
        assert!(!snapshot.golden_cross);
        assert!(!snapshot.price_above_sma200);

        assert!(lines.sma_20[18].is_none());
        assert!(lines.sma_20[19].is_some());
    }

    #[test]
    fn test_sma_matches_manual_mean() {
        let series = year_series();
        let (snapshot, _) = compute(&series).unwrap();

        let closes = series.closes();
        let manual: f64 = closes[closes.len() - 20..].iter().sum::<f64>() / 20.0;
        assert!((snapshot.sma_20.unwrap() - manual).abs() < 1e-9);
    }

    #[test]
    fn test_uptrend_flags() {
        // The synthetic series drifts upward over the year.
        let (snapshot, _) = compute(&year_series()).unwrap();
        assert!(snapshot.golden_cross);
        assert!(snapshot.trend_strength.is_some());
        assert_eq!(
            snapshot.macd_bullish,
            snapshot.macd.unwrap() > snapshot.macd_signal.unwrap()
        );
    }

    #[test]
    fn test_directional_movement_ranges() {
        let series = year_series();
        let (adx, plus_di, minus_di) = directional_movement(&series.bars, 14);

        assert!(plus_di[13].is_none());
        assert!(plus_di[14].is_some());
        assert!(adx[26].is_none());
        assert!(adx[27].is_some());

        for value in adx.iter().chain(&plus_di).chain(&minus_di).flatten() {
            assert!((0.0..=100.0).contains(value));
        }
    }

    #[test]
    fn test_directional_movement_short_input() {
        let series = short_series(10);
        let (adx, plus_di, _) = directional_movement(&series.bars, 14);
        assert!(adx.iter().all(Option::is_none));
        assert!(plus_di.iter().all(Option::is_none));
    }
}
