//! Buy/sell/hold signal aggregation

use crate::indicators::{IndicatorSet, RangeSignal, VolumeTrend};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
            Self::Hold => write!(f, "HOLD"),
        }
    }
}

/// Aggregated signal with the observations behind it
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TradingSignals {
    /// `None` when no indicator produced an observation
    pub overall: Option<Signal>,
    /// Share of observations agreeing with `overall`, in percent
    pub confidence: f64,
    pub bullish: Vec<String>,
    pub bearish: Vec<String>,
}

impl TradingSignals {
    pub fn total(&self) -> usize {
        self.bullish.len() + self.bearish.len()
    }
}

/// Collect observations and vote
pub fn generate(indicators: &IndicatorSet) -> TradingSignals {
    let mut bullish = Vec::new();
    let mut bearish = Vec::new();
    let trend = &indicators.trend;

    if trend.golden_cross {
        bullish.push("Golden Cross (SMA50 > SMA200)".to_string());
    }
    if trend.price_above_sma200 {
        bullish.push("Price above SMA200".to_string());
    }
    if trend.macd_bullish {
        bullish.push("MACD Bullish Crossover".to_string());
    }

    match indicators.momentum.rsi_signal {
        Some(RangeSignal::Oversold) => bullish.push("RSI Oversold (potential reversal)".to_string()),
        Some(RangeSignal::Overbought) => {
            bearish.push("RSI Overbought (potential reversal)".to_string());
        },
        _ => {},
    }

    match indicators.volume.volume_trend {
        Some(VolumeTrend::Accumulation) => bullish.push("Volume showing accumulation".to_string()),
        Some(VolumeTrend::Distribution) => bearish.push("Volume showing distribution".to_string()),
        None => {},
    }

    let (up, down) = (bullish.len(), bearish.len());
    let total = (up + down) as f64;
    let (overall, confidence) = if up + down == 0 {
        (None, 0.0)
    } else if up > down {
        (Some(Signal::Buy), up as f64 / total * 100.0)
    } else if down > up {
        (Some(Signal::Sell), down as f64 / total * 100.0)
    } else {
        (Some(Signal::Hold), 50.0)
    };

    TradingSignals {
        overall,
        confidence,
        bullish,
        bearish,
    }
}
