//! Volatility indicators: Bollinger Bands, ATR and Keltner Channel

use super::{Line, latest, run, warmed};
use crate::error::Result;
use crate::market::PriceSeries;
use serde::{Deserialize, Serialize};
use std::fmt;
use ta::Next;
use ta::indicators::{AverageTrueRange, BollingerBands, KeltnerChannel};

const BB_PERIOD: usize = 20;
const BB_MULTIPLIER: f64 = 2.0;
const ATR_PERIOD: usize = 14;
const KC_PERIOD: usize = 20;
const KC_MULTIPLIER: f64 = 2.0;

/// Where the last close sits relative to the Bollinger Bands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BandPosition {
    Upper,
    Middle,
    Lower,
}

/// Current band width against its average over the series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolatilityLevel {
    High,
    Low,
}

impl fmt::Display for BandPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Upper => write!(f, "Upper"),
            Self::Middle => write!(f, "Middle"),
            Self::Lower => write!(f, "Lower"),
        }
    }
}

impl fmt::Display for VolatilityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::High => write!(f, "High"),
            Self::Low => write!(f, "Low"),
        }
    }
}

/// Latest volatility readings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VolatilityIndicators {
    pub bb_upper: Option<f64>,
    pub bb_middle: Option<f64>,
    pub bb_lower: Option<f64>,
    /// Band width as a percentage of the middle band
    pub bb_width: Option<f64>,
    pub atr: Option<f64>,
    pub kc_upper: Option<f64>,
    pub kc_middle: Option<f64>,
    pub kc_lower: Option<f64>,
    pub bb_position: Option<BandPosition>,
    pub volatility_level: Option<VolatilityLevel>,
}

#[derive(Debug, Clone, Default)]
pub struct VolatilitySeries {
    pub bb_upper: Line,
    pub bb_middle: Line,
    pub bb_lower: Line,
    pub bb_width: Line,
    pub atr: Line,
    pub kc_upper: Line,
    pub kc_middle: Line,
    pub kc_lower: Line,
}

pub fn compute(series: &PriceSeries) -> Result<(VolatilityIndicators, VolatilitySeries)> {
    let closes = series.closes();

    let mut bb = BollingerBands::new(BB_PERIOD, BB_MULTIPLIER)?;
    let bands: Vec<_> = closes.iter().map(|&c| bb.next(c)).collect();
    let bb_upper = warmed(bands.iter().map(|b| b.upper), BB_PERIOD);
    let bb_middle = warmed(bands.iter().map(|b| b.average), BB_PERIOD);
    let bb_lower = warmed(bands.iter().map(|b| b.lower), BB_PERIOD);
    let bb_width = warmed(
        bands.iter().map(|b| (b.upper - b.lower) / b.average * 100.0),
        BB_PERIOD,
    );

    let atr = run(AverageTrueRange::new(ATR_PERIOD)?, series.bars.iter(), ATR_PERIOD);

    let mut kc = KeltnerChannel::new(KC_PERIOD, KC_MULTIPLIER)?;
    let channels: Vec<_> = series.bars.iter().map(|q| kc.next(q)).collect();
    let kc_upper = warmed(channels.iter().map(|c| c.upper), KC_PERIOD);
    let kc_middle = warmed(channels.iter().map(|c| c.average), KC_PERIOD);
    let kc_lower = warmed(channels.iter().map(|c| c.lower), KC_PERIOD);

    let price = closes.last().copied();
    let bb_position = match (price, latest(&bb_upper), latest(&bb_lower)) {
        (Some(p), Some(upper), _) if p > upper => Some(BandPosition::Upper),
        (Some(p), _, Some(lower)) if p < lower => Some(BandPosition::Lower),
        (Some(_), Some(_), Some(_)) => Some(BandPosition::Middle),
        _ => None,
    };

    let widths: Vec<f64> = bb_width.iter().flatten().copied().collect();
    let volatility_level = latest(&bb_width).map(|current| {
        let mean = widths.iter().sum::<f64>() / widths.len() as f64;
        if current > mean {
            VolatilityLevel::High
        } else {
            VolatilityLevel::Low
        }
    });

    let snapshot = VolatilityIndicators {
        bb_upper: latest(&bb_upper),
        bb_middle: latest(&bb_middle),
        bb_lower: latest(&bb_lower),
        bb_width: latest(&bb_width),
        atr: latest(&atr),
        kc_upper: latest(&kc_upper),
        kc_middle: latest(&kc_middle),
        kc_lower: latest(&kc_lower),
        bb_position,
        volatility_level,
    };

    Ok((
        snapshot,
        VolatilitySeries {
            bb_upper,
            bb_middle,
            bb_lower,
            bb_width,
            atr,
            kc_upper,
            kc_middle,
            kc_lower,
        },
    ))
}
