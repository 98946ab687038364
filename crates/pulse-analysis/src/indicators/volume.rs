//! Volume indicators: OBV, Chaikin Money Flow, MFI and rolling VWAP

use super::{Line, RangeSignal, latest, rolling_sum, run};
use crate::error::Result;
use crate::market::PriceSeries;
use serde::{Deserialize, Serialize};
use std::fmt;
use ta::indicators::{MoneyFlowIndex, OnBalanceVolume};

const CMF_PERIOD: usize = 20;
const MFI_PERIOD: usize = 14;
const VWAP_PERIOD: usize = 14;

/// Direction of money flow according to CMF
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolumeTrend {
    Accumulation,
    Distribution,
}

impl fmt::Display for VolumeTrend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accumulation => write!(f, "Accumulation"),
            Self::Distribution => write!(f, "Distribution"),
        }
    }
}

/// Latest volume readings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VolumeIndicators {
    pub obv: Option<f64>,
    pub cmf: Option<f64>,
    pub mfi: Option<f64>,
    pub vwap: Option<f64>,
    pub volume_trend: Option<VolumeTrend>,
    /// MFI above 80 / below 20
    pub mfi_signal: Option<RangeSignal>,
}

#[derive(Debug, Clone, Default)]
pub struct VolumeSeries {
    pub volume: Vec<f64>,
    pub obv: Line,
    pub cmf: Line,
    pub mfi: Line,
    pub vwap: Line,
}

pub fn compute(series: &PriceSeries) -> Result<(VolumeIndicators, VolumeSeries)> {
    let volume: Vec<f64> = series.bars.iter().map(|q| q.volume as f64).collect();

    let obv = run(OnBalanceVolume::new(), series.bars.iter(), 1);
    let mfi = run(MoneyFlowIndex::new(MFI_PERIOD)?, series.bars.iter(), MFI_PERIOD + 1);

    // Money flow volume: the close's position inside the bar's range, weighted by volume.
    let flow: Vec<f64> = series
        .bars
        .iter()
        .map(|q| {
            let range = q.high - q.low;
            if range > 0.0 {
                ((q.close - q.low) - (q.high - q.close)) / range * q.volume as f64
            } else {
                0.0
            }
        })
        .collect();
    let cmf = ratio(&rolling_sum(&flow, CMF_PERIOD), &rolling_sum(&volume, CMF_PERIOD));

    let weighted: Vec<f64> = series
        .bars
        .iter()
        .map(|q| q.typical_price() * q.volume as f64)
        .collect();
    let vwap = ratio(&rolling_sum(&weighted, VWAP_PERIOD), &rolling_sum(&volume, VWAP_PERIOD));

    let snapshot = VolumeIndicators {
        obv: latest(&obv),
        cmf: latest(&cmf),
        mfi: latest(&mfi),
        vwap: latest(&vwap),
        volume_trend: latest(&cmf).map(|v| {
            if v > 0.0 {
                VolumeTrend::Accumulation
            } else {
                VolumeTrend::Distribution
            }
        }),
        mfi_signal: latest(&mfi).map(|v| RangeSignal::classify(v, 20.0, 80.0)),
    };

    Ok((
        snapshot,
        VolumeSeries {
            volume,
            obv,
            cmf,
            mfi,
            vwap,
        },
    ))
}

/// Element-wise `numerator / denominator`, `None` where the denominator is zero
fn ratio(numerator: &[Option<f64>], denominator: &[Option<f64>]) -> Line {
    numerator
        .iter()
        .zip(denominator)
        .map(|(n, d)| match (n, d) {
            (Some(n), Some(d)) if *d != 0.0 => Some(n / d),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::test_support::{short_series, year_series};
    use crate::market::Quote;
    use chrono::{Duration, TimeZone, Utc};

    fn closing_at_highs(days: usize) -> PriceSeries {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 14, 30, 0).unwrap();
        let bars = (0..days)
            .map(|i| {
                let close = 50.0 + (i % 3) as f64;
                Quote {
                    timestamp: start + Duration::days(i as i64),
                    open: close - 1.0,
                    high: close,
                    low: close - 2.0,
                    close,
                    volume: 500,
                    adjclose: close,
                }
            })
            .collect();
        PriceSeries::new("ACC", bars)
    }

    #[test]
    fn test_closes_at_highs_accumulate() {
        let (snapshot, _) = compute(&closing_at_highs(30)).unwrap();
        assert!((snapshot.cmf.unwrap() - 1.0).abs() < 1e-9);
        assert_eq!(snapshot.volume_trend, Some(VolumeTrend::Accumulation));
    }

    #[test]
    fn test_vwap_within_price_range() {
        let series = year_series();
        let (snapshot, _) = compute(&series).unwrap();

        let window = &series.bars[series.len() - VWAP_PERIOD..];
        let low = window.iter().map(|q| q.low).fold(f64::MAX, f64::min);
        let high = window.iter().map(|q| q.high).fold(f64::MIN, f64::max);
        let vwap = snapshot.vwap.unwrap();
        assert!(vwap >= low && vwap <= high);

        let mfi = snapshot.mfi.unwrap();
        assert!((0.0..=100.0).contains(&mfi));
        assert!(snapshot.mfi_signal.is_some());
    }

    #[test]
    fn test_obv_available_immediately() {
        let (snapshot, lines) = compute(&short_series(3)).unwrap();
        assert!(snapshot.obv.is_some());
        assert!(snapshot.cmf.is_none());
        assert!(snapshot.volume_trend.is_none());
        assert_eq!(lines.volume.len(), 3);
    }

    #[test]
    fn test_ratio_guards_zero() {
        assert_eq!(
            ratio(&[Some(1.0), Some(2.0), None], &[Some(0.0), Some(4.0), Some(1.0)]),
            vec![None, Some(0.5), None]
        );
    }
}
