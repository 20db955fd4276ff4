//! Bollinger Bands indicator.
//!
//! - Middle: Simple Moving Average (SMA) over n periods
//! - Upper: Middle + (multiplier × StdDev)
//! - Lower: Middle - (multiplier × StdDev)
//! - Width: (Upper - Lower) / Middle × 100
//!
//! Where StdDev is population standard deviation (divides by N, not N-1).
//!
//! Default parameters: period=20, multiplier=2.0
//! Warmup: first (period-1) bars are undefined.

use crate::domain::indicator::Series;
use crate::domain::ohlcv::OhlcvBar;

#[derive(Debug, Clone, PartialEq)]
pub struct BollingerBands {
    pub upper: Series,
    pub middle: Series,
    pub lower: Series,
    pub width: Series,
}

pub fn calculate_bollinger(bars: &[OhlcvBar], period: usize, mult: f64) -> BollingerBands {
    let mut bands = BollingerBands {
        upper: Vec::with_capacity(bars.len()),
        middle: Vec::with_capacity(bars.len()),
        lower: Vec::with_capacity(bars.len()),
        width: Vec::with_capacity(bars.len()),
    };

    for i in 0..bars.len() {
        if period == 0 || i + 1 < period {
            bands.upper.push(None);
            bands.middle.push(None);
            bands.lower.push(None);
            bands.width.push(None);
            continue;
        }

        let window = &bars[i + 1 - period..=i];
        let middle: f64 = window.iter().map(|b| b.close).sum::<f64>() / period as f64;
        let variance: f64 = window
            .iter()
            .map(|b| {
                let diff = b.close - middle;
                diff * diff
            })
            .sum::<f64>()
            / period as f64;

        let stddev = variance.sqrt();
        let upper = middle + mult * stddev;
        let lower = middle - mult * stddev;
        let width = if middle != 0.0 {
            Some((upper - lower) / middle * 100.0)
        } else {
            None
        };

        bands.upper.push(Some(upper));
        bands.middle.push(Some(middle));
        bands.lower.push(Some(lower));
        bands.width.push(width);
    }

    bands
}
