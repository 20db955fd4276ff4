//! ADX (Average Directional Index) indicator.
//!
//! Directional movement per bar:
//! - +DM = high - prev_high when it exceeds prev_low - low and is positive, else 0
//! - -DM = prev_low - low when it exceeds high - prev_high and is positive, else 0
//!
//! TR, +DM and -DM are Wilder-smoothed over n bars (seeded with their sum),
//! DX = 100 * |DI+ - DI-| / (DI+ + DI-), and ADX is the Wilder average of DX
//! seeded with the mean of the first n DX values.
//!
//! Warmup: DX is defined from bar n, ADX from bar 2n - 1.

use crate::domain::indicator::Series;
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_adx(bars: &[OhlcvBar], period: usize) -> Series {
    let mut values = vec![None; bars.len()];
    if period == 0 || bars.len() <= period {
        return values;
    }

    let n = period as f64;
    let mut tr = vec![0.0; bars.len()];
    let mut plus_dm = vec![0.0; bars.len()];
    let mut minus_dm = vec![0.0; bars.len()];

    for i in 1..bars.len() {
        let up = bars[i].high - bars[i - 1].high;
        let down = bars[i - 1].low - bars[i].low;
        tr[i] = bars[i].true_range(bars[i - 1].close);
        plus_dm[i] = if up > down && up > 0.0 { up } else { 0.0 };
        minus_dm[i] = if down > up && down > 0.0 { down } else { 0.0 };
    }

    let mut smooth_tr: f64 = tr[1..=period].iter().sum();
    let mut smooth_plus: f64 = plus_dm[1..=period].iter().sum();
    let mut smooth_minus: f64 = minus_dm[1..=period].iter().sum();

    let mut dx_sum = 0.0;
    let mut adx = 0.0;

    for i in period..bars.len() {
        if i > period {
            smooth_tr = smooth_tr - smooth_tr / n + tr[i];
            smooth_plus = smooth_plus - smooth_plus / n + plus_dm[i];
            smooth_minus = smooth_minus - smooth_minus / n + minus_dm[i];
        }

        let dx = directional_index(smooth_tr, smooth_plus, smooth_minus);
        let seen = i - period + 1;

        if seen < period {
            dx_sum += dx;
        } else if seen == period {
            dx_sum += dx;
            adx = dx_sum / n;
            values[i] = Some(adx);
        } else {
            adx = (adx * (n - 1.0) + dx) / n;
            values[i] = Some(adx);
        }
    }

    values
}

fn directional_index(smooth_tr: f64, smooth_plus: f64, smooth_minus: f64) -> f64 {
    if smooth_tr == 0.0 {
        return 0.0;
    }
    let di_plus = 100.0 * smooth_plus / smooth_tr;
    let di_minus = 100.0 * smooth_minus / smooth_tr;
    let di_sum = di_plus + di_minus;
    if di_sum == 0.0 {
        0.0
    } else {
        100.0 * (di_plus - di_minus).abs() / di_sum
    }
}
