//! MACD (Moving Average Convergence Divergence) indicator.
//!
//! MACD Line = EMA(fast) - EMA(slow)
//! Signal Line = EMA(signal) of MACD Line
//!
//! Default parameters: fast=12, slow=26, signal=9
//! Warmup: the line is defined from bar max(fast, slow) - 1, the signal
//! from bar max(fast, slow) - 1 + signal - 1.

use crate::domain::indicator::Series;
use crate::domain::indicator::ema::{calculate_ema, ema_of};
use crate::domain::ohlcv::OhlcvBar;

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

#[derive(Debug, Clone, PartialEq)]
pub struct MacdLines {
    pub line: Series,
    pub signal: Series,
}

pub fn calculate_macd(
    bars: &[OhlcvBar],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> MacdLines {
    if fast == 0 || slow == 0 {
        return MacdLines {
            line: vec![None; bars.len()],
            signal: vec![None; bars.len()],
        };
    }

    let ema_fast = calculate_ema(bars, fast);
    let ema_slow = calculate_ema(bars, slow);

    let line: Series = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(f, s)| Some((*f)? - (*s)?))
        .collect();

    let first_defined = fast.max(slow) - 1;
    let mut signal = vec![None; bars.len()];
    if bars.len() > first_defined {
        let defined: Vec<f64> = line[first_defined..].iter().flatten().copied().collect();
        for (offset, value) in ema_of(&defined, signal_period).into_iter().enumerate() {
            signal[first_defined + offset] = value;
        }
    }

    MacdLines { line, signal }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::make_bars;

    fn rising(count: usize) -> Vec<OhlcvBar> {
        let prices: Vec<f64> = (0..count).map(|i| 100.0 + i as f64).collect();
        make_bars(&prices)
    }

    #[test]
    fn macd_warmup_default() {
        let lines = calculate_macd(&rising(40), DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL);

        for i in 0..DEFAULT_SLOW - 1 {
            assert!(lines.line[i].is_none(), "line index {} should be undefined", i);
        }
        assert!(lines.line[DEFAULT_SLOW - 1].is_some());

        let signal_warmup = DEFAULT_SLOW - 1 + DEFAULT_SIGNAL - 1;
        assert!(lines.signal[signal_warmup - 1].is_none());
        assert!(lines.signal[signal_warmup].is_some());
    }

    #[test]
    fn macd_line_is_ema_fast_minus_ema_slow() {
        let bars = make_bars(&[10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0, 100.0]);
        let lines = calculate_macd(&bars, 3, 5, 2);

        let ema_fast = calculate_ema(&bars, 3);
        let ema_slow = calculate_ema(&bars, 5);

        for i in 4..bars.len() {
            let expected = ema_fast[i].unwrap() - ema_slow[i].unwrap();
            assert!(
                (lines.line[i].unwrap() - expected).abs() < f64::EPSILON,
                "MACD line mismatch at index {}",
                i
            );
        }
    }

    #[test]
    fn macd_rising_prices_positive_line() {
        let lines = calculate_macd(&rising(40), 12, 26, 9);
        assert!(lines.line[39].unwrap() > 0.0);
    }

    #[test]
    fn macd_empty_bars() {
        let lines = calculate_macd(&[], DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL);
        assert!(lines.line.is_empty());
        assert!(lines.signal.is_empty());
    }

    #[test]
    fn macd_zero_period() {
        let bars = make_bars(&[100.0, 101.0, 102.0]);
        let lines = calculate_macd(&bars, 0, 26, 9);
        assert_eq!(lines.line, vec![None, None, None]);

        let lines = calculate_macd(&bars, 2, 3, 0);
        assert!(lines.line[2].is_some());
        assert_eq!(lines.signal, vec![None, None, None]);
    }

    #[test]
    fn macd_custom_parameters() {
        let lines = calculate_macd(&rising(20), 5, 10, 3);
        let warmup = 10 - 1 + 3 - 1;
        assert!(lines.signal[warmup - 1].is_none());
        assert!(lines.signal[warmup].is_some());
    }
}
