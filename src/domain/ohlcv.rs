//! OHLCV bar representation.

use chrono::NaiveDateTime;

#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvBar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl OhlcvBar {
    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }
}

/// Indices of bars whose timestamp does not strictly increase on the last accepted bar.
pub fn out_of_order_indices(bars: &[OhlcvBar]) -> Vec<usize> {
    let mut skipped = Vec::new();
    let mut last: Option<NaiveDateTime> = None;
    for (i, bar) in bars.iter().enumerate() {
        match last {
            Some(ts) if bar.timestamp <= ts => skipped.push(i),
            _ => last = Some(bar.timestamp),
        }
    }
    skipped
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bar_at(day: u32, close: f64) -> OhlcvBar {
        OhlcvBar {
            timestamp: NaiveDate::from_ymd_opt(2024, 1, day)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            open: 100.0,
            high: 110.0,
            low: 90.0,
            close,
            volume: 50_000.0,
        }
    }

    #[test]
    fn true_range_hl_dominates() {
        let bar = bar_at(15, 105.0);
        assert!((bar.true_range(100.0) - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn true_range_gap_up() {
        let bar = bar_at(15, 105.0);
        // |110-70| = 40
        assert!((bar.true_range(70.0) - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn true_range_gap_down() {
        let bar = bar_at(15, 105.0);
        // |90-130| = 40
        assert!((bar.true_range(130.0) - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn ordered_series_has_no_anomalies() {
        let bars = vec![bar_at(1, 1.0), bar_at(2, 2.0), bar_at(3, 3.0)];
        assert!(out_of_order_indices(&bars).is_empty());
    }

    #[test]
    fn duplicate_and_backwards_timestamps_flagged() {
        let bars = vec![
            bar_at(1, 1.0),
            bar_at(2, 2.0),
            bar_at(2, 2.5),
            bar_at(1, 3.0),
            bar_at(3, 4.0),
        ];
        assert_eq!(out_of_order_indices(&bars), vec![2, 3]);
    }
}
