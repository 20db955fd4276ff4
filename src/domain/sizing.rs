//! Position sizing shared by every strategy variant.

use crate::domain::strategy::StrategyConfig;

pub const MIN_SIZE_FRACTION: f64 = 0.01;
pub const MAX_SIZE_FRACTION: f64 = 1.0;

/// Fraction of equity to commit per trade: `position_size_pct / 100`,
/// clamped to [0.01, 1.0].
pub fn size_fraction(config: &StrategyConfig) -> f64 {
    fraction_from_pct(config.position_size_pct)
}

pub fn fraction_from_pct(pct: f64) -> f64 {
    let fraction = pct / 100.0;
    if fraction.is_nan() {
        return MIN_SIZE_FRACTION;
    }
    fraction.clamp(MIN_SIZE_FRACTION, MAX_SIZE_FRACTION)
}
