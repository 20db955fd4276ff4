//! Order runtime port trait.

use crate::domain::error::EngineError;
use crate::domain::ohlcv::OhlcvBar;
use chrono::NaiveDateTime;

/// Realized price and time of an executed order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fill {
    pub price: f64,
    pub timestamp: NaiveDateTime,
}

/// Receives the order actions emitted by the execution loop.
///
/// `size` is a fraction of equity in [0.01, 1.0]. An implementation may refuse
/// an order with `EngineError::OrderRejected`, which the loop logs and skips.
pub trait OrderPort {
    fn open_long(&mut self, size: f64, tag: &str, bar: &OhlcvBar) -> Result<Fill, EngineError>;

    fn open_short(&mut self, size: f64, tag: &str, bar: &OhlcvBar) -> Result<Fill, EngineError>;

    fn close_position(&mut self, bar: &OhlcvBar) -> Result<Fill, EngineError>;

    /// Called once per accepted bar after any orders for that bar.
    fn mark(&mut self, _bar: &OhlcvBar) {}
}
