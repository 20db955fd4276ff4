//! Data access port trait.

use crate::domain::error::EngineError;
use crate::domain::ohlcv::OhlcvBar;

pub trait DataPort {
    /// Load the full bar series named by `source`, in file order.
    fn fetch_bars(&self, source: &str) -> Result<Vec<OhlcvBar>, EngineError>;
}
