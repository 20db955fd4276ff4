//! Trade history output port trait.

use crate::domain::error::EngineError;
use crate::domain::portfolio::TradeRecord;

pub trait ReportPort {
    fn write_trades(&self, trades: &[TradeRecord], output_path: &str) -> Result<(), EngineError>;
}
