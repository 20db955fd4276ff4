//! Simulated order runtime: fills every order at the bar close.

use crate::domain::error::EngineError;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::portfolio::Portfolio;
use crate::domain::position::Side;
use crate::ports::order_port::{Fill, OrderPort};

pub struct PaperBroker {
    portfolio: Portfolio,
}

impl PaperBroker {
    pub fn new(initial_cash: f64, commission: f64) -> Self {
        Self {
            portfolio: Portfolio::new(initial_cash, commission),
        }
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    pub fn into_portfolio(self) -> Portfolio {
        self.portfolio
    }

    fn open(
        &mut self,
        side: Side,
        size: f64,
        tag: &str,
        bar: &OhlcvBar,
    ) -> Result<Fill, EngineError> {
        let holding = self
            .portfolio
            .enter(side, tag, size, bar.close, bar.timestamp)?;
        Ok(Fill {
            price: holding.entry_price,
            timestamp: holding.entry_time,
        })
    }
}

impl OrderPort for PaperBroker {
    fn open_long(&mut self, size: f64, tag: &str, bar: &OhlcvBar) -> Result<Fill, EngineError> {
        self.open(Side::Long, size, tag, bar)
    }

    fn open_short(&mut self, size: f64, tag: &str, bar: &OhlcvBar) -> Result<Fill, EngineError> {
        self.open(Side::Short, size, tag, bar)
    }

    fn close_position(&mut self, bar: &OhlcvBar) -> Result<Fill, EngineError> {
        let trade = self.portfolio.exit(bar.close, bar.timestamp)?;
        Ok(Fill {
            price: trade.exit_price,
            timestamp: trade.exit_time,
        })
    }

    fn mark(&mut self, bar: &OhlcvBar) {
        self.portfolio.record_equity(bar.timestamp, bar.close);
    }
}
