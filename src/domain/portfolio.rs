//! Cash accounting and equity tracking for a single instrument.
//!
//! Units are fractional. A long pays `units * price` plus commission on entry
//! and receives `units * price` minus commission on exit. A short escrows the
//! entry notional plus commission and settles the price difference on exit.

use chrono::NaiveDateTime;

use crate::domain::error::EngineError;
use crate::domain::position::Side;

pub const DEFAULT_INITIAL_CASH: f64 = 10_000.0;
pub const DEFAULT_COMMISSION: f64 = 0.001;

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub timestamp: NaiveDateTime,
    pub equity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Holding {
    pub side: Side,
    pub tag: String,
    pub units: f64,
    pub size: f64,
    pub entry_price: f64,
    pub entry_time: NaiveDateTime,
    pub entry_commission: f64,
}

impl Holding {
    /// Value returned to cash if the holding were closed at `price`, before commission.
    pub fn market_value(&self, price: f64) -> f64 {
        match self.side {
            Side::Long => self.units * price,
            Side::Short => self.units * (2.0 * self.entry_price - price),
        }
    }
}

/// A completed round trip with its realized profit.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeRecord {
    pub side: Side,
    pub tag: String,
    pub units: f64,
    pub size: f64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub entry_time: NaiveDateTime,
    pub exit_time: NaiveDateTime,
    pub commission: f64,
    pub pnl: f64,
}

impl TradeRecord {
    /// Profit relative to the capital committed at entry, as a percentage.
    pub fn return_pct(&self) -> f64 {
        let committed = self.units * self.entry_price;
        if committed > 0.0 {
            self.pnl / committed * 100.0
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub cash: f64,
    pub initial_capital: f64,
    pub commission: f64,
    pub holding: Option<Holding>,
    pub trades: Vec<TradeRecord>,
    pub equity_curve: Vec<EquityPoint>,
}

impl Portfolio {
    pub fn new(initial_capital: f64, commission: f64) -> Self {
        Portfolio {
            cash: initial_capital,
            initial_capital,
            commission,
            holding: None,
            trades: Vec::new(),
            equity_curve: Vec::new(),
        }
    }

    pub fn equity(&self, price: f64) -> f64 {
        self.cash + self.holding.as_ref().map_or(0.0, |h| h.market_value(price))
    }

    /// Commit `size` of current cash at `price`. Commission is carved out of the
    /// committed amount so the order never exceeds available cash.
    pub fn enter(
        &mut self,
        side: Side,
        tag: &str,
        size: f64,
        price: f64,
        time: NaiveDateTime,
    ) -> Result<&Holding, EngineError> {
        if let Some(h) = &self.holding {
            return Err(EngineError::InvalidTransition {
                from: match h.side {
                    Side::Long => "long",
                    Side::Short => "short",
                },
                action: "open",
            });
        }
        if !(price.is_finite() && price > 0.0) {
            return Err(EngineError::OrderRejected {
                reason: format!("cannot fill at price {price}"),
            });
        }
        if self.cash <= 0.0 {
            return Err(EngineError::OrderRejected {
                reason: format!("insufficient cash ({:.2})", self.cash),
            });
        }

        let committed = self.cash * size;
        let units = committed / (price * (1.0 + self.commission));
        let notional = units * price;
        let commission = notional * self.commission;

        self.cash -= notional + commission;

        Ok(self.holding.insert(Holding {
            side,
            tag: tag.to_string(),
            units,
            size,
            entry_price: price,
            entry_time: time,
            entry_commission: commission,
        }))
    }

    pub fn exit(&mut self, price: f64, time: NaiveDateTime) -> Result<&TradeRecord, EngineError> {
        if !(price.is_finite() && price > 0.0) {
            return Err(EngineError::OrderRejected {
                reason: format!("cannot fill at price {price}"),
            });
        }
        let holding = self.holding.take().ok_or(EngineError::InvalidTransition {
            from: "flat",
            action: "close",
        })?;

        let exit_value = holding.units * price;
        let exit_commission = exit_value * self.commission;
        self.cash += holding.market_value(price) - exit_commission;

        let direction = match holding.side {
            Side::Long => 1.0,
            Side::Short => -1.0,
        };
        let price_pnl = direction * holding.units * (price - holding.entry_price);
        let commission = holding.entry_commission + exit_commission;

        self.trades.push(TradeRecord {
            side: holding.side,
            tag: holding.tag,
            units: holding.units,
            size: holding.size,
            entry_price: holding.entry_price,
            exit_price: price,
            entry_time: holding.entry_time,
            exit_time: time,
            commission,
            pnl: price_pnl - commission,
        });
        // just pushed
        Ok(&self.trades[self.trades.len() - 1])
    }

    pub fn record_equity(&mut self, timestamp: NaiveDateTime, price: f64) {
        let equity = self.equity(price);
        self.equity_curve.push(EquityPoint { timestamp, equity });
    }

    pub fn final_equity(&self) -> f64 {
        self.equity_curve
            .last()
            .map_or(self.cash, |p| p.equity)
    }
}
