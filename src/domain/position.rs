//! Position tracking and exit rules.
//!
//! A run holds at most one open position. `PositionTracker` is the only owner
//! and enforces the flat → long/short → flat transitions.

use chrono::NaiveDateTime;
use std::fmt;

use crate::domain::error::EngineError;
use crate::domain::indicator::{IndicatorKey, IndicatorSet};
use crate::domain::strategy::StrategyConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn tag(self) -> &'static str {
        match self {
            Side::Long => "Long Entry",
            Side::Short => "Short Entry",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Side::Long => "long",
            Side::Short => "short",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub side: Side,
    pub entry_price: f64,
    pub entry_time: NaiveDateTime,
    pub size: f64,
}

impl Position {
    pub fn is_long(&self) -> bool {
        self.side == Side::Long
    }

    pub fn is_short(&self) -> bool {
        self.side == Side::Short
    }

    /// Price move from entry in the position's favour, as a percentage.
    pub fn return_pct(&self, price: f64) -> f64 {
        let raw = (price - self.entry_price) / self.entry_price * 100.0;
        match self.side {
            Side::Long => raw,
            Side::Short => -raw,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClosedTrade {
    pub side: Side,
    pub size: f64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub entry_time: NaiveDateTime,
    pub exit_time: NaiveDateTime,
    pub return_pct: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionTracker {
    current: Option<Position>,
}

impl PositionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> Option<&Position> {
        self.current.as_ref()
    }

    pub fn is_flat(&self) -> bool {
        self.current.is_none()
    }

    pub fn state(&self) -> &'static str {
        match &self.current {
            None => "flat",
            Some(p) if p.is_long() => "long",
            Some(_) => "short",
        }
    }

    pub fn open(
        &mut self,
        side: Side,
        price: f64,
        size: f64,
        time: NaiveDateTime,
    ) -> Result<&Position, EngineError> {
        if !self.is_flat() {
            return Err(EngineError::InvalidTransition {
                from: self.state(),
                action: "open",
            });
        }
        Ok(self.current.insert(Position {
            side,
            entry_price: price,
            entry_time: time,
            size,
        }))
    }

    pub fn close(&mut self, price: f64, time: NaiveDateTime) -> Result<ClosedTrade, EngineError> {
        let position = self.current.take().ok_or(EngineError::InvalidTransition {
            from: "flat",
            action: "close",
        })?;

        Ok(ClosedTrade {
            side: position.side,
            size: position.size,
            entry_price: position.entry_price,
            exit_price: price,
            entry_time: position.entry_time,
            exit_time: time,
            return_pct: position.return_pct(price),
        })
    }
}

/// Exit rule families shared across variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitRule {
    /// Long closes above the upper band with an overbought oscillator;
    /// short closes below the lower band with an oversold oscillator.
    IndicatorReversal,
    /// Close once price moves a fixed percentage from entry either way.
    Bracket,
}

/// Whether `position` should be closed at `price` on bar `index`.
pub fn evaluate_close(
    price: f64,
    indicators: &IndicatorSet,
    index: usize,
    position: &Position,
    config: &StrategyConfig,
) -> bool {
    match config.variant.rules().exit {
        ExitRule::IndicatorReversal => {
            reversal_exit(price, indicators, index, position, config).unwrap_or(false)
        }
        ExitRule::Bracket => {
            let (take_profit, stop_loss) = config.bracket_fractions();
            bracket_exit(price, position, take_profit, stop_loss)
        }
    }
}

fn reversal_exit(
    price: f64,
    indicators: &IndicatorSet,
    index: usize,
    position: &Position,
    config: &StrategyConfig,
) -> Option<bool> {
    let rsi = indicators.value(IndicatorKey::Rsi, index)?;
    let params = &config.indicators;
    Some(match position.side {
        Side::Long => {
            price > indicators.value(IndicatorKey::BbUpper, index)? && rsi > params.rsi_overbought
        }
        Side::Short => {
            price < indicators.value(IndicatorKey::BbLower, index)? && rsi < params.rsi_oversold
        }
    })
}

pub fn bracket_exit(price: f64, position: &Position, take_profit: f64, stop_loss: f64) -> bool {
    let entry = position.entry_price;
    match position.side {
        Side::Long => price >= entry * (1.0 + take_profit) || price <= entry * (1.0 - stop_loss),
        Side::Short => price <= entry * (1.0 - take_profit) || price >= entry * (1.0 + stop_loss),
    }
}
