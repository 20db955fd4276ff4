//! Per-bar execution loop.
//!
//! For each accepted bar, in order:
//! 1. When positioned, evaluate the exit rule and close through the order port
//! 2. When flat, evaluate the entry rule and open through the order port
//! 3. Mark the bar on the order port
//!
//! A close on a bar never re-enters the same side on that bar. Bars whose
//! timestamp does not advance are skipped with a warning, and crossovers on the
//! next accepted bar compare against the last accepted one. Rejected orders are
//! logged and leave the position unchanged; an invalid position transition
//! aborts the run.

use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

use crate::domain::error::EngineError;
use crate::domain::indicator::{compute_indicators, IndicatorSet};
use crate::domain::ohlcv::{out_of_order_indices, OhlcvBar};
use crate::domain::position::{evaluate_close, ClosedTrade, Position, PositionTracker, Side};
use crate::domain::rule_eval::{decide_entry_after, Decision};
use crate::domain::sizing::size_fraction;
use crate::domain::strategy::StrategyConfig;
use crate::ports::order_port::{Fill, OrderPort};

/// What happened on one accepted bar.
#[derive(Debug, Clone, PartialEq)]
pub struct BarStep {
    pub index: usize,
    pub timestamp: NaiveDateTime,
    pub exit: Option<ClosedTrade>,
    pub entry: Decision,
}

impl BarStep {
    /// One decision per bar; a close takes precedence over an entry on the same bar.
    pub fn decision(&self) -> Decision {
        if self.exit.is_some() {
            Decision::ClosePosition
        } else {
            self.entry
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub strategy_id: String,
    pub steps: Vec<BarStep>,
    pub trades: Vec<ClosedTrade>,
    pub open_position: Option<Position>,
    pub skipped_bars: Vec<usize>,
    pub rejected_orders: usize,
}

impl RunReport {
    pub fn decision_sequence(&self) -> Vec<Decision> {
        self.steps.iter().map(BarStep::decision).collect()
    }

    /// Every action taken, including an entry on the same bar as a close.
    pub fn actions(&self) -> Vec<(usize, Decision)> {
        let mut out = Vec::new();
        for step in &self.steps {
            if step.exit.is_some() {
                out.push((step.index, Decision::ClosePosition));
            }
            if step.entry != Decision::NoOp {
                out.push((step.index, step.entry));
            }
        }
        out
    }
}

/// Compute the indicators the configured variant needs, then run the loop.
pub fn backtest(
    bars: &[OhlcvBar],
    config: &StrategyConfig,
    orders: &mut dyn OrderPort,
) -> Result<RunReport, EngineError> {
    let indicators = compute_indicators(
        bars,
        &config.indicators,
        config.variant.required_indicators(),
    );
    run(bars, &indicators, config, orders)
}

pub fn run(
    bars: &[OhlcvBar],
    indicators: &IndicatorSet,
    config: &StrategyConfig,
    orders: &mut dyn OrderPort,
) -> Result<RunReport, EngineError> {
    if indicators.len() != bars.len() {
        return Err(EngineError::IndicatorLength {
            key: "indicator set".to_string(),
            expected: bars.len(),
            actual: indicators.len(),
        });
    }
    if let Some(missing) = config
        .variant
        .required_indicators()
        .iter()
        .find(|key| !indicators.contains(**key))
    {
        return Err(EngineError::Data {
            reason: format!("indicator {missing} required by {} was not computed", config.variant),
        });
    }

    info!(
        strategy = %config.id,
        variant = %config.variant,
        trade_mode = %config.trade_mode,
        bars = bars.len(),
        "starting run"
    );

    let skipped_bars = out_of_order_indices(bars);
    let size = size_fraction(config);
    let mut tracker = PositionTracker::new();
    let mut steps = Vec::with_capacity(bars.len());
    let mut trades = Vec::new();
    let mut rejected_orders = 0usize;
    let mut previous: Option<usize> = None;

    for (index, bar) in bars.iter().enumerate() {
        if skipped_bars.binary_search(&index).is_ok() {
            warn!(index, timestamp = %bar.timestamp, "timestamp does not advance, skipping bar");
            continue;
        }

        let mut exit = None;
        let should_close = tracker
            .position()
            .is_some_and(|p| evaluate_close(bar.close, indicators, index, p, config));
        if should_close {
            match accept(orders.close_position(bar), index, "close")? {
                Some(fill) => {
                    let trade = tracker.close(fill.price, fill.timestamp)?;
                    debug!(index, side = %trade.side, price = fill.price, "closed position");
                    exit = Some(trade);
                }
                None => rejected_orders += 1,
            }
        }

        let mut entry = decide_entry_after(
            index,
            previous,
            bar.close,
            indicators,
            tracker.position(),
            config,
        );
        if let Some(side) = entry.entry_side() {
            if exit.as_ref().is_some_and(|t| t.side == side) {
                debug!(index, %side, "dropping same-side entry on the bar that closed it");
                entry = Decision::NoOp;
            } else {
                let result = match side {
                    Side::Long => orders.open_long(size, side.tag(), bar),
                    Side::Short => orders.open_short(size, side.tag(), bar),
                };
                match accept(result, index, "open")? {
                    Some(fill) => {
                        tracker.open(side, fill.price, size, fill.timestamp)?;
                        debug!(index, %side, price = fill.price, size, "opened position");
                    }
                    None => {
                        rejected_orders += 1;
                        entry = Decision::NoOp;
                    }
                }
            }
        }

        orders.mark(bar);
        previous = Some(index);

        if let Some(trade) = &exit {
            trades.push(trade.clone());
        }
        steps.push(BarStep {
            index,
            timestamp: bar.timestamp,
            exit,
            entry,
        });
    }

    let open_position = tracker.position().cloned();
    info!(
        strategy = %config.id,
        trades = trades.len(),
        skipped = skipped_bars.len(),
        rejected = rejected_orders,
        open = open_position.is_some(),
        "run finished"
    );

    Ok(RunReport {
        strategy_id: config.id.clone(),
        steps,
        trades,
        open_position,
        skipped_bars,
        rejected_orders,
    })
}

/// Rejections become `None`; every other error aborts the run.
fn accept(
    result: Result<Fill, EngineError>,
    index: usize,
    action: &str,
) -> Result<Option<Fill>, EngineError> {
    match result {
        Ok(fill) => Ok(Some(fill)),
        Err(EngineError::OrderRejected { reason }) => {
            warn!(index, action, %reason, "order rejected");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
