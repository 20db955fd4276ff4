//! Backtest run parameters and the bundled result of one run.

use crate::domain::execution::RunReport;
use crate::domain::metrics::Metrics;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::portfolio::{Portfolio, DEFAULT_COMMISSION, DEFAULT_INITIAL_CASH};

/// The `[backtest]` section of a run config.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub data: Option<String>,
    pub initial_cash: f64,
    pub commission: f64,
    pub risk_free_rate: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            data: None,
            initial_cash: DEFAULT_INITIAL_CASH,
            commission: DEFAULT_COMMISSION,
            risk_free_rate: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub report: RunReport,
    pub portfolio: Portfolio,
    pub metrics: Metrics,
}

impl BacktestResult {
    pub fn new(
        report: RunReport,
        portfolio: Portfolio,
        bars: &[OhlcvBar],
        risk_free_rate: f64,
    ) -> Self {
        let metrics = Metrics::compute(&portfolio, bars, risk_free_rate);
        BacktestResult {
            report,
            portfolio,
            metrics,
        }
    }
}
