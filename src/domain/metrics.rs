//! Performance metrics for one run.
//!
//! Returns and ratios are fractions (0.10 = 10%). Sharpe and Sortino are
//! annualized assuming one bar per trading day. CAGR uses calendar time
//! between the first and last equity points.

use super::ohlcv::OhlcvBar;
use super::portfolio::{EquityPoint, Portfolio};

const TRADING_DAYS_PER_YEAR: f64 = 252.0;
const DAYS_PER_YEAR: f64 = 365.25;

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub final_equity: f64,
    pub net_profit: f64,
    pub total_return: f64,
    pub cagr: f64,
    pub buy_and_hold_return: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub max_drawdown: f64,
    pub max_drawdown_duration: usize,
    pub total_trades: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub avg_trade_duration_days: f64,
}

impl Metrics {
    pub fn compute(portfolio: &Portfolio, bars: &[OhlcvBar], risk_free_rate: f64) -> Self {
        let initial = portfolio.initial_capital;
        let final_equity = portfolio.final_equity();
        let net_profit = final_equity - initial;
        let total_return = if initial > 0.0 { net_profit / initial } else { 0.0 };

        let (max_drawdown, max_drawdown_duration) = compute_drawdown(&portfolio.equity_curve);
        let daily_rf = risk_free_rate / TRADING_DAYS_PER_YEAR;
        let (sharpe_ratio, sortino_ratio) =
            compute_risk_adjusted(&portfolio.equity_curve, daily_rf);

        let mut trades_won = 0usize;
        let mut trades_lost = 0usize;
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;
        let mut largest_win = 0.0_f64;
        let mut largest_loss = 0.0_f64;
        let mut total_seconds = 0i64;

        for trade in &portfolio.trades {
            let pnl = trade.pnl;
            if pnl > 0.0 {
                trades_won += 1;
                total_wins += pnl;
                largest_win = largest_win.max(pnl);
            } else if pnl < 0.0 {
                trades_lost += 1;
                total_losses += pnl.abs();
                largest_loss = largest_loss.max(pnl.abs());
            }
            total_seconds += (trade.exit_time - trade.entry_time).num_seconds();
        }

        let total_trades = portfolio.trades.len();
        let per_trade = |total: f64, n: usize| if n > 0 { total / n as f64 } else { 0.0 };

        let profit_factor = if total_losses > 0.0 {
            total_wins / total_losses
        } else if total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        Metrics {
            final_equity,
            net_profit,
            total_return,
            cagr: compute_cagr(&portfolio.equity_curve),
            buy_and_hold_return: buy_and_hold_return(bars),
            sharpe_ratio,
            sortino_ratio,
            max_drawdown,
            max_drawdown_duration,
            total_trades,
            trades_won,
            trades_lost,
            win_rate: per_trade(trades_won as f64, total_trades),
            profit_factor,
            avg_win: per_trade(total_wins, trades_won),
            avg_loss: per_trade(total_losses, trades_lost),
            largest_win,
            largest_loss,
            avg_trade_duration_days: per_trade(total_seconds as f64 / 86_400.0, total_trades),
        }
    }
}

/// Close-to-close return over the whole series.
pub fn buy_and_hold_return(bars: &[OhlcvBar]) -> f64 {
    match (bars.first(), bars.last()) {
        (Some(first), Some(last)) if first.close > 0.0 => (last.close - first.close) / first.close,
        _ => 0.0,
    }
}

/// Compound annual growth rate over the span of the equity curve.
/// Zero when the span is empty or equity is not positive at both ends.
fn compute_cagr(equity_curve: &[EquityPoint]) -> f64 {
    let (Some(first), Some(last)) = (equity_curve.first(), equity_curve.last()) else {
        return 0.0;
    };
    let years = (last.timestamp - first.timestamp).num_seconds() as f64 / 86_400.0 / DAYS_PER_YEAR;
    if years <= 0.0 || first.equity <= 0.0 || last.equity <= 0.0 {
        return 0.0;
    }
    (last.equity / first.equity).powf(1.0 / years) - 1.0
}

/// Largest peak-to-trough fall as a fraction, and the longest run of bars spent below a peak.
fn compute_drawdown(equity_curve: &[EquityPoint]) -> (f64, usize) {
    let Some(first) = equity_curve.first() else {
        return (0.0, 0);
    };

    let mut peak = first.equity;
    let mut max_dd = 0.0_f64;
    let mut max_duration = 0usize;
    let mut duration = 0usize;

    for point in equity_curve {
        if point.equity >= peak {
            peak = point.equity;
            duration = 0;
        } else if peak > 0.0 {
            max_dd = max_dd.max((peak - point.equity) / peak);
            duration += 1;
            max_duration = max_duration.max(duration);
        }
    }

    (max_dd, max_duration)
}

fn compute_risk_adjusted(equity_curve: &[EquityPoint], daily_rf: f64) -> (f64, f64) {
    if equity_curve.len() < 2 {
        return (0.0, 0.0);
    }

    let returns: Vec<f64> = equity_curve
        .windows(2)
        .map(|w| {
            let prev = w[0].equity;
            if prev > 0.0 {
                (w[1].equity - prev) / prev
            } else {
                0.0
            }
        })
        .collect();

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let stddev = (returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n).sqrt();
    let excess = mean - daily_rf;

    let sharpe = if stddev > 0.0 {
        excess / stddev * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    };

    let downside = (returns
        .iter()
        .filter(|&&r| r < daily_rf)
        .map(|&r| (r - daily_rf).powi(2))
        .sum::<f64>()
        / n)
        .sqrt();

    let sortino = if downside > 0.0 {
        excess / downside * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    };

    (sharpe, sortino)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::make_bars;
    use crate::domain::portfolio::TradeRecord;
    use crate::domain::position::Side;
    use approx::assert_relative_eq;
    use chrono::{NaiveDate, NaiveDateTime};

    fn day(offset: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + chrono::Duration::days(offset)
    }

    fn make_equity_curve(values: &[f64]) -> Vec<EquityPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, &equity)| EquityPoint {
                timestamp: day(i as i64),
                equity,
            })
            .collect()
    }

    fn make_portfolio(equity: &[f64], trades: Vec<TradeRecord>) -> Portfolio {
        let initial = equity.first().copied().unwrap_or(10_000.0);
        let mut portfolio = Portfolio::new(initial, 0.0);
        portfolio.trades = trades;
        portfolio.equity_curve = make_equity_curve(equity);
        portfolio
    }

    fn make_trade(pnl: f64, days: i64) -> TradeRecord {
        TradeRecord {
            side: Side::Long,
            tag: "Long Entry".into(),
            units: 10.0,
            size: 0.5,
            entry_price: 100.0,
            exit_price: 100.0 + pnl / 10.0,
            entry_time: day(0),
            exit_time: day(days),
            commission: 0.0,
            pnl,
        }
    }

    #[test]
    fn metrics_empty_portfolio() {
        let portfolio = Portfolio::new(10_000.0, 0.001);
        let metrics = Metrics::compute(&portfolio, &[], 0.0);
        assert_relative_eq!(metrics.final_equity, 10_000.0);
        assert_relative_eq!(metrics.total_return, 0.0);
        assert_eq!(metrics.total_trades, 0);
        assert_relative_eq!(metrics.profit_factor, 0.0);
        assert_relative_eq!(metrics.buy_and_hold_return, 0.0);
    }

    #[test]
    fn net_profit_and_return() {
        let portfolio = make_portfolio(&[10_000.0, 10_500.0, 11_000.0], vec![]);
        let metrics = Metrics::compute(&portfolio, &[], 0.0);
        assert_relative_eq!(metrics.net_profit, 1_000.0);
        assert_relative_eq!(metrics.total_return, 0.10);
    }

    #[test]
    fn trade_statistics() {
        let trades = vec![
            make_trade(100.0, 5),
            make_trade(-50.0, 3),
            make_trade(200.0, 10),
            make_trade(0.0, 2),
        ];
        let portfolio = make_portfolio(&[10_000.0, 10_250.0], trades);
        let metrics = Metrics::compute(&portfolio, &[], 0.0);

        assert_eq!(metrics.total_trades, 4);
        assert_eq!(metrics.trades_won, 2);
        assert_eq!(metrics.trades_lost, 1);
        assert_relative_eq!(metrics.win_rate, 0.5);
        assert_relative_eq!(metrics.profit_factor, 6.0);
        assert_relative_eq!(metrics.avg_win, 150.0);
        assert_relative_eq!(metrics.avg_loss, 50.0);
        assert_relative_eq!(metrics.largest_win, 200.0);
        assert_relative_eq!(metrics.largest_loss, 50.0);
        assert_relative_eq!(metrics.avg_trade_duration_days, 5.0);
    }

    #[test]
    fn profit_factor_without_losses_is_infinite() {
        let portfolio = make_portfolio(&[10_000.0, 10_100.0], vec![make_trade(100.0, 1)]);
        let metrics = Metrics::compute(&portfolio, &[], 0.0);
        assert!(metrics.profit_factor.is_infinite());
    }

    #[test]
    fn max_drawdown_and_duration() {
        let curve = make_equity_curve(&[100.0, 110.0, 90.0, 95.0, 80.0, 100.0, 120.0]);
        let (dd, duration) = compute_drawdown(&curve);
        assert_relative_eq!(dd, (110.0 - 80.0) / 110.0);
        assert_eq!(duration, 4);
    }

    #[test]
    fn sharpe_positive_for_rising_equity() {
        let values: Vec<f64> = (0..60)
            .map(|i| 10_000.0 * (1.0 + 0.001 * i as f64 + 0.0005 * (i % 3) as f64))
            .collect();
        let portfolio = make_portfolio(&values, vec![]);
        let metrics = Metrics::compute(&portfolio, &[], 0.0);
        assert!(metrics.sharpe_ratio > 0.0);
        assert!(metrics.sortino_ratio >= 0.0);
    }

    #[test]
    fn flat_equity_has_zero_ratios() {
        let portfolio = make_portfolio(&[10_000.0; 5], vec![]);
        let metrics = Metrics::compute(&portfolio, &[], 0.0);
        assert_relative_eq!(metrics.sharpe_ratio, 0.0);
        assert_relative_eq!(metrics.sortino_ratio, 0.0);
        assert_relative_eq!(metrics.max_drawdown, 0.0);
    }

    #[test]
    fn cagr_over_two_years() {
        let curve = vec![
            EquityPoint {
                timestamp: day(0),
                equity: 10_000.0,
            },
            EquityPoint {
                timestamp: day(731),
                equity: 12_100.0,
            },
        ];
        // 731 days is 2.0014 years of 365.25 days
        let years = 731.0 / 365.25;
        assert_relative_eq!(compute_cagr(&curve), 1.21_f64.powf(1.0 / years) - 1.0);
        assert_relative_eq!(compute_cagr(&curve), 0.1, epsilon = 1e-3);
    }

    #[test]
    fn cagr_degenerate_curves_are_zero() {
        assert_relative_eq!(compute_cagr(&[]), 0.0);
        assert_relative_eq!(compute_cagr(&make_equity_curve(&[10_000.0])), 0.0);
        assert_relative_eq!(compute_cagr(&make_equity_curve(&[10_000.0, 0.0])), 0.0);
    }

    #[test]
    fn cagr_reported_in_metrics() {
        let portfolio = make_portfolio(&[10_000.0, 10_000.0, 9_000.0], vec![]);
        let metrics = Metrics::compute(&portfolio, &[], 0.0);
        assert!(metrics.cagr < 0.0);
        assert_relative_eq!(metrics.cagr, 0.9_f64.powf(365.25 / 2.0) - 1.0, epsilon = 1e-12);
    }

    #[test]
    fn buy_and_hold_uses_first_and_last_close() {
        let bars = make_bars(&[50.0, 40.0, 60.0]);
        assert_relative_eq!(buy_and_hold_return(&bars), 0.2);
        assert_relative_eq!(buy_and_hold_return(&make_bars(&[0.0, 10.0])), 0.0);
    }
}
