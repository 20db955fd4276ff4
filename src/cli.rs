//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::warn;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_trade_report::CsvTradeReport;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::paper_broker::PaperBroker;
use crate::domain::backtest::{BacktestConfig, BacktestResult};
use crate::domain::config_validation::{
    build_strategy_config, load_backtest_config, BACKTEST_SECTION,
};
use crate::domain::error::EngineError;
use crate::domain::execution::backtest;
use crate::domain::ohlcv::{out_of_order_indices, OhlcvBar};
use crate::domain::registry::StrategyRegistry;
use crate::domain::strategy::StrategyConfig;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "rulebench", about = "Rule-based trading strategy backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Files shared by every command that resolves strategies.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct Sources {
    /// Strategy registry INI (`[strategies]` id = variant); built-in registry when omitted
    #[arg(short, long)]
    pub registry: Option<PathBuf>,
    /// Per-strategy parameter INI (one section per strategy id)
    #[arg(short, long)]
    pub params: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one strategy over a price series
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[command(flatten)]
        sources: Sources,
        /// Strategy id, overriding `[strategy] id`
        #[arg(short, long)]
        strategy: Option<String>,
        /// Price CSV, overriding `[backtest] data`
        #[arg(short, long)]
        data: Option<PathBuf>,
        /// Write closed trades to this CSV file
        #[arg(short, long)]
        trades: Option<PathBuf>,
    },
    /// Run every registered strategy over the same series and rank them
    Compare {
        #[arg(short, long)]
        config: PathBuf,
        #[command(flatten)]
        sources: Sources,
        #[arg(short, long)]
        data: Option<PathBuf>,
    },
    /// Resolve and validate configuration without running
    Validate {
        #[arg(short, long)]
        config: PathBuf,
        #[command(flatten)]
        sources: Sources,
        #[arg(short, long)]
        strategy: Option<String>,
    },
    /// Print the registered strategy ids and their rule sets
    ListStrategies {
        #[command(flatten)]
        sources: Sources,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match execute(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn execute(command: Command) -> Result<(), EngineError> {
    match command {
        Command::Backtest {
            config,
            sources,
            strategy,
            data,
            trades,
        } => run_backtest(
            &config,
            &sources,
            strategy.as_deref(),
            data.as_deref(),
            trades.as_deref(),
        ),
        Command::Compare {
            config,
            sources,
            data,
        } => run_compare(&config, &sources, data.as_deref()),
        Command::Validate {
            config,
            sources,
            strategy,
        } => run_validate(&config, &sources, strategy.as_deref()),
        Command::ListStrategies { sources } => run_list_strategies(&sources),
    }
}

pub fn load_registry(path: Option<&Path>) -> Result<StrategyRegistry, EngineError> {
    match path {
        Some(p) => StrategyRegistry::from_config(&FileConfigAdapter::from_file(p)?),
        None => Ok(StrategyRegistry::builtin()),
    }
}

fn load_params(path: Option<&Path>) -> Result<Option<FileConfigAdapter>, EngineError> {
    path.map(|p| FileConfigAdapter::from_file(p)).transpose()
}

/// Everything a run needs before the first bar: config, registry and parameter file.
pub struct RunSetup {
    pub run_config: FileConfigAdapter,
    pub backtest: BacktestConfig,
    pub registry: StrategyRegistry,
    pub params: Option<FileConfigAdapter>,
    base_dir: PathBuf,
}

impl RunSetup {
    pub fn load(config_path: &Path, sources: &Sources) -> Result<Self, EngineError> {
        eprintln!("Loading config from {}", config_path.display());
        let run_config = FileConfigAdapter::from_file(config_path)?;
        let backtest = load_backtest_config(&run_config)?;
        let registry = load_registry(sources.registry.as_deref())?;
        let params = load_params(sources.params.as_deref())?;
        let base_dir = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(Self {
            run_config,
            backtest,
            registry,
            params,
            base_dir,
        })
    }

    pub fn strategy(&self, id: Option<&str>) -> Result<StrategyConfig, EngineError> {
        build_strategy_config(
            &self.run_config,
            &self.registry,
            self.params.as_ref().map(|p| p as &dyn ConfigPort),
            id,
        )
    }

    /// Bars from `data_override`, else `[backtest] data` relative to the config file.
    pub fn load_bars(&self, data_override: Option<&Path>) -> Result<Vec<OhlcvBar>, EngineError> {
        let source = match data_override {
            Some(p) => p.to_string_lossy().into_owned(),
            None => self
                .backtest
                .data
                .clone()
                .ok_or_else(|| EngineError::ConfigMissing {
                    section: BACKTEST_SECTION.to_string(),
                    key: "data".to_string(),
                })?,
        };
        let base = if data_override.is_some() {
            PathBuf::new()
        } else {
            self.base_dir.clone()
        };
        let bars = CsvAdapter::new(base).fetch_bars(&source)?;
        eprintln!("Loaded {} bars from {}", bars.len(), source);
        Ok(bars)
    }
}

/// One strategy over `bars` through a fresh paper broker.
pub fn run_single(
    bars: &[OhlcvBar],
    strategy: &StrategyConfig,
    bt: &BacktestConfig,
) -> Result<BacktestResult, EngineError> {
    let mut broker = PaperBroker::new(bt.initial_cash, bt.commission);
    let report = backtest(bars, strategy, &mut broker)?;
    Ok(BacktestResult::new(
        report,
        broker.into_portfolio(),
        bars,
        bt.risk_free_rate,
    ))
}

/// Runs each strategy independently on the rayon pool. Results keep input order.
pub fn compare_strategies(
    bars: &[OhlcvBar],
    strategies: &[StrategyConfig],
    bt: &BacktestConfig,
) -> Vec<(String, Result<BacktestResult, EngineError>)> {
    strategies
        .par_iter()
        .map(|s| (s.id.clone(), run_single(bars, s, bt)))
        .collect()
}

fn run_backtest(
    config_path: &Path,
    sources: &Sources,
    strategy_id: Option<&str>,
    data: Option<&Path>,
    trades_path: Option<&Path>,
) -> Result<(), EngineError> {
    let setup = RunSetup::load(config_path, sources)?;
    let strategy = setup.strategy(strategy_id)?;
    eprintln!("Strategy: {} ({})", strategy.id, strategy.variant);

    let bars = setup.load_bars(data)?;
    let result = run_single(&bars, &strategy, &setup.backtest)?;

    println!("{}", format_summary(&strategy, &result));

    if let Some(path) = trades_path {
        CsvTradeReport.write_trades(&result.portfolio.trades, &path.to_string_lossy())?;
        eprintln!(
            "Wrote {} trades to {}",
            result.portfolio.trades.len(),
            path.display()
        );
    }
    Ok(())
}

fn run_compare(
    config_path: &Path,
    sources: &Sources,
    data: Option<&Path>,
) -> Result<(), EngineError> {
    let setup = RunSetup::load(config_path, sources)?;
    let strategies = setup
        .registry
        .entries()
        .iter()
        .map(|(id, _)| setup.strategy(Some(id.as_str())))
        .collect::<Result<Vec<_>, _>>()?;
    let bars = setup.load_bars(data)?;

    eprintln!("Comparing {} strategies...", strategies.len());
    let mut ranked = Vec::new();
    for (id, result) in compare_strategies(&bars, &strategies, &setup.backtest) {
        match result {
            Ok(r) => ranked.push((id, r)),
            Err(e) => warn!(strategy = %id, error = %e, "strategy run failed"),
        }
    }
    if ranked.is_empty() {
        return Err(EngineError::Data {
            reason: "no strategy completed".to_string(),
        });
    }
    ranked.sort_by(|a, b| b.1.metrics.total_return.total_cmp(&a.1.metrics.total_return));

    println!("{}", format_comparison(&ranked));
    Ok(())
}

fn run_validate(
    config_path: &Path,
    sources: &Sources,
    strategy_id: Option<&str>,
) -> Result<(), EngineError> {
    let setup = RunSetup::load(config_path, sources)?;
    let strategy = setup.strategy(strategy_id)?;

    println!("Configuration is valid.");
    println!("  Strategy:      {} ({})", strategy.id, strategy.variant);
    println!("  Trade mode:    {}", strategy.trade_mode);
    println!("  Position size: {:.2}%", strategy.position_size_pct);
    println!(
        "  Bracket:       tp {:.2}% / sl {:.2}% ({:?})",
        strategy.take_profit_pct, strategy.stop_loss_pct, strategy.bracket
    );
    println!("  Indicators:    {:?}", strategy.indicators);

    if setup.backtest.data.is_some() {
        let bars = setup.load_bars(None)?;
        let skipped = out_of_order_indices(&bars);
        if !skipped.is_empty() {
            println!(
                "  Warning: {} bar(s) with non-increasing timestamps will be skipped",
                skipped.len()
            );
        }
    }
    Ok(())
}

fn run_list_strategies(sources: &Sources) -> Result<(), EngineError> {
    let registry = load_registry(sources.registry.as_deref())?;
    for (id, variant) in registry.entries() {
        println!("{id}\t{variant}");
    }
    Ok(())
}

fn pct(fraction: f64) -> String {
    format!("{:.2}%", fraction * 100.0)
}

pub fn format_summary(strategy: &StrategyConfig, result: &BacktestResult) -> String {
    let m = &result.metrics;
    let mut lines = vec![
        format!("Strategy:            {} ({})", strategy.id, strategy.variant),
        format!("Final equity:        {:.2}", m.final_equity),
        format!("Net profit:          {:.2}", m.net_profit),
        format!("Return:              {}", pct(m.total_return)),
        format!("CAGR:                {}", pct(m.cagr)),
        format!("Buy & hold return:   {}", pct(m.buy_and_hold_return)),
        format!("Max drawdown:        {}", pct(m.max_drawdown)),
        format!("Sharpe ratio:        {:.2}", m.sharpe_ratio),
        format!("Sortino ratio:       {:.2}", m.sortino_ratio),
        format!("Trades:              {}", m.total_trades),
        format!("Win rate:            {}", pct(m.win_rate)),
        format!("Profit factor:       {:.2}", m.profit_factor),
    ];
    if let Some(pos) = &result.report.open_position {
        lines.push(format!(
            "Open position:       {} from {:.4} at {}",
            pos.side, pos.entry_price, pos.entry_time
        ));
    }
    if !result.report.skipped_bars.is_empty() {
        lines.push(format!(
            "Skipped bars:        {}",
            result.report.skipped_bars.len()
        ));
    }
    if result.report.rejected_orders > 0 {
        lines.push(format!(
            "Rejected orders:     {}",
            result.report.rejected_orders
        ));
    }
    lines.join("\n")
}

pub fn format_comparison(ranked: &[(String, BacktestResult)]) -> String {
    let mut out = format!(
        "{:<20} {:>10} {:>10} {:>10} {:>8} {:>10} {:>8} {:>8}\n",
        "strategy", "return", "cagr", "drawdown", "trades", "win rate", "pf", "sharpe"
    );
    for (id, r) in ranked {
        let m = &r.metrics;
        out.push_str(&format!(
            "{:<20} {:>10} {:>10} {:>10} {:>8} {:>10} {:>8.2} {:>8.2}\n",
            id,
            pct(m.total_return),
            pct(m.cagr),
            pct(m.max_drawdown),
            m.total_trades,
            pct(m.win_rate),
            m.profit_factor,
            m.sharpe_ratio
        ));
    }
    out.trim_end().to_string()
}
