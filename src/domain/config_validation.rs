//! Configuration loading and validation.
//!
//! Every value is parsed strictly: a malformed number or name fails with
//! `ConfigInvalid` naming the section and key. Strategy settings resolve in
//! layers, later layers winning:
//!
//! 1. Built-in defaults
//! 2. The strategy's section in the parameter file
//! 3. The run config's `[strategy]` and `[indicators]` sections
//!
//! Cross-field checks run once on the merged result. Errors name the section
//! that last set the offending key.

use crate::domain::backtest::BacktestConfig;
use crate::domain::error::EngineError;
use crate::domain::indicator::IndicatorParams;
use crate::domain::registry::StrategyRegistry;
use crate::domain::strategy::StrategyConfig;
use crate::ports::config_port::ConfigPort;
use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;
use tracing::{debug, info};

pub const BACKTEST_SECTION: &str = "backtest";
pub const STRATEGY_SECTION: &str = "strategy";
pub const INDICATORS_SECTION: &str = "indicators";

const STRATEGY_KEYS: [&str; 6] = [
    "trade_mode",
    "position_size_pct",
    "position_size",
    "take_profit_pct",
    "stop_loss_pct",
    "bracket",
];

const INDICATOR_KEYS: [&str; 12] = [
    "bb_length",
    "bb_std",
    "rsi_length",
    "rsi_overbought",
    "rsi_oversold",
    "adx_length",
    "adx_threshold",
    "macd_fast",
    "macd_slow",
    "macd_signal",
    "ma_length",
    "rsi_threshold",
];

/// Parse `[section] key` if present.
fn parse<T>(config: &dyn ConfigPort, section: &str, key: &str) -> Result<Option<T>, EngineError>
where
    T: FromStr,
    T::Err: Display,
{
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| EngineError::invalid(section, key, format!("'{}': {}", raw.trim(), e))),
    }
}

fn parse_finite(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<f64>, EngineError> {
    match parse::<f64>(config, section, key)? {
        Some(v) if !v.is_finite() => {
            Err(EngineError::invalid(section, key, "must be a finite number"))
        }
        other => Ok(other),
    }
}

fn set<T>(target: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *target = v;
    }
}

pub fn load_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, EngineError> {
    let mut out = BacktestConfig::default();
    let s = BACKTEST_SECTION;

    out.data = config
        .get_string(s, "data")
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());
    set(&mut out.initial_cash, parse_finite(config, s, "initial_cash")?);
    set(&mut out.commission, parse_finite(config, s, "commission")?);
    set(&mut out.risk_free_rate, parse_finite(config, s, "risk_free_rate")?);

    if out.initial_cash <= 0.0 {
        return Err(EngineError::invalid(s, "initial_cash", "initial_cash must be positive"));
    }
    if !(0.0..1.0).contains(&out.commission) {
        return Err(EngineError::invalid(
            s,
            "commission",
            "commission is a fraction of notional and must be in [0, 1)",
        ));
    }
    if !(0.0..1.0).contains(&out.risk_free_rate) {
        return Err(EngineError::invalid(
            s,
            "risk_free_rate",
            "risk_free_rate must be between 0 and 1",
        ));
    }
    Ok(out)
}

/// Resolve the strategy named by `id` (or the run config's `[strategy] id`)
/// through the registry and apply every configuration layer.
pub fn build_strategy_config(
    run: &dyn ConfigPort,
    registry: &StrategyRegistry,
    params: Option<&dyn ConfigPort>,
    id: Option<&str>,
) -> Result<StrategyConfig, EngineError> {
    let id = match id {
        Some(id) => id.trim().to_string(),
        None => run
            .get_string(STRATEGY_SECTION, "id")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| EngineError::ConfigMissing {
                section: STRATEGY_SECTION.to_string(),
                key: "id".to_string(),
            })?,
    };

    let (id, variant) = registry.lookup(&id)?;
    let mut config = StrategyConfig::new(id, variant);
    let mut origins = KeyOrigins::default();

    if let Some(params) = params.filter(|p| p.has_section(id)) {
        debug!(strategy = %id, "applying parameter file section");
        reject_unknown_keys(params, id, &[&STRATEGY_KEYS[..], &INDICATOR_KEYS[..]])?;
        apply_strategy_settings(&mut config, params, id)?;
        apply_indicator_settings(&mut config.indicators, params, id, &mut origins)?;
    }

    reject_unknown_keys(run, STRATEGY_SECTION, &[&["id"][..], &STRATEGY_KEYS[..]])?;
    reject_unknown_keys(run, INDICATORS_SECTION, &[&INDICATOR_KEYS[..]])?;
    apply_strategy_settings(&mut config, run, STRATEGY_SECTION)?;
    apply_indicator_settings(&mut config.indicators, run, INDICATORS_SECTION, &mut origins)?;

    check_indicator_params(&config.indicators)
        .map_err(|(key, reason)| EngineError::invalid(origins.section(key), key, reason))?;
    validate_strategy_config(&config)?;
    info!(
        strategy = %config.id,
        variant = %config.variant,
        trade_mode = %config.trade_mode,
        position_size_pct = config.position_size_pct,
        "strategy configuration resolved"
    );
    Ok(config)
}

fn reject_unknown_keys(
    config: &dyn ConfigPort,
    section: &str,
    allowed: &[&[&str]],
) -> Result<(), EngineError> {
    for key in config.keys(section) {
        if !allowed.iter().any(|group| group.contains(&key.as_str())) {
            return Err(EngineError::invalid(section, &key, "unknown setting"));
        }
    }
    Ok(())
}

fn apply_strategy_settings(
    config: &mut StrategyConfig,
    source: &dyn ConfigPort,
    section: &str,
) -> Result<(), EngineError> {
    let size = |key| parse_finite(source, section, key);
    set(&mut config.trade_mode, parse(source, section, "trade_mode")?);
    set(&mut config.position_size_pct, size("position_size")?);
    set(&mut config.position_size_pct, size("position_size_pct")?);
    set(&mut config.take_profit_pct, size("take_profit_pct")?);
    set(&mut config.stop_loss_pct, size("stop_loss_pct")?);
    set(&mut config.bracket, parse(source, section, "bracket")?);

    for (key, value) in [
        ("take_profit_pct", config.take_profit_pct),
        ("stop_loss_pct", config.stop_loss_pct),
    ] {
        if value < 0.0 {
            return Err(EngineError::invalid(
                section,
                key,
                format!("{key} must be non-negative"),
            ));
        }
    }
    Ok(())
}

/// Which section last set each indicator key.
#[derive(Debug, Default)]
struct KeyOrigins(HashMap<&'static str, String>);

impl KeyOrigins {
    fn section(&self, key: &str) -> &str {
        self.0.get(key).map_or(INDICATORS_SECTION, String::as_str)
    }
}

fn apply_indicator_settings(
    p: &mut IndicatorParams,
    source: &dyn ConfigPort,
    section: &str,
    origins: &mut KeyOrigins,
) -> Result<(), EngineError> {
    for key in INDICATOR_KEYS {
        if source.get_string(section, key).is_some() {
            origins.0.insert(key, section.to_string());
        }
    }

    set(&mut p.bb_length, parse(source, section, "bb_length")?);
    set(&mut p.bb_std, parse_finite(source, section, "bb_std")?);
    set(&mut p.rsi_length, parse(source, section, "rsi_length")?);
    set(&mut p.rsi_overbought, parse_finite(source, section, "rsi_overbought")?);
    set(&mut p.rsi_oversold, parse_finite(source, section, "rsi_oversold")?);
    set(&mut p.adx_length, parse(source, section, "adx_length")?);
    set(&mut p.adx_threshold, parse_finite(source, section, "adx_threshold")?);
    set(&mut p.macd_fast, parse(source, section, "macd_fast")?);
    set(&mut p.macd_slow, parse(source, section, "macd_slow")?);
    set(&mut p.macd_signal, parse(source, section, "macd_signal")?);
    set(&mut p.ma_length, parse(source, section, "ma_length")?);
    set(&mut p.rsi_threshold, parse_finite(source, section, "rsi_threshold")?);
    Ok(())
}

pub fn validate_indicator_params(p: &IndicatorParams, section: &str) -> Result<(), EngineError> {
    check_indicator_params(p).map_err(|(key, reason)| EngineError::invalid(section, key, reason))
}

/// The offending key and why, for a merged set of parameters.
fn check_indicator_params(p: &IndicatorParams) -> Result<(), (&'static str, String)> {
    for (key, value) in [
        ("bb_length", p.bb_length),
        ("rsi_length", p.rsi_length),
        ("adx_length", p.adx_length),
        ("macd_fast", p.macd_fast),
        ("macd_slow", p.macd_slow),
        ("macd_signal", p.macd_signal),
        ("ma_length", p.ma_length),
    ] {
        if value == 0 {
            return Err((key, format!("{key} must be at least 1")));
        }
    }
    if p.bb_std <= 0.0 {
        return Err(("bb_std", "bb_std must be positive".to_string()));
    }
    if p.macd_fast >= p.macd_slow {
        return Err((
            "macd_fast",
            "macd_fast must be shorter than macd_slow".to_string(),
        ));
    }
    for (key, value) in [
        ("rsi_overbought", p.rsi_overbought),
        ("rsi_oversold", p.rsi_oversold),
        ("rsi_threshold", p.rsi_threshold),
        ("adx_threshold", p.adx_threshold),
    ] {
        if !(0.0..=100.0).contains(&value) {
            return Err((key, format!("{key} must be between 0 and 100")));
        }
    }
    if p.rsi_oversold >= p.rsi_overbought {
        return Err((
            "rsi_oversold",
            "rsi_oversold must be below rsi_overbought".to_string(),
        ));
    }
    Ok(())
}

/// Checks that hold regardless of which layer set the value.
pub fn validate_strategy_config(config: &StrategyConfig) -> Result<(), EngineError> {
    if !config.position_size_pct.is_finite() {
        return Err(EngineError::invalid(
            STRATEGY_SECTION,
            "position_size_pct",
            "position_size_pct must be a finite number",
        ));
    }
    validate_indicator_params(&config.indicators, INDICATORS_SECTION)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;
    use crate::domain::strategy::{BracketMode, StrategyVariant, TradeMode};

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    fn build(run: &str, params: Option<&str>) -> Result<StrategyConfig, EngineError> {
        let run = make_config(run);
        let params = params.map(make_config);
        build_strategy_config(
            &run,
            &StrategyRegistry::builtin(),
            params.as_ref().map(|p| p as &dyn ConfigPort),
            None,
        )
    }

    fn assert_invalid(result: Result<StrategyConfig, EngineError>, section: &str, key: &str) {
        match result {
            Err(EngineError::ConfigInvalid {
                section: s, key: k, ..
            }) => {
                assert_eq!(s, section);
                assert_eq!(k, key);
            }
            other => panic!("expected ConfigInvalid [{section}] {key}, got {other:?}"),
        }
    }

    #[test]
    fn valid_backtest_config_passes() {
        let config = make_config(
            "[backtest]\ndata = prices.csv\ninitial_cash = 25000\ncommission = 0.002\n",
        );
        let bt = load_backtest_config(&config).unwrap();
        assert_eq!(bt.data.as_deref(), Some("prices.csv"));
        assert!((bt.initial_cash - 25_000.0).abs() < f64::EPSILON);
        assert!((bt.commission - 0.002).abs() < f64::EPSILON);
    }

    #[test]
    fn backtest_defaults_when_section_missing() {
        let bt = load_backtest_config(&make_config("[strategy]\nid = Strategy 1\n")).unwrap();
        assert_eq!(bt, BacktestConfig::default());
    }

    #[test]
    fn initial_cash_must_be_positive() {
        let err = load_backtest_config(&make_config("[backtest]\ninitial_cash = 0\n")).unwrap_err();
        assert!(matches!(err, EngineError::ConfigInvalid { ref key, .. } if key == "initial_cash"));
    }

    #[test]
    fn commission_malformed_names_field() {
        let config = make_config("[backtest]\ncommission = cheap\n");
        let err = load_backtest_config(&config).unwrap_err();
        assert!(matches!(err, EngineError::ConfigInvalid { ref key, .. } if key == "commission"));
        assert!(err.to_string().contains("cheap"));
    }

    #[test]
    fn commission_out_of_range_fails() {
        let err = load_backtest_config(&make_config("[backtest]\ncommission = 1.5\n")).unwrap_err();
        assert!(matches!(err, EngineError::ConfigInvalid { ref key, .. } if key == "commission"));
    }

    #[test]
    fn defaults_without_overrides() {
        let c = build("[strategy]\nid = Strategy 2\n", None).unwrap();
        assert_eq!(c.variant, StrategyVariant::RsiBreakoutMomentum);
        assert_eq!(c.indicators, IndicatorParams::default());
        assert_eq!(c.trade_mode, TradeMode::Both);
    }

    #[test]
    fn missing_strategy_id() {
        let err = build("[backtest]\n", None).unwrap_err();
        assert!(matches!(err, EngineError::ConfigMissing { ref key, .. } if key == "id"));
    }

    #[test]
    fn unknown_strategy_id() {
        let err = build("[strategy]\nid = Strategy 7\n", None).unwrap_err();
        assert!(matches!(err, EngineError::UnknownStrategy { .. }));
    }

    #[test]
    fn run_config_overrides_parameter_file() {
        let params = "[Strategy 4]\nma_length = 50\nrsi_threshold = 55\ntrade_mode = short\n";
        let run = "[strategy]\nid = Strategy 4\ntrade_mode = long\n[indicators]\nma_length = 100\n";
        let c = build(run, Some(params)).unwrap();
        assert_eq!(c.indicators.ma_length, 100);
        assert!((c.indicators.rsi_threshold - 55.0).abs() < f64::EPSILON);
        assert_eq!(c.trade_mode, TradeMode::LongOnly);
    }

    #[test]
    fn parameter_file_sections_for_other_strategies_ignored() {
        let params = "[Strategy 1]\nbb_length = 10\n";
        let c = build("[strategy]\nid = Strategy 2\n", Some(params)).unwrap();
        assert_eq!(c.indicators.bb_length, 20);
    }

    #[test]
    fn legacy_position_size_key() {
        let c = build("[strategy]\nid = Strategy 1\nposition_size = 40\n", None).unwrap();
        assert!((c.position_size_pct - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn bracket_and_percentages() {
        let c = build(
            "[strategy]\nid = Strategy 3\n\
             take_profit_pct = 8\nstop_loss_pct = 3\nbracket = literal\n",
            None,
        )
        .unwrap();
        assert!((c.take_profit_pct - 8.0).abs() < f64::EPSILON);
        assert!((c.stop_loss_pct - 3.0).abs() < f64::EPSILON);
        assert_eq!(c.bracket, BracketMode::Literal);
    }

    #[test]
    fn malformed_integer_names_field() {
        assert_invalid(
            build("[strategy]\nid = Strategy 1\n[indicators]\nrsi_length = fourteen\n", None),
            "indicators",
            "rsi_length",
        );
    }

    #[test]
    fn zero_period_fails() {
        assert_invalid(
            build("[strategy]\nid = Strategy 1\n[indicators]\nbb_length = 0\n", None),
            "indicators",
            "bb_length",
        );
    }

    #[test]
    fn macd_fast_must_be_shorter() {
        assert_invalid(
            build("[strategy]\nid = Strategy 3\n[indicators]\nmacd_fast = 30\n", None),
            "indicators",
            "macd_fast",
        );
    }

    #[test]
    fn negative_stop_loss_fails() {
        assert_invalid(
            build("[strategy]\nid = Strategy 2\nstop_loss_pct = -1\n", None),
            "strategy",
            "stop_loss_pct",
        );
    }

    #[test]
    fn bad_trade_mode_fails() {
        assert_invalid(
            build("[strategy]\nid = Strategy 2\ntrade_mode = sideways\n", None),
            "strategy",
            "trade_mode",
        );
    }

    #[test]
    fn thresholds_must_be_ordered() {
        assert_invalid(
            build("[strategy]\nid = Strategy 1\n[indicators]\nrsi_oversold = 80\n", None),
            "indicators",
            "rsi_oversold",
        );
    }

    #[test]
    fn unknown_keys_rejected() {
        assert_invalid(
            build("[strategy]\nid = Strategy 1\n[indicators]\nrsi_len = 7\n", None),
            "indicators",
            "rsi_len",
        );
        assert_invalid(
            build("[strategy]\nid = Strategy 1\n", Some("[Strategy 1]\nfoo = 1\n")),
            "Strategy 1",
            "foo",
        );
    }

    #[test]
    fn parameter_file_error_names_strategy_section() {
        assert_invalid(
            build("[strategy]\nid = Strategy 1\n", Some("[Strategy 1]\nbb_std = -2\n")),
            "Strategy 1",
            "bb_std",
        );
    }

    #[test]
    fn layers_are_checked_after_merging() {
        // macd_fast = 30 alone would not be shorter than the default slow period
        let params = "[Strategy 3]\nmacd_fast = 30\n";
        let run = "[strategy]\nid = Strategy 3\n[indicators]\nmacd_slow = 40\n";
        let c = build(run, Some(params)).unwrap();
        assert_eq!((c.indicators.macd_fast, c.indicators.macd_slow), (30, 40));
    }

    #[test]
    fn merged_error_names_section_that_set_the_key() {
        let params = "[Strategy 3]\nmacd_fast = 30\n";
        assert_invalid(
            build("[strategy]\nid = Strategy 3\n", Some(params)),
            "Strategy 3",
            "macd_fast",
        );
        let params = "[Strategy 1]\nrsi_oversold = 60\n";
        let run = "[strategy]\nid = Strategy 1\n[indicators]\nrsi_oversold = 85\n";
        assert_invalid(build(run, Some(params)), "indicators", "rsi_oversold");
    }

    #[test]
    fn case_insensitive_id_uses_registered_section() {
        let params = "[Strategy 4]\nma_length = 50\n";
        let c = build("[strategy]\nid = strategy 4\n", Some(params)).unwrap();
        assert_eq!(c.id, "Strategy 4");
        assert_eq!(c.variant, StrategyVariant::MovingAverageTrend);
        assert_eq!(c.indicators.ma_length, 50);
    }

    #[test]
    fn explicit_id_wins_over_run_config() {
        let run = make_config("[strategy]\nid = Strategy 1\n");
        let c = build_strategy_config(&run, &StrategyRegistry::builtin(), None, Some("Strategy 3"))
            .unwrap();
        assert_eq!(c.variant, StrategyVariant::MacdBollingerMomentum);
        assert_eq!(c.id, "Strategy 3");
    }
}
