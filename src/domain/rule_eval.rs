//! Entry rule evaluation.
//!
//! Every variant is a pair of entry predicates plus an exit rule family, looked
//! up from one table. Predicates return `Option<bool>`: `None` means an
//! indicator they read is still warming up at this bar.
//!
//! # Evaluation Semantics
//!
//! - No entry while any of the variant's required indicators is undefined,
//!   even one the firing predicate does not read
//! - Long is checked first; short only when the long branch did not fire
//! - Each branch is gated by the configured trade mode
//! - Crossovers compare the previous accepted bar with bar `index` and are
//!   false when there is no previous bar

use crate::domain::indicator::{IndicatorKey, IndicatorSet};
use crate::domain::position::{ExitRule, Position, Side};
use crate::domain::strategy::{StrategyConfig, StrategyVariant};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    NoOp,
    OpenLong,
    OpenShort,
    ClosePosition,
}

impl Decision {
    pub fn open(side: Side) -> Self {
        match side {
            Side::Long => Decision::OpenLong,
            Side::Short => Decision::OpenShort,
        }
    }

    pub fn entry_side(self) -> Option<Side> {
        match self {
            Decision::OpenLong => Some(Side::Long),
            Decision::OpenShort => Some(Side::Short),
            Decision::NoOp | Decision::ClosePosition => None,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Decision::NoOp => "no-op",
            Decision::OpenLong => "open-long",
            Decision::OpenShort => "open-short",
            Decision::ClosePosition => "close-position",
        })
    }
}

/// What a predicate sees for one bar.
#[derive(Debug, Clone, Copy)]
pub struct BarContext<'a> {
    pub index: usize,
    pub price: f64,
    pub indicators: &'a IndicatorSet,
    pub config: &'a StrategyConfig,
    /// Index of the previous accepted bar, if any.
    pub previous: Option<usize>,
}

impl BarContext<'_> {
    fn get(&self, key: IndicatorKey) -> Option<f64> {
        self.indicators.value(key, self.index)
    }

    fn prev(&self, key: IndicatorKey) -> Option<f64> {
        self.indicators.value(key, self.previous?)
    }
}

type Predicate = fn(&BarContext<'_>) -> Option<bool>;

/// One row of the rule table.
#[derive(Clone, Copy)]
pub struct VariantRules {
    pub long: Predicate,
    pub short: Predicate,
    pub exit: ExitRule,
    pub required: &'static [IndicatorKey],
}

impl StrategyVariant {
    pub fn rules(self) -> VariantRules {
        match self {
            StrategyVariant::BollingerRsiReversal => VariantRules {
                long: reversal_long,
                short: reversal_short,
                exit: ExitRule::IndicatorReversal,
                required: &[
                    IndicatorKey::Rsi,
                    IndicatorKey::BbUpper,
                    IndicatorKey::BbLower,
                ],
            },
            StrategyVariant::RsiBreakoutMomentum => VariantRules {
                long: breakout_long,
                short: breakout_short,
                exit: ExitRule::Bracket,
                required: &[IndicatorKey::Rsi, IndicatorKey::BbUpper, IndicatorKey::Adx],
            },
            StrategyVariant::MacdBollingerMomentum => VariantRules {
                long: macd_long,
                short: macd_short,
                exit: ExitRule::Bracket,
                required: &[IndicatorKey::Macd, IndicatorKey::BbWidth],
            },
            StrategyVariant::MovingAverageTrend => VariantRules {
                long: trend_long,
                short: trend_short,
                exit: ExitRule::Bracket,
                required: &[IndicatorKey::Rsi, IndicatorKey::Sma],
            },
        }
    }

    pub fn required_indicators(self) -> &'static [IndicatorKey] {
        self.rules().required
    }
}

/// Entry decision for bar `index`, with bar `index - 1` as the previous bar.
/// Returns `NoOp` unless `position` is flat.
pub fn decide_entry(
    index: usize,
    price: f64,
    indicators: &IndicatorSet,
    position: Option<&Position>,
    config: &StrategyConfig,
) -> Decision {
    decide_entry_after(index, index.checked_sub(1), price, indicators, position, config)
}

/// Entry decision for bar `index` when the previous accepted bar is `previous`.
pub fn decide_entry_after(
    index: usize,
    previous: Option<usize>,
    price: f64,
    indicators: &IndicatorSet,
    position: Option<&Position>,
    config: &StrategyConfig,
) -> Decision {
    if position.is_some() {
        return Decision::NoOp;
    }

    let rules = config.variant.rules();
    if rules
        .required
        .iter()
        .any(|key| indicators.value(*key, index).is_none())
    {
        return Decision::NoOp;
    }

    let ctx = BarContext {
        index,
        price,
        indicators,
        config,
        previous,
    };

    if config.trade_mode.allows_long() && (rules.long)(&ctx).unwrap_or(false) {
        Decision::OpenLong
    } else if config.trade_mode.allows_short() && (rules.short)(&ctx).unwrap_or(false) {
        Decision::OpenShort
    } else {
        Decision::NoOp
    }
}

/// Strict sign change upwards: previous value <= 0, current value > 0.
pub fn crosses_above_zero(prev: f64, curr: f64) -> bool {
    prev <= 0.0 && curr > 0.0
}

/// Strict sign change downwards: previous value >= 0, current value < 0.
pub fn crosses_below_zero(prev: f64, curr: f64) -> bool {
    prev >= 0.0 && curr < 0.0
}

fn reversal_long(ctx: &BarContext<'_>) -> Option<bool> {
    let p = &ctx.config.indicators;
    let rsi = ctx.get(IndicatorKey::Rsi)?;
    Some(rsi < p.rsi_oversold && ctx.price < ctx.get(IndicatorKey::BbLower)?)
}

fn reversal_short(ctx: &BarContext<'_>) -> Option<bool> {
    let p = &ctx.config.indicators;
    let rsi = ctx.get(IndicatorKey::Rsi)?;
    Some(rsi > p.rsi_overbought && ctx.price > ctx.get(IndicatorKey::BbUpper)?)
}

fn breakout_long(ctx: &BarContext<'_>) -> Option<bool> {
    let p = &ctx.config.indicators;
    let rsi = ctx.get(IndicatorKey::Rsi)?;
    Some(rsi > p.rsi_overbought && ctx.price > ctx.get(IndicatorKey::BbUpper)?)
}

fn breakout_short(ctx: &BarContext<'_>) -> Option<bool> {
    let p = &ctx.config.indicators;
    let rsi = ctx.get(IndicatorKey::Rsi)?;
    Some(rsi < p.rsi_oversold && ctx.get(IndicatorKey::Adx)? > p.adx_threshold)
}

fn macd_long(ctx: &BarContext<'_>) -> Option<bool> {
    let crossed =
        crosses_above_zero(ctx.prev(IndicatorKey::Macd)?, ctx.get(IndicatorKey::Macd)?);
    Some(crossed && ctx.get(IndicatorKey::BbWidth)? > 0.0)
}

fn macd_short(ctx: &BarContext<'_>) -> Option<bool> {
    let crossed =
        crosses_below_zero(ctx.prev(IndicatorKey::Macd)?, ctx.get(IndicatorKey::Macd)?);
    Some(crossed && ctx.get(IndicatorKey::BbWidth)? > 0.0)
}

fn trend_long(ctx: &BarContext<'_>) -> Option<bool> {
    let p = &ctx.config.indicators;
    let rsi = ctx.get(IndicatorKey::Rsi)?;
    Some(rsi > p.rsi_threshold && ctx.price > ctx.get(IndicatorKey::Sma)?)
}

fn trend_short(ctx: &BarContext<'_>) -> Option<bool> {
    let p = &ctx.config.indicators;
    let rsi = ctx.get(IndicatorKey::Rsi)?;
    Some(rsi < p.rsi_threshold && ctx.price < ctx.get(IndicatorKey::Sma)?)
}
