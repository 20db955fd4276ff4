//! Strategy configuration (resolved once per run, never mutated).

use crate::domain::indicator::IndicatorParams;
use std::fmt;
use std::str::FromStr;

/// Bracket width applied when `BracketMode::Literal` is selected.
pub const LITERAL_BRACKET_PCT: f64 = 5.0;

pub const DEFAULT_POSITION_SIZE_PCT: f64 = 99.0;
pub const DEFAULT_TAKE_PROFIT_PCT: f64 = LITERAL_BRACKET_PCT;
pub const DEFAULT_STOP_LOSS_PCT: f64 = LITERAL_BRACKET_PCT;

/// The four rule sets. Each maps to a rule table in `rule_eval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyVariant {
    BollingerRsiReversal,
    RsiBreakoutMomentum,
    MacdBollingerMomentum,
    MovingAverageTrend,
}

impl StrategyVariant {
    pub const ALL: [StrategyVariant; 4] = [
        StrategyVariant::BollingerRsiReversal,
        StrategyVariant::RsiBreakoutMomentum,
        StrategyVariant::MacdBollingerMomentum,
        StrategyVariant::MovingAverageTrend,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StrategyVariant::BollingerRsiReversal => "bollinger_rsi_reversal",
            StrategyVariant::RsiBreakoutMomentum => "rsi_breakout_momentum",
            StrategyVariant::MacdBollingerMomentum => "macd_bollinger_momentum",
            StrategyVariant::MovingAverageTrend => "moving_average_trend",
        }
    }
}

impl fmt::Display for StrategyVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StrategyVariant {
    type Err = String;

    /// Accepts `bollinger_rsi_reversal`, `BollingerRSIReversal` and
    /// module-qualified forms such as `All_strategies.BollingerRSIReversal`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bare = s.trim().rsplit('.').next().unwrap_or_default();
        let folded: String = bare
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();

        StrategyVariant::ALL
            .into_iter()
            .find(|v| v.name().replace('_', "") == folded)
            .ok_or_else(|| format!("unknown strategy variant '{}'", s.trim()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TradeMode {
    LongOnly,
    ShortOnly,
    #[default]
    Both,
}

impl TradeMode {
    pub fn allows_long(self) -> bool {
        matches!(self, TradeMode::LongOnly | TradeMode::Both)
    }

    pub fn allows_short(self) -> bool {
        matches!(self, TradeMode::ShortOnly | TradeMode::Both)
    }
}

impl FromStr for TradeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "long" | "long-only" | "long_only" => Ok(TradeMode::LongOnly),
            "short" | "short-only" | "short_only" => Ok(TradeMode::ShortOnly),
            "both" => Ok(TradeMode::Both),
            other => Err(format!(
                "unknown trade mode '{other}' (expected long, short or both)"
            )),
        }
    }
}

impl fmt::Display for TradeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TradeMode::LongOnly => "long",
            TradeMode::ShortOnly => "short",
            TradeMode::Both => "both",
        })
    }
}

/// Which bounds the percentage bracket exit uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BracketMode {
    /// Use `take_profit_pct` / `stop_loss_pct` from the config.
    #[default]
    Configured,
    /// Ignore the configured percentages and use a fixed 5% bracket.
    Literal,
}

impl FromStr for BracketMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "configured" => Ok(BracketMode::Configured),
            "literal" | "fixed" => Ok(BracketMode::Literal),
            other => Err(format!(
                "unknown bracket mode '{other}' (expected configured or literal)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyConfig {
    pub id: String,
    pub variant: StrategyVariant,
    pub trade_mode: TradeMode,
    pub position_size_pct: f64,
    pub indicators: IndicatorParams,
    pub take_profit_pct: f64,
    pub stop_loss_pct: f64,
    pub bracket: BracketMode,
}

impl StrategyConfig {
    /// Config with every option at its default.
    pub fn new(id: impl Into<String>, variant: StrategyVariant) -> Self {
        StrategyConfig {
            id: id.into(),
            variant,
            trade_mode: TradeMode::default(),
            position_size_pct: DEFAULT_POSITION_SIZE_PCT,
            indicators: IndicatorParams::default(),
            take_profit_pct: DEFAULT_TAKE_PROFIT_PCT,
            stop_loss_pct: DEFAULT_STOP_LOSS_PCT,
            bracket: BracketMode::default(),
        }
    }

    /// (take_profit, stop_loss) as fractions of the entry price.
    pub fn bracket_fractions(&self) -> (f64, f64) {
        match self.bracket {
            BracketMode::Configured => (self.take_profit_pct / 100.0, self.stop_loss_pct / 100.0),
            BracketMode::Literal => (LITERAL_BRACKET_PCT / 100.0, LITERAL_BRACKET_PCT / 100.0),
        }
    }
}
