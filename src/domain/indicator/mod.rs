//! Technical indicator series and the provider that computes them.
//!
//! - `IndicatorKey`: names a single aligned series (`rsi`, `bb_upper`, ...)
//! - `IndicatorSet`: series keyed by name, aligned index-for-index with the bars
//! - `IndicatorParams`: periods and thresholds, with the documented defaults
//!
//! Warm-up values are `None`. A consumer must never read them as zero.

pub mod adx;
pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;

use crate::domain::error::EngineError;
use crate::domain::ohlcv::OhlcvBar;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

pub type Series = Vec<Option<f64>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IndicatorKey {
    Rsi,
    BbUpper,
    BbLower,
    BbWidth,
    Macd,
    Adx,
    Sma,
}

impl IndicatorKey {
    pub const ALL: [IndicatorKey; 7] = [
        IndicatorKey::Rsi,
        IndicatorKey::BbUpper,
        IndicatorKey::BbLower,
        IndicatorKey::BbWidth,
        IndicatorKey::Macd,
        IndicatorKey::Adx,
        IndicatorKey::Sma,
    ];

    pub fn name(self) -> &'static str {
        match self {
            IndicatorKey::Rsi => "rsi",
            IndicatorKey::BbUpper => "bb_upper",
            IndicatorKey::BbLower => "bb_lower",
            IndicatorKey::BbWidth => "bb_width",
            IndicatorKey::Macd => "macd",
            IndicatorKey::Adx => "adx",
            IndicatorKey::Sma => "sma",
        }
    }
}

impl fmt::Display for IndicatorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for IndicatorKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IndicatorKey::ALL
            .into_iter()
            .find(|k| k.name() == s.trim().to_lowercase())
            .ok_or_else(|| format!("unknown indicator '{s}'"))
    }
}

/// Indicator sequences aligned with one bar series.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndicatorSet {
    len: usize,
    series: HashMap<IndicatorKey, Series>,
}

impl IndicatorSet {
    pub fn new(len: usize) -> Self {
        Self {
            len,
            series: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Attach a series. Its length must match the bar count.
    pub fn insert(&mut self, key: IndicatorKey, values: Series) -> Result<(), EngineError> {
        if values.len() != self.len {
            return Err(EngineError::IndicatorLength {
                key: key.to_string(),
                expected: self.len,
                actual: values.len(),
            });
        }
        self.series.insert(key, values);
        Ok(())
    }

    pub fn with(mut self, key: IndicatorKey, values: Series) -> Result<Self, EngineError> {
        self.insert(key, values)?;
        Ok(self)
    }

    pub fn contains(&self, key: IndicatorKey) -> bool {
        self.series.contains_key(&key)
    }

    pub fn series(&self, key: IndicatorKey) -> Option<&[Option<f64>]> {
        self.series.get(&key).map(Vec::as_slice)
    }

    /// Value at `index`, or `None` when the series is absent, still warming up,
    /// out of range or NaN.
    pub fn value(&self, key: IndicatorKey, index: usize) -> Option<f64> {
        self.series
            .get(&key)?
            .get(index)
            .copied()
            .flatten()
            .filter(|v| !v.is_nan())
    }
}

/// Indicator periods and thresholds for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorParams {
    pub bb_length: usize,
    pub bb_std: f64,
    pub rsi_length: usize,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    pub adx_length: usize,
    pub adx_threshold: f64,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub ma_length: usize,
    pub rsi_threshold: f64,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        IndicatorParams {
            bb_length: 20,
            bb_std: 2.0,
            rsi_length: 14,
            rsi_overbought: 75.0,
            rsi_oversold: 25.0,
            adx_length: 14,
            adx_threshold: 30.0,
            macd_fast: macd::DEFAULT_FAST,
            macd_slow: macd::DEFAULT_SLOW,
            macd_signal: macd::DEFAULT_SIGNAL,
            ma_length: 200,
            rsi_threshold: 50.0,
        }
    }
}

/// Compute the requested series over `bars`. The Bollinger trio shares one
/// calculation. Only the MACD line is exposed; rules never read its signal line.
pub fn compute_indicators(
    bars: &[OhlcvBar],
    params: &IndicatorParams,
    keys: &[IndicatorKey],
) -> IndicatorSet {
    let wanted: BTreeSet<IndicatorKey> = keys.iter().copied().collect();
    let mut out: HashMap<IndicatorKey, Series> = HashMap::new();

    if wanted.contains(&IndicatorKey::Rsi) {
        out.insert(IndicatorKey::Rsi, rsi::calculate_rsi(bars, params.rsi_length));
    }

    if wanted
        .iter()
        .any(|k| matches!(k, IndicatorKey::BbUpper | IndicatorKey::BbLower | IndicatorKey::BbWidth))
    {
        let bands = bollinger::calculate_bollinger(bars, params.bb_length, params.bb_std);
        for (key, values) in [
            (IndicatorKey::BbUpper, bands.upper),
            (IndicatorKey::BbLower, bands.lower),
            (IndicatorKey::BbWidth, bands.width),
        ] {
            if wanted.contains(&key) {
                out.insert(key, values);
            }
        }
    }

    if wanted.contains(&IndicatorKey::Macd) {
        let lines = macd::calculate_macd(
            bars,
            params.macd_fast,
            params.macd_slow,
            params.macd_signal,
        );
        out.insert(IndicatorKey::Macd, lines.line);
    }

    if wanted.contains(&IndicatorKey::Adx) {
        out.insert(IndicatorKey::Adx, adx::calculate_adx(bars, params.adx_length));
    }

    if wanted.contains(&IndicatorKey::Sma) {
        out.insert(IndicatorKey::Sma, sma::calculate_sma(bars, params.ma_length));
    }

    IndicatorSet {
        len: bars.len(),
        series: out,
    }
}
