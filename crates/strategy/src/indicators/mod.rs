pub mod atr;
pub mod average;
pub mod macd;
pub mod rsi;

use std::collections::HashMap;

pub use atr::Atr;
pub use average::{Ema, Sma};
pub use macd::Macd;
pub use rsi::Rsi;

use common::{Candle, CandleField, Error, IndicatorValue, Result};

/// Indicator parameters as written in the strategy TOML.
pub type Params = HashMap<String, toml::Value>;

/// What a synchronous indicator consumes on every update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// The configured price field of the candle.
    Price,
    /// The whole candle.
    Candle,
}

#[derive(Debug, Clone, Copy)]
pub enum IndicatorInput<'a> {
    Price(f64),
    Candle(&'a Candle),
}

impl IndicatorInput<'_> {
    /// Price carried by this input. Candle inputs fall back to the close.
    pub fn price(&self) -> f64 {
        match self {
            IndicatorInput::Price(p) => *p,
            IndicatorInput::Candle(c) => c.close,
        }
    }
}

/// A synchronous indicator, updated inline once per admitted candle.
pub trait Indicator: Send {
    fn input(&self) -> InputKind;

    fn update(&mut self, input: IndicatorInput<'_>);

    /// Last computed result, `Pending` until enough data has been seen.
    fn result(&self) -> IndicatorValue;
}

pub type Constructor = fn(&Params) -> Result<Box<dyn Indicator>>;

const CATALOG: &[(&str, Constructor)] = &[
    ("sma", Sma::from_params),
    ("ema", Ema::from_params),
    ("rsi", Rsi::from_params),
    ("macd", Macd::from_params),
    ("atr", Atr::from_params),
];

/// Every synchronous indicator type known at compile time.
pub fn catalog() -> impl Iterator<Item = &'static str> {
    CATALOG.iter().map(|(name, _)| *name)
}

/// Build an indicator of the given type.
pub fn create(kind: &str, params: &Params) -> Result<Box<dyn Indicator>> {
    let ctor = CATALOG
        .iter()
        .find(|(name, _)| *name == kind)
        .map(|(_, ctor)| *ctor)
        .ok_or_else(|| Error::Config(format!("unknown indicator type '{kind}'")))?;
    ctor(params)
}

// ─── Parameter helpers ────────────────────────────────────────────────────────

pub fn param_f64(params: &Params, key: &str, default: f64) -> f64 {
    params
        .get(key)
        .and_then(|v| v.as_float().or_else(|| v.as_integer().map(|i| i as f64)))
        .unwrap_or(default)
}

/// Read an integer period, rejecting values below `min`.
pub fn param_period(params: &Params, key: &str, default: usize, min: usize) -> Result<usize> {
    let value = match params.get(key) {
        None => return Ok(default),
        Some(v) => v
            .as_integer()
            .ok_or_else(|| Error::Config(format!("parameter '{key}' must be an integer")))?,
    };
    if value < min as i64 {
        return Err(Error::Config(format!(
            "parameter '{key}' must be >= {min}, got {value}"
        )));
    }
    Ok(value as usize)
}

/// Read a candle column name, e.g. `field = "close"`.
pub fn param_field(params: &Params, key: &str, default: CandleField) -> Result<CandleField> {
    match params.get(key) {
        None => Ok(default),
        Some(v) => v
            .as_str()
            .ok_or_else(|| Error::Config(format!("parameter '{key}' must be a string")))?
            .parse(),
    }
}
