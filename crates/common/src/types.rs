use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Error;

/// One OHLCV summary for a fixed interval, as delivered by the candle feed.
///
/// Candles arrive in non-decreasing `start` order; nothing downstream re-sorts them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub start: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// Volume weighted price over the interval.
    pub vwp: f64,
    pub trades: u64,
}

impl Candle {
    /// Read a single field as a scalar.
    pub fn field(&self, field: CandleField) -> f64 {
        match field {
            CandleField::Open => self.open,
            CandleField::High => self.high,
            CandleField::Low => self.low,
            CandleField::Close => self.close,
            CandleField::Volume => self.volume,
            CandleField::Vwp => self.vwp,
            CandleField::Trades => self.trades as f64,
        }
    }
}

/// Names one column of a candle. Used both for the configured price field and
/// for selecting a history column in window indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CandleField {
    Open,
    High,
    Low,
    #[default]
    Close,
    Volume,
    Vwp,
    Trades,
}

impl std::fmt::Display for CandleField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CandleField::Open => "open",
            CandleField::High => "high",
            CandleField::Low => "low",
            CandleField::Close => "close",
            CandleField::Volume => "volume",
            CandleField::Vwp => "vwp",
            CandleField::Trades => "trades",
        };
        f.write_str(s)
    }
}

impl FromStr for CandleField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" => Ok(CandleField::Open),
            "high" => Ok(CandleField::High),
            "low" => Ok(CandleField::Low),
            "close" => Ok(CandleField::Close),
            "volume" => Ok(CandleField::Volume),
            "vwp" => Ok(CandleField::Vwp),
            "trades" => Ok(CandleField::Trades),
            other => Err(Error::Config(format!("unknown candle field '{other}'"))),
        }
    }
}

/// Whether candles come from a live feed or from recorded history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TradingMode {
    Realtime,
    #[default]
    Backtest,
}

impl std::fmt::Display for TradingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradingMode::Realtime => write!(f, "realtime"),
            TradingMode::Backtest => write!(f, "backtest"),
        }
    }
}

/// Position recommended by a strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recommendation {
    Long,
    Short,
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Recommendation::Long => write!(f, "long"),
            Recommendation::Short => write!(f, "short"),
        }
    }
}

/// Last computed result of an indicator slot.
///
/// Serialized untagged: `Pending` becomes `null`, a scalar a number and a
/// multi-output result an object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum IndicatorValue {
    #[default]
    Pending,
    Scalar(f64),
    Fields(BTreeMap<String, f64>),
}

impl IndicatorValue {
    pub fn is_pending(&self) -> bool {
        matches!(self, IndicatorValue::Pending)
    }

    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            IndicatorValue::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    /// Look up one output of a multi-output result.
    pub fn field(&self, name: &str) -> Option<f64> {
        match self {
            IndicatorValue::Fields(fields) => fields.get(name).copied(),
            _ => None,
        }
    }
}

/// Immutable columnar view of recent candles handed to asynchronous indicators.
///
/// Each request receives its own snapshot, so later evictions in the live
/// buffer never change what an in-flight computation sees.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HistorySnapshot {
    pub open: Vec<f64>,
    pub high: Vec<f64>,
    pub low: Vec<f64>,
    pub close: Vec<f64>,
    pub volume: Vec<f64>,
    pub vwp: Vec<f64>,
    pub trades: Vec<f64>,
}

impl HistorySnapshot {
    pub fn len(&self) -> usize {
        self.close.len()
    }

    pub fn is_empty(&self) -> bool {
        self.close.is_empty()
    }

    pub fn column(&self, field: CandleField) -> &[f64] {
        match field {
            CandleField::Open => &self.open,
            CandleField::High => &self.high,
            CandleField::Low => &self.low,
            CandleField::Close => &self.close,
            CandleField::Volume => &self.volume,
            CandleField::Vwp => &self.vwp,
            CandleField::Trades => &self.trades,
        }
    }
}

/// Events published by a running strategy engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StrategyEvent {
    /// Emitted once, on the candle that completed warmup.
    WarmupCompleted { start: DateTime<Utc> },
    /// Emitted for every admitted candle, warm or not.
    Update {
        date: DateTime<Utc>,
        indicators: BTreeMap<String, IndicatorValue>,
    },
    /// Emitted only when the recommendation changes.
    Advice { recommendation: Recommendation },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_column_selects_field() {
        let snapshot = HistorySnapshot {
            close: vec![1.0, 2.0],
            trades: vec![5.0, 6.0],
            ..HistorySnapshot::default()
        };
        assert!(!snapshot.is_empty());
        assert!(HistorySnapshot::default().is_empty());
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.column(CandleField::Trades), &[5.0, 6.0]);
        assert!(snapshot.column(CandleField::Open).is_empty());
    }

    #[test]
    fn pending_serializes_as_null() {
        let json = serde_json::to_string(&IndicatorValue::Pending).unwrap();
        assert_eq!(json, "null");
    }

    #[test]
    fn fields_lookup() {
        let mut fields = BTreeMap::new();
        fields.insert("macd".to_string(), 1.5);
        let value = IndicatorValue::Fields(fields);
        assert_eq!(value.field("macd"), Some(1.5));
        assert_eq!(value.field("signal"), None);
        assert_eq!(value.as_scalar(), None);
    }

    #[test]
    fn candle_field_parses_case_insensitively() {
        assert_eq!("Close".parse::<CandleField>().unwrap(), CandleField::Close);
        assert_eq!("vwp".parse::<CandleField>().unwrap(), CandleField::Vwp);
        assert!(matches!("median".parse::<CandleField>(), Err(Error::Config(_))));
    }

    #[test]
    fn update_event_shape() {
        let start = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let mut indicators = BTreeMap::new();
        indicators.insert("rsi".to_string(), IndicatorValue::Scalar(42.0));
        let event = StrategyEvent::Update { date: start, indicators };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "update");
        assert_eq!(json["indicators"]["rsi"], 42.0);
    }
}
