use std::collections::BTreeMap;

use common::{Error, IndicatorValue, Result};

use super::average::Ema;
use super::{param_period, Indicator, IndicatorInput, InputKind, Params};

/// MACD (Moving Average Convergence/Divergence) indicator.
///
/// MACD line = EMA(fast) − EMA(slow), Signal = EMA(macd_line, signal_period),
/// Histogram = MACD line − Signal.
#[derive(Debug, Clone)]
pub struct Macd {
    fast: Ema,
    slow: Ema,
    signal: Ema,
    last: Option<MacdPoint>,
}

/// One MACD observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdPoint {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

impl MacdPoint {
    pub fn to_value(self) -> IndicatorValue {
        let mut fields = BTreeMap::new();
        fields.insert("macd".to_string(), self.macd);
        fields.insert("signal".to_string(), self.signal);
        fields.insert("histogram".to_string(), self.histogram);
        IndicatorValue::Fields(fields)
    }
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        assert!(
            fast < slow,
            "MACD fast period must be less than slow period"
        );
        Self {
            fast: Ema::new(fast),
            slow: Ema::new(slow),
            signal: Ema::new(signal),
            last: None,
        }
    }

    pub fn from_params(params: &Params) -> Result<Box<dyn Indicator>> {
        let (fast, slow, signal) = macd_periods(params)?;
        Ok(Box::new(Self::new(fast, slow, signal)))
    }

    pub fn push(&mut self, price: f64) -> Option<MacdPoint> {
        let fast = self.fast.push(price);
        let slow = self.slow.push(price);
        let (Some(fast), Some(slow)) = (fast, slow) else {
            return None;
        };
        let macd = fast - slow;
        let signal = self.signal.push(macd)?;
        let point = MacdPoint {
            macd,
            signal,
            histogram: macd - signal,
        };
        self.last = Some(point);
        self.last
    }
}

impl Indicator for Macd {
    fn input(&self) -> InputKind {
        InputKind::Price
    }

    fn update(&mut self, input: IndicatorInput<'_>) {
        self.push(input.price());
    }

    fn result(&self) -> IndicatorValue {
        self.last.map_or(IndicatorValue::Pending, MacdPoint::to_value)
    }
}

/// Read and validate `fast`, `slow` and `signal` periods.
pub fn macd_periods(params: &Params) -> Result<(usize, usize, usize)> {
    let fast = param_period(params, "fast", 12, 1)?;
    let slow = param_period(params, "slow", 26, 2)?;
    let signal = param_period(params, "signal", 9, 1)?;
    if fast >= slow {
        return Err(Error::Config(format!(
            "MACD fast period ({fast}) must be less than slow period ({slow})"
        )));
    }
    Ok((fast, slow, signal))
}

/// Full MACD series over `closes` (oldest first). Needs at least
/// `slow + signal - 1` prices to produce a point.
pub fn macd_series(closes: &[f64], fast: usize, slow: usize, signal: usize) -> Vec<MacdPoint> {
    let mut macd = Macd::new(fast, slow, signal);
    closes.iter().filter_map(|&p| macd.push(p)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trending_up(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + i as f64 * 0.5).collect()
    }

    #[test]
    fn macd_pending_with_insufficient_data() {
        // need >= 26 + 9 - 1 = 34
        let points = macd_series(&[100.0; 33], 12, 26, 9);
        assert!(points.is_empty());
        let points = macd_series(&[100.0; 34], 12, 26, 9);
        assert_eq!(points.len(), 1);
    }

    #[test]
    fn macd_positive_on_steady_uptrend() {
        let points = macd_series(&trending_up(60), 3, 6, 3);
        let last = points.last().unwrap();
        assert!(last.macd > 0.0, "fast EMA should lead on an uptrend");
    }

    #[test]
    fn macd_result_exposes_fields() {
        let mut macd = Macd::new(3, 6, 3);
        for p in trending_up(20) {
            macd.update(IndicatorInput::Price(p));
        }
        let value = macd.result();
        let histogram = value.field("histogram").unwrap();
        let expected = value.field("macd").unwrap() - value.field("signal").unwrap();
        assert!((histogram - expected).abs() < 1e-12);
    }

    #[test]
    fn rejects_fast_not_below_slow() {
        let mut params = Params::new();
        params.insert("fast".into(), toml::Value::Integer(26));
        params.insert("slow".into(), toml::Value::Integer(12));
        assert!(matches!(macd_periods(&params), Err(Error::Config(_))));
    }
}
