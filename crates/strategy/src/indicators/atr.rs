use common::{Candle, IndicatorValue, Result};

use super::{param_period, Indicator, IndicatorInput, InputKind, Params};

/// Average True Range with Wilder smoothing. Consumes full candles.
#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    prev_close: Option<f64>,
    seen: usize,
    value: Option<f64>,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ATR period must be >= 1");
        Self {
            period,
            prev_close: None,
            seen: 0,
            value: None,
        }
    }

    pub fn from_params(params: &Params) -> Result<Box<dyn Indicator>> {
        Ok(Box::new(Self::new(param_period(params, "period", 14, 1)?)))
    }

    fn push(&mut self, candle: &Candle) {
        let range = candle.high - candle.low;
        let tr = match self.prev_close.replace(candle.close) {
            Some(pc) => range.max((candle.high - pc).abs()).max((candle.low - pc).abs()),
            None => range,
        };
        let period = self.period as f64;

        self.seen += 1;
        self.value = if self.seen <= self.period {
            // seed average, accumulated in place
            Some(self.value.unwrap_or(0.0) + tr / period)
        } else {
            self.value.map(|prev| (prev * (period - 1.0) + tr) / period)
        };
    }
}

impl Indicator for Atr {
    fn input(&self) -> InputKind {
        InputKind::Candle
    }

    fn update(&mut self, input: IndicatorInput<'_>) {
        if let IndicatorInput::Candle(candle) = input {
            self.push(candle);
        }
    }

    fn result(&self) -> IndicatorValue {
        if self.seen < self.period {
            return IndicatorValue::Pending;
        }
        self.value.map_or(IndicatorValue::Pending, IndicatorValue::Scalar)
    }
}
