use common::{IndicatorValue, Result};

use super::{param_period, Indicator, IndicatorInput, InputKind, Params};

/// RSI (Relative Strength Index) indicator.
///
/// Uses Wilder's smoothed moving average (same as TradingView / standard RSI).
/// Pending until at least `period + 1` prices have been seen.
#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    prev: Option<f64>,
    seen_changes: usize,
    avg_gain: f64,
    avg_loss: f64,
    value: Option<f64>,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        assert!(period >= 2, "RSI period must be >= 2");
        Self {
            period,
            prev: None,
            seen_changes: 0,
            avg_gain: 0.0,
            avg_loss: 0.0,
            value: None,
        }
    }

    pub fn from_params(params: &Params) -> Result<Box<dyn Indicator>> {
        Ok(Box::new(Self::new(param_period(params, "period", 14, 2)?)))
    }

    pub fn push(&mut self, price: f64) -> Option<f64> {
        let Some(prev) = self.prev.replace(price) else {
            return None;
        };
        let change = price - prev;
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);
        let period = self.period as f64;

        self.seen_changes += 1;
        if self.seen_changes <= self.period {
            // First average gain/loss over the initial `period` changes
            self.avg_gain += gain / period;
            self.avg_loss += loss / period;
            if self.seen_changes < self.period {
                return None;
            }
        } else {
            self.avg_gain = (self.avg_gain * (period - 1.0) + gain) / period;
            self.avg_loss = (self.avg_loss * (period - 1.0) + loss) / period;
        }

        self.value = Some(rsi_from_averages(self.avg_gain, self.avg_loss));
        self.value
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }
}

impl Indicator for Rsi {
    fn input(&self) -> InputKind {
        InputKind::Price
    }

    fn update(&mut self, input: IndicatorInput<'_>) {
        self.push(input.price());
    }

    fn result(&self) -> IndicatorValue {
        self.value.map_or(IndicatorValue::Pending, IndicatorValue::Scalar)
    }
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

/// RSI series from close prices (oldest first). Empty with fewer than
/// `period + 1` values.
pub fn rsi_series(closes: &[f64], period: usize) -> Vec<f64> {
    if period < 2 || closes.len() < period + 1 {
        return Vec::new();
    }
    let mut rsi = Rsi::new(period);
    closes.iter().filter_map(|&p| rsi.push(p)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rsi_pending_when_insufficient_data() {
        let mut rsi = Rsi::new(14);
        // Need at least period+1 = 15 values
        for _ in 0..14 {
            rsi.push(100.0);
        }
        assert!(rsi.result().is_pending());
        rsi.push(100.0);
        assert!(!rsi.result().is_pending());
    }

    #[test]
    fn rsi_all_gains_returns_100() {
        let values = rsi_series(&[10.0, 11.0, 12.0, 13.0, 14.0], 3);
        let value = *values.last().unwrap();
        assert!((value - 100.0).abs() < 1e-6, "Expected ~100, got {value}");
    }

    #[test]
    fn rsi_all_losses_returns_0() {
        let values = rsi_series(&[14.0, 13.0, 12.0, 11.0, 10.0], 3);
        let value = *values.last().unwrap();
        assert!((value - 0.0).abs() < 1e-6, "Expected ~0, got {value}");
    }

    #[test]
    fn rsi_known_value_in_range() {
        let prices = vec![
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.15, 43.61, 44.33, 44.83, 45.10,
            45.15, 44.34, 44.09,
        ];
        let values = rsi_series(&prices, 14);
        assert_eq!(values.len(), 1);
        assert!((0.0..=100.0).contains(&values[0]), "RSI out of range: {}", values[0]);
    }
}
