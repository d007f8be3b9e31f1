use std::collections::VecDeque;

use common::{IndicatorValue, Result};

use super::{param_period, Indicator, IndicatorInput, InputKind, Params};

/// Simple moving average over the last `period` prices.
#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    window: VecDeque<f64>,
    sum: f64,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "SMA period must be >= 1");
        Self {
            period,
            window: VecDeque::with_capacity(period + 1),
            sum: 0.0,
        }
    }

    pub fn from_params(params: &Params) -> Result<Box<dyn Indicator>> {
        Ok(Box::new(Self::new(param_period(params, "period", 10, 1)?)))
    }

    pub fn push(&mut self, price: f64) -> Option<f64> {
        self.window.push_back(price);
        self.sum += price;
        if self.window.len() > self.period {
            if let Some(old) = self.window.pop_front() {
                self.sum -= old;
            }
        }
        self.value()
    }

    pub fn value(&self) -> Option<f64> {
        (self.window.len() == self.period).then(|| self.sum / self.period as f64)
    }
}

impl Indicator for Sma {
    fn input(&self) -> InputKind {
        InputKind::Price
    }

    fn update(&mut self, input: IndicatorInput<'_>) {
        self.push(input.price());
    }

    fn result(&self) -> IndicatorValue {
        self.value().map_or(IndicatorValue::Pending, IndicatorValue::Scalar)
    }
}

/// Exponential moving average, seeded with the SMA of the first `period` prices.
#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    k: f64,
    seed: Sma,
    value: Option<f64>,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "EMA period must be >= 1");
        Self {
            period,
            k: 2.0 / (period as f64 + 1.0),
            seed: Sma::new(period),
            value: None,
        }
    }

    pub fn from_params(params: &Params) -> Result<Box<dyn Indicator>> {
        Ok(Box::new(Self::new(param_period(params, "period", 10, 1)?)))
    }

    pub fn period(&self) -> usize {
        self.period
    }

    pub fn push(&mut self, price: f64) -> Option<f64> {
        self.value = match self.value {
            Some(prev) => Some(price * self.k + prev * (1.0 - self.k)),
            None => self.seed.push(price),
        };
        self.value
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }
}

impl Indicator for Ema {
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

/// SMA series over `data` (oldest first). One value per complete window.
pub fn sma_series(data: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || data.len() < period {
        return Vec::new();
    }
    data.windows(period)
        .map(|w| w.iter().sum::<f64>() / period as f64)
        .collect()
}

/// EMA series over `data` (oldest first), first value is the SMA seed.
pub fn ema_series(data: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || data.len() < period {
        return Vec::new();
    }
    let mut ema = Ema::new(period);
    data.iter().filter_map(|&p| ema.push(p)).collect()
}
