use tracing::debug;

use common::{Candle, Error, Recommendation, Result};

use crate::config::StrategyConfig;
use crate::indicators::{param_f64, param_period, Params};
use crate::providers::WINDOW;
use crate::{IndicatorSet, Strategy, StrategyContext};

/// Strategy types that [`build_strategy`] understands.
pub const KNOWN_STRATEGIES: &[&str] = &["rsi", "macd"];

/// Build a strategy instance from its config entry.
pub fn build_strategy(cfg: &StrategyConfig) -> Result<Box<dyn Strategy>> {
    match cfg.strategy_type.as_str() {
        "rsi" => Ok(Box::new(RsiStrategy::new(cfg)?)),
        "macd" => Ok(Box::new(MacdStrategy::new(cfg)?)),
        other => Err(Error::Config(format!(
            "unknown strategy type '{other}', expected one of {KNOWN_STRATEGIES:?}"
        ))),
    }
}

// ─── Concrete strategy types ──────────────────────────────────────────────────

/// Mean reversion on a synchronous RSI: long when oversold, short when overbought.
struct RsiStrategy {
    name: String,
    period: usize,
    overbought: f64,
    oversold: f64,
}

impl RsiStrategy {
    fn new(cfg: &StrategyConfig) -> Result<Self> {
        let overbought = param_f64(&cfg.params, "overbought", 70.0);
        let oversold = param_f64(&cfg.params, "oversold", 30.0);
        if oversold >= overbought {
            return Err(Error::Config(format!(
                "RSI oversold ({oversold}) must be below overbought ({overbought})"
            )));
        }
        Ok(Self {
            name: cfg.name.clone(),
            period: param_period(&cfg.params, "period", 14, 2)?,
            overbought,
            oversold,
        })
    }
}

impl Strategy for RsiStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&mut self, indicators: &mut IndicatorSet) -> Result<()> {
        let mut params = Params::new();
        params.insert("period".into(), toml::Value::Integer(self.period as i64));
        indicators.add_indicator("rsi", "rsi", &params)
    }

    fn check(&mut self, candle: &Candle, ctx: &mut StrategyContext<'_>) {
        let Some(rsi) = ctx.indicator("rsi").and_then(|v| v.as_scalar()) else {
            return;
        };
        debug!(strategy = %self.name, start = %candle.start, rsi, "RSI check");

        if rsi <= self.oversold {
            ctx.advice(Recommendation::Long);
        } else if rsi >= self.overbought {
            ctx.advice(Recommendation::Short);
        }
    }
}

/// MACD histogram momentum from an asynchronous provider, filtered by a
/// synchronous EMA trend line.
struct MacdStrategy {
    name: String,
    provider: String,
    macd_params: Params,
    trend_period: usize,
    threshold: f64,
}

impl MacdStrategy {
    fn new(cfg: &StrategyConfig) -> Result<Self> {
        let provider = cfg
            .params
            .get("provider")
            .and_then(|v| v.as_str())
            .unwrap_or(WINDOW)
            .to_string();

        let mut macd_params = Params::new();
        for key in ["fast", "slow", "signal", "field"] {
            if let Some(v) = cfg.params.get(key) {
                macd_params.insert(key.to_string(), v.clone());
            }
        }

        Ok(Self {
            name: cfg.name.clone(),
            provider,
            macd_params,
            trend_period: param_period(&cfg.params, "trend", 50, 1)?,
            threshold: param_f64(&cfg.params, "threshold", 0.0).abs(),
        })
    }
}

impl Strategy for MacdStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&mut self, indicators: &mut IndicatorSet) -> Result<()> {
        indicators.add_async_indicator(&self.provider, "macd", "macd", &self.macd_params)?;

        let mut trend = Params::new();
        trend.insert("period".into(), toml::Value::Integer(self.trend_period as i64));
        indicators.add_indicator("trend", "ema", &trend)
    }

    fn check(&mut self, candle: &Candle, ctx: &mut StrategyContext<'_>) {
        let Some(histogram) = ctx.indicator("macd").and_then(|v| v.field("histogram")) else {
            return;
        };
        let Some(trend) = ctx.indicator("trend").and_then(|v| v.as_scalar()) else {
            return;
        };
        debug!(strategy = %self.name, start = %candle.start, histogram, trend, "MACD check");

        if histogram > self.threshold && candle.close > trend {
            ctx.advice(Recommendation::Long);
        } else if histogram < -self.threshold && candle.close < trend {
            ctx.advice(Recommendation::Short);
        }
    }
}
