pub mod advice;
pub mod config;
pub mod indicators;
pub mod providers;
pub mod registry;
pub mod slots;

pub use advice::Advisor;
pub use config::{StrategyConfig, StrategyFileConfig};
pub use providers::{AsyncIndicator, AsyncProvider, IndicatorSeries, Providers};
pub use registry::build_strategy;
pub use slots::IndicatorSet;

use common::{Candle, IndicatorValue, Recommendation, Result};

/// All strategy implementations must satisfy this trait.
///
/// `init` runs once, before the first candle, and is the only place where
/// indicators may be registered. `update` runs on every admitted candle;
/// `check` only once warmup has completed.
pub trait Strategy: Send {
    /// Human-readable name of this strategy instance.
    fn name(&self) -> &str;

    fn init(&mut self, indicators: &mut IndicatorSet) -> Result<()>;

    fn update(&mut self, _candle: &Candle, _ctx: &mut StrategyContext<'_>) {}

    fn check(&mut self, candle: &Candle, ctx: &mut StrategyContext<'_>);

    /// Called once after the last candle has been fully processed.
    fn end(&mut self, _ctx: &mut StrategyContext<'_>) {}
}

/// What a strategy callback can see and do.
pub struct StrategyContext<'a> {
    indicators: &'a IndicatorSet,
    advisor: &'a mut Advisor,
    age: u64,
}

impl<'a> StrategyContext<'a> {
    pub fn new(indicators: &'a IndicatorSet, advisor: &'a mut Advisor, age: u64) -> Self {
        Self {
            indicators,
            advisor,
            age,
        }
    }

    /// Current result of a registered indicator.
    pub fn indicator(&self, name: &str) -> Option<IndicatorValue> {
        self.indicators.get(name)
    }

    /// Candles admitted into the pipeline so far.
    pub fn age(&self) -> u64 {
        self.age
    }

    /// Recommend a position. Repeats of the previous recommendation are dropped.
    pub fn advice(&mut self, position: impl Into<Option<Recommendation>>) -> bool {
        self.advisor.advice(position)
    }
}
