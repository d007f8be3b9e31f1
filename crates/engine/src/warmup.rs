use chrono::{DateTime, Utc};

use common::{AdvisorConfig, Candle, TradingMode};

/// Decides when enough history has been seen for `check` to run.
///
/// The transition to complete happens at most once and never reverts.
#[derive(Debug, Clone)]
pub struct WarmupGate {
    required: u64,
    /// Realtime only: candles starting before this instant are backfill and
    /// do not complete warmup.
    earliest_start: Option<DateTime<Utc>>,
    completed: bool,
}

impl WarmupGate {
    pub fn new(required: u64, earliest_start: Option<DateTime<Utc>>) -> Self {
        Self {
            required,
            earliest_start,
            completed: false,
        }
    }

    /// In realtime mode the cutoff is one candle interval before `start_time`.
    pub fn from_config(cfg: &AdvisorConfig, start_time: DateTime<Utc>) -> Self {
        let earliest_start = match cfg.mode {
            TradingMode::Realtime => Some(start_time - cfg.candle_interval()),
            TradingMode::Backtest => None,
        };
        Self::new(cfg.required_history, earliest_start)
    }

    /// Feed the gate the current age and candle. Returns `true` only on the
    /// call that completes warmup.
    pub fn observe(&mut self, age: u64, candle: &Candle) -> bool {
        if self.completed {
            return false;
        }
        let premature = self
            .earliest_start
            .is_some_and(|earliest| candle.start < earliest);
        if age >= self.required && !premature {
            self.completed = true;
            return true;
        }
        false
    }

    pub fn is_complete(&self) -> bool {
        self.completed
    }

    pub fn required(&self) -> u64 {
        self.required
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn candle_at(minute: i64) -> Candle {
        Candle {
            start: Utc.timestamp_opt(minute * 60, 0).unwrap(),
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: 1.0,
            volume: 1.0,
            vwp: 1.0,
            trades: 1,
        }
    }

    #[test]
    fn completes_once_required_history_reached() {
        let mut gate = WarmupGate::new(3, None);
        assert_eq!(gate.required(), 3);
        assert!(!gate.observe(1, &candle_at(1)));
        assert!(!gate.observe(2, &candle_at(2)));
        assert!(gate.observe(3, &candle_at(3)));
        assert!(gate.is_complete());
        // fires exactly once
        assert!(!gate.observe(4, &candle_at(4)));
        assert!(gate.is_complete());
    }

    #[test]
    fn zero_required_completes_on_first_candle() {
        let mut gate = WarmupGate::new(0, None);
        assert!(gate.observe(1, &candle_at(0)));
    }

    #[test]
    fn realtime_backfill_is_premature() {
        let start = Utc.timestamp_opt(100 * 60, 0).unwrap();
        let cfg = AdvisorConfig {
            required_history: 2,
            mode: TradingMode::Realtime,
            candle_size: 5,
            ..AdvisorConfig::default()
        };
        let mut gate = WarmupGate::from_config(&cfg, start);
        // enough history, but candle starts before start - 5m
        assert!(!gate.observe(10, &candle_at(90)));
        assert!(!gate.observe(11, &candle_at(94)));
        // exactly at the cutoff is accepted
        assert!(gate.observe(12, &candle_at(95)));
    }

    #[test]
    fn backtest_ignores_start_time() {
        let cfg = AdvisorConfig {
            required_history: 1,
            ..AdvisorConfig::default()
        };
        let mut gate = WarmupGate::from_config(&cfg, Utc.timestamp_opt(1_000_000, 0).unwrap());
        assert!(gate.observe(1, &candle_at(0)));
    }
}
