use std::collections::VecDeque;

use common::{Candle, HistorySnapshot};

/// Capacity-bounded columnar store of recent candles.
///
/// The seven columns always have equal length, never above `capacity`.
/// Only populated when the strategy has asynchronous indicators.
#[derive(Debug, Clone)]
pub struct RollingHistory {
    capacity: usize,
    open: VecDeque<f64>,
    high: VecDeque<f64>,
    low: VecDeque<f64>,
    close: VecDeque<f64>,
    volume: VecDeque<f64>,
    vwp: VecDeque<f64>,
    trades: VecDeque<f64>,
}

impl RollingHistory {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 1, "history capacity must be >= 1");
        let column = || VecDeque::with_capacity(capacity + 1);
        Self {
            capacity,
            open: column(),
            high: column(),
            low: column(),
            close: column(),
            volume: column(),
            vwp: column(),
            trades: column(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.close.len()
    }

    pub fn is_empty(&self) -> bool {
        self.close.is_empty()
    }

    /// Append one candle, evicting the oldest row once above capacity.
    pub fn push(&mut self, candle: &Candle) {
        self.open.push_back(candle.open);
        self.high.push_back(candle.high);
        self.low.push_back(candle.low);
        self.close.push_back(candle.close);
        self.volume.push_back(candle.volume);
        self.vwp.push_back(candle.vwp);
        self.trades.push_back(candle.trades as f64);

        if self.close.len() > self.capacity {
            self.open.pop_front();
            self.high.pop_front();
            self.low.pop_front();
            self.close.pop_front();
            self.volume.pop_front();
            self.vwp.pop_front();
            self.trades.pop_front();
        }
    }

    /// Copy the current columns into an immutable snapshot.
    pub fn snapshot(&self) -> HistorySnapshot {
        HistorySnapshot {
            open: self.open.iter().copied().collect(),
            high: self.high.iter().copied().collect(),
            low: self.low.iter().copied().collect(),
            close: self.close.iter().copied().collect(),
            volume: self.volume.iter().copied().collect(),
            vwp: self.vwp.iter().copied().collect(),
            trades: self.trades.iter().copied().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn candle(i: u64) -> Candle {
        let v = i as f64;
        Candle {
            start: Utc.timestamp_opt(i as i64 * 60, 0).unwrap(),
            open: v,
            high: v + 1.0,
            low: v - 1.0,
            close: v + 0.5,
            volume: v * 10.0,
            vwp: v + 0.25,
            trades: i,
        }
    }

    #[test]
    fn evicts_oldest_on_overflow() {
        let mut history = RollingHistory::new(3);
        assert!(history.is_empty());
        assert_eq!(history.capacity(), 3);
        for i in 1..=5 {
            history.push(&candle(i));
        }
        assert_eq!(history.len(), 3);
        let snapshot = history.snapshot();
        assert_eq!(snapshot.open, vec![3.0, 4.0, 5.0]);
        assert_eq!(snapshot.trades, vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn columns_stay_aligned() {
        let mut history = RollingHistory::new(2);
        for i in 1..=4 {
            history.push(&candle(i));
        }
        let s = history.snapshot();
        for column in [&s.open, &s.high, &s.low, &s.close, &s.volume, &s.vwp, &s.trades] {
            assert_eq!(column.len(), 2);
        }
        assert_eq!(s.close, vec![3.5, 4.5]);
        assert_eq!(s.vwp, vec![3.25, 4.25]);
    }

    #[test]
    fn snapshot_is_detached_from_later_pushes() {
        let mut history = RollingHistory::new(2);
        history.push(&candle(1));
        let before = history.snapshot();
        history.push(&candle(2));
        history.push(&candle(3));
        assert_eq!(before.open, vec![1.0]);
    }
}
