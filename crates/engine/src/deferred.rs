use std::collections::VecDeque;

use common::Candle;

/// FIFO of candles that arrived while an earlier candle was still waiting on
/// its asynchronous indicators. Unbounded.
#[derive(Debug, Default)]
pub struct DeferredTicks {
    queue: VecDeque<Candle>,
}

impl DeferredTicks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, candle: Candle) {
        self.queue.push_back(candle);
    }

    pub fn pop(&mut self) -> Option<Candle> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }
}
