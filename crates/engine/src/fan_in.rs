use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::debug;

use common::{HistorySnapshot, IndicatorValue};
use strategy::{AsyncIndicator, IndicatorSeries};

/// Result of one asynchronous indicator request.
#[derive(Debug)]
pub struct FanInMessage {
    /// Candle sequence number the request was issued for.
    pub ticket: u64,
    /// Index of the asynchronous slot.
    pub slot: usize,
    pub indicator: String,
    pub outcome: Result<IndicatorSeries, String>,
}

/// Countdown barrier for a single candle: one result per asynchronous slot.
///
/// Results may arrive in any order; the barrier opens only once every slot
/// has reported.
#[derive(Debug)]
pub struct FanIn {
    remaining: usize,
    results: Vec<Option<IndicatorValue>>,
}

impl FanIn {
    pub fn new(expected: usize) -> Self {
        Self {
            remaining: expected,
            results: vec![None; expected],
        }
    }

    /// Record the result of `slot`. A second report for the same slot is
    /// ignored. Returns whether every slot has now reported.
    pub fn record(&mut self, slot: usize, value: IndicatorValue) -> bool {
        if let Some(entry) = self.results.get_mut(slot) {
            if entry.is_none() {
                *entry = Some(value);
                self.remaining -= 1;
            }
        }
        self.is_complete()
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }

    pub fn is_complete(&self) -> bool {
        self.remaining == 0
    }

    /// Results in slot order. Only meaningful once complete.
    pub fn into_results(self) -> impl Iterator<Item = (usize, IndicatorValue)> {
        self.results
            .into_iter()
            .enumerate()
            .filter_map(|(slot, value)| value.map(|v| (slot, v)))
    }
}

/// Issue one request per asynchronous indicator against `history`, each on
/// its own task. Outcomes come back on `tx` tagged with `ticket`. The
/// returned handles cancel the tasks.
pub fn dispatch(
    ticket: u64,
    handles: Vec<(String, Arc<dyn AsyncIndicator>)>,
    history: Arc<HistorySnapshot>,
    tx: &mpsc::UnboundedSender<FanInMessage>,
) -> Vec<AbortHandle> {
    let requests = handles.len();
    debug!(ticket, requests, rows = history.len(), "Dispatching async indicators");
    let mut tasks = Vec::with_capacity(requests);
    for (slot, (indicator, handle)) in handles.into_iter().enumerate() {
        let history = history.clone();
        let tx = tx.clone();
        let task = tokio::spawn(async move {
            let outcome = handle.run(history).await;
            // receiver gone means the engine was dropped
            let _ = tx.send(FanInMessage {
                ticket,
                slot,
                indicator,
                outcome,
            });
        });
        tasks.push(task.abort_handle());
    }
    tasks
}
