use tokio::sync::broadcast;
use tracing::info;

use common::{Recommendation, StrategyEvent};

/// Publishes strategy advice, suppressing repeats of the last recommendation.
pub struct Advisor {
    last: Option<Recommendation>,
    events: broadcast::Sender<StrategyEvent>,
}

impl Advisor {
    pub fn new(events: broadcast::Sender<StrategyEvent>) -> Self {
        Self { last: None, events }
    }

    /// Emit `position` unless it is empty or equal to the previous one.
    /// Returns whether an advice event was published.
    pub fn advice(&mut self, position: impl Into<Option<Recommendation>>) -> bool {
        let Some(position) = position.into() else {
            return false;
        };
        if self.last == Some(position) {
            return false;
        }
        self.last = Some(position);
        info!(recommendation = %position, "Emitting advice");
        // no subscribers is not an error
        let _ = self.events.send(StrategyEvent::Advice {
            recommendation: position,
        });
        true
    }

    pub fn last(&self) -> Option<Recommendation> {
        self.last
    }
}
