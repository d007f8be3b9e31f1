use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{info, warn};

use common::{Candle, Error, Result, StrategyEvent};

use crate::tick::{TickDone, TickEngine};

/// Requests accepted by a running engine.
#[derive(Debug)]
pub enum EngineCommand {
    Tick {
        candle: Candle,
        done: oneshot::Sender<()>,
    },
    Finish {
        done: oneshot::Sender<()>,
    },
}

/// Cloneable handle for feeding a spawned [`TickEngine`].
#[derive(Clone)]
pub struct EngineHandle {
    command_tx: mpsc::Sender<EngineCommand>,
    events: broadcast::Sender<StrategyEvent>,
}

impl EngineHandle {
    /// Deliver one candle. Awaiting the returned signal gives a synchronous
    /// contract; not awaiting it is allowed, later candles are deferred.
    pub async fn tick(&self, candle: Candle) -> Result<TickDone> {
        let (done, signal) = TickDone::channel();
        self.command_tx
            .send(EngineCommand::Tick { candle, done })
            .await
            .map_err(|_| Error::EngineClosed)?;
        Ok(signal)
    }

    /// Ask the engine to finish and wait until the strategy's `end` has run.
    pub async fn finish(&self) -> Result<()> {
        let (done, signal) = TickDone::channel();
        self.command_tx
            .send(EngineCommand::Finish { done })
            .await
            .map_err(|_| Error::EngineClosed)?;
        signal.await
    }

    /// Subscribe to the strategy event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<StrategyEvent> {
        self.events.subscribe()
    }
}

impl TickEngine {
    /// Create the command channel for [`TickEngine::run`] and a handle to it.
    pub fn handle(&self, capacity: usize) -> (EngineHandle, mpsc::Receiver<EngineCommand>) {
        let (command_tx, command_rx) = mpsc::channel(capacity);
        let handle = EngineHandle {
            command_tx,
            events: self.events(),
        };
        (handle, command_rx)
    }

    /// Run the engine until the command channel closes and every in-flight
    /// candle has been admitted. Call from `tokio::spawn`.
    ///
    /// Returns the first asynchronous indicator failure, which ends the run.
    pub async fn run(mut self, mut commands: mpsc::Receiver<EngineCommand>) -> Result<()> {
        info!(strategy = %self.strategy_name(), "TickEngine running");
        let mut open = true;

        while open || self.in_flight_len() > 0 {
            tokio::select! {
                command = commands.recv(), if open => match command {
                    Some(EngineCommand::Tick { candle, done }) => self.submit(candle, done),
                    Some(EngineCommand::Finish { done }) => {
                        if let Err(e) = self.finish_with(done) {
                            warn!(error = %e, "Finish request rejected");
                        }
                    }
                    None => {
                        info!("Command channel closed, draining in-flight candles");
                        open = false;
                    }
                },
                Some(message) = self.next_completion() => self.on_completion(message)?,
                else => break,
            }
        }

        if !self.is_ended() {
            self.end();
        }
        Ok(())
    }
}
