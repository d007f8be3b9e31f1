use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};

use chrono::Utc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};

use common::{AdvisorConfig, Candle, CandleField, Error, IndicatorValue, Result, StrategyEvent};
use strategy::indicators::Params;
use strategy::slots::last_values;
use strategy::{Advisor, IndicatorSet, Providers, Strategy, StrategyContext};

use crate::deferred::DeferredTicks;
use crate::fan_in::{self, FanIn, FanInMessage};
use crate::history::RollingHistory;
use crate::warmup::WarmupGate;

/// Completion signal for one submitted candle or finish request.
///
/// Resolves to `Err(Error::EngineClosed)` if the engine stops before firing it.
#[derive(Debug)]
pub struct TickDone {
    rx: oneshot::Receiver<()>,
    fired: bool,
}

impl TickDone {
    pub fn channel() -> (oneshot::Sender<()>, TickDone) {
        let (tx, rx) = oneshot::channel();
        (tx, TickDone { rx, fired: false })
    }

    /// Whether the signal has already fired, without waiting.
    pub fn is_done(&mut self) -> bool {
        if !self.fired {
            self.fired = self.rx.try_recv().is_ok();
        }
        self.fired
    }
}

impl Future for TickDone {
    type Output = Result<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.fired {
            return Poll::Ready(Ok(()));
        }
        let outcome = ready!(Pin::new(&mut self.rx).poll(cx));
        self.fired = outcome.is_ok();
        Poll::Ready(outcome.map_err(|_| Error::EngineClosed))
    }
}

/// A candle whose asynchronous indicators are still computing.
struct PendingTick {
    candle: Candle,
    /// Value of `age` once this candle was admitted into the pipeline.
    age: u64,
    fan_in: FanIn,
    tasks: Vec<AbortHandle>,
    done: Option<oneshot::Sender<()>>,
}

/// Drives one strategy over a stream of candles.
///
/// Synchronous indicators are updated inline. When the strategy also has
/// asynchronous indicators, each candle fans out one request per indicator
/// and the strategy callbacks for that candle run once all of them have
/// reported. Callbacks always run in candle arrival order.
pub struct TickEngine {
    strategy: Box<dyn Strategy>,
    indicators: IndicatorSet,
    advisor: Advisor,
    history: RollingHistory,
    gate: WarmupGate,
    deferred: DeferredTicks,
    price_field: CandleField,
    /// Candles admitted into the pipeline.
    age: u64,
    /// Candles whose strategy callbacks have completed.
    processed_ticks: u64,
    next_ticket: u64,
    in_flight: BTreeMap<u64, PendingTick>,
    completions_tx: mpsc::UnboundedSender<FanInMessage>,
    completions_rx: mpsc::UnboundedReceiver<FanInMessage>,
    events: broadcast::Sender<StrategyEvent>,
    finish: Option<oneshot::Sender<()>>,
    ended: bool,
    /// Set by a failed computation. No candle is accepted afterwards.
    aborted: bool,
}

impl TickEngine {
    /// Run the strategy's `init`, then close indicator registration.
    pub fn new(
        mut strategy: Box<dyn Strategy>,
        config: &AdvisorConfig,
        providers: Providers,
    ) -> Result<Self> {
        if config.history_size == 0 {
            return Err(Error::Config("history_size must be at least 1".into()));
        }
        if config.event_buffer == 0 {
            return Err(Error::Config("event_buffer must be at least 1".into()));
        }

        let mut indicators = IndicatorSet::new(providers);
        strategy.init(&mut indicators)?;
        indicators.seal();

        let start_time = config.start_time.unwrap_or_else(Utc::now);
        let (events, _) = broadcast::channel(config.event_buffer);
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();

        info!(
            strategy = %strategy.name(),
            sync_indicators = indicators.has_sync(),
            async_indicators = indicators.async_len(),
            required_history = config.required_history,
            mode = %config.mode,
            "Strategy initialized"
        );

        Ok(Self {
            strategy,
            indicators,
            advisor: Advisor::new(events.clone()),
            history: RollingHistory::new(config.history_size),
            gate: WarmupGate::from_config(config, start_time),
            deferred: DeferredTicks::new(),
            price_field: config.price_field,
            age: 0,
            processed_ticks: 0,
            next_ticket: 0,
            in_flight: BTreeMap::new(),
            completions_tx,
            completions_rx,
            events,
            finish: None,
            ended: false,
            aborted: false,
        })
    }

    /// Always fails: indicators can only be registered during `init`.
    pub fn add_indicator(&mut self, name: &str, kind: &str, params: &Params) -> Result<()> {
        self.indicators.add_indicator(name, kind, params)
    }

    /// Always fails: indicators can only be registered during `init`.
    pub fn add_async_indicator(
        &mut self,
        provider: &str,
        name: &str,
        kind: &str,
        params: &Params,
    ) -> Result<()> {
        self.indicators.add_async_indicator(provider, name, kind, params)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StrategyEvent> {
        self.events.subscribe()
    }

    pub(crate) fn events(&self) -> broadcast::Sender<StrategyEvent> {
        self.events.clone()
    }

    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }

    pub fn age(&self) -> u64 {
        self.age
    }

    pub fn processed_ticks(&self) -> u64 {
        self.processed_ticks
    }

    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn warmup_completed(&self) -> bool {
        self.gate.is_complete()
    }

    pub fn indicator(&self, name: &str) -> Option<IndicatorValue> {
        self.indicators.get(name)
    }

    /// Submit one candle. The returned signal fires once the candle's
    /// callbacks have run, or immediately if the candle was deferred.
    pub fn tick(&mut self, candle: Candle) -> TickDone {
        let (tx, done) = TickDone::channel();
        self.submit(candle, tx);
        done
    }

    /// Like [`TickEngine::tick`], with a caller-provided completion sender.
    pub fn submit(&mut self, candle: Candle, done: oneshot::Sender<()>) {
        if self.aborted {
            // dropping `done` resolves the caller's signal to EngineClosed
            warn!(start = %candle.start, "Candle rejected, engine aborted");
            return;
        }
        if self.should_defer() {
            debug!(
                start = %candle.start,
                age = self.age,
                processed = self.processed_ticks,
                "Deferring candle until async indicators catch up"
            );
            self.deferred.push(candle);
            let _ = done.send(());
            return;
        }
        self.advance(candle, Some(done));
    }

    /// Synchronous indicators must not run ahead of what the strategy has seen
    /// while an asynchronous result for an older window is outstanding.
    fn should_defer(&self) -> bool {
        self.indicators.has_async()
            && self.indicators.has_sync()
            && (self.age != self.processed_ticks || !self.deferred.is_empty())
    }

    fn advance(&mut self, candle: Candle, done: Option<oneshot::Sender<()>>) {
        self.age += 1;

        if self.indicators.has_async() {
            self.history.push(&candle);
        }

        self.indicators.update_sync(&candle, self.price_field);

        if !self.indicators.has_async() {
            self.admit(&candle, self.age);
            if let Some(done) = done {
                let _ = done.send(());
            }
            self.after_admission();
            return;
        }

        let ticket = self.next_ticket;
        self.next_ticket += 1;
        let snapshot = Arc::new(self.history.snapshot());
        let tasks = fan_in::dispatch(
            ticket,
            self.indicators.async_handles(),
            snapshot,
            &self.completions_tx,
        );
        self.in_flight.insert(
            ticket,
            PendingTick {
                candle,
                age: self.age,
                fan_in: FanIn::new(self.indicators.async_len()),
                tasks,
                done,
            },
        );
    }

    /// Wait for the next asynchronous indicator result and process it.
    /// Returns immediately when nothing is in flight.
    pub async fn process_next_completion(&mut self) -> Result<()> {
        if self.in_flight.is_empty() {
            return Ok(());
        }
        match self.completions_rx.recv().await {
            Some(message) => self.on_completion(message),
            None => Err(Error::EngineClosed),
        }
    }

    /// Process completions until no candle is waiting on async indicators.
    pub async fn drain(&mut self) -> Result<()> {
        while !self.in_flight.is_empty() {
            self.process_next_completion().await?;
        }
        Ok(())
    }

    pub(crate) async fn next_completion(&mut self) -> Option<FanInMessage> {
        self.completions_rx.recv().await
    }

    /// Record one asynchronous result. A failed computation aborts the run.
    pub fn on_completion(&mut self, message: FanInMessage) -> Result<()> {
        let FanInMessage {
            ticket,
            slot,
            indicator,
            outcome,
        } = message;

        if self.aborted {
            debug!(%indicator, ticket, "Result after abort ignored");
            return Ok(());
        }

        let series = match outcome {
            Ok(series) => series,
            Err(message) => {
                error!(%indicator, ticket, %message, "Async indicator failed, aborting run");
                self.abort();
                return Err(Error::Computation { indicator, message });
            }
        };

        let Some(pending) = self.in_flight.get_mut(&ticket) else {
            warn!(%indicator, ticket, "Result for unknown candle ignored");
            return Ok(());
        };
        pending.fan_in.record(slot, last_values(series));
        let remaining = pending.fan_in.remaining();
        debug!(%indicator, ticket, remaining, "Async indicator reported");

        self.release_ready();
        Ok(())
    }

    /// Admit completed candles in ticket order; a finished later candle waits
    /// for every earlier one.
    fn release_ready(&mut self) {
        while let Some(entry) = self.in_flight.first_entry() {
            if !entry.get().fan_in.is_complete() {
                break;
            }
            let pending = entry.remove();
            for (slot, value) in pending.fan_in.into_results() {
                self.indicators.set_async_result(slot, value);
            }
            self.admit(&pending.candle, pending.age);
            if let Some(done) = pending.done {
                let _ = done.send(());
            }
            self.after_admission();
        }
    }

    /// Run the strategy callbacks for a candle whose indicators are final.
    /// `age` is the candle's own position in the stream, which trails
    /// `self.age` while later candles are in flight.
    fn admit(&mut self, candle: &Candle, age: u64) {
        self.processed_ticks += 1;

        let mut ctx = StrategyContext::new(&self.indicators, &mut self.advisor, age);
        self.strategy.update(candle, &mut ctx);

        if self.gate.observe(age, candle) {
            info!(
                strategy = %self.strategy.name(),
                start = %candle.start,
                "Strategy warmup completed"
            );
            let _ = self.events.send(StrategyEvent::WarmupCompleted {
                start: candle.start,
            });
        }

        if self.gate.is_complete() {
            debug!(start = %candle.start, close = candle.close, "Checking candle");
            let mut ctx = StrategyContext::new(&self.indicators, &mut self.advisor, age);
            self.strategy.check(candle, &mut ctx);
        }

        let _ = self.events.send(StrategyEvent::Update {
            date: candle.start,
            indicators: self.indicators.snapshot(),
        });
    }

    /// Replay at most one deferred candle, then finish if fully drained.
    fn after_admission(&mut self) {
        if let Some(next) = self.deferred.pop() {
            debug!(start = %next.start, left = self.deferred.len(), "Replaying deferred candle");
            self.advance(next, None);
        }
        self.complete_finish_if_drained();
    }

    fn is_drained(&self) -> bool {
        self.age == self.processed_ticks && self.deferred.is_empty()
    }

    fn complete_finish_if_drained(&mut self) {
        if !self.is_drained() {
            return;
        }
        if let Some(done) = self.finish.take() {
            self.end();
            let _ = done.send(());
        }
    }

    /// Request teardown. `end` runs immediately when nothing is outstanding,
    /// otherwise once the last in-flight and deferred candle has been admitted.
    pub fn finish(&mut self) -> Result<TickDone> {
        let (tx, done) = TickDone::channel();
        self.finish_with(tx)?;
        Ok(done)
    }

    pub fn finish_with(&mut self, done: oneshot::Sender<()>) -> Result<()> {
        if self.aborted {
            return Err(Error::EngineClosed);
        }
        if self.finish.is_some() {
            return Err(Error::FinishPending);
        }
        if !self.indicators.has_async() || self.is_drained() {
            self.end();
            let _ = done.send(());
            return Ok(());
        }
        info!(
            in_flight = self.in_flight.len(),
            deferred = self.deferred.len(),
            "Finish requested, waiting for pending candles"
        );
        self.finish = Some(done);
        Ok(())
    }

    pub(crate) fn is_ended(&self) -> bool {
        self.ended
    }

    pub(crate) fn end(&mut self) {
        if self.ended {
            return;
        }
        self.ended = true;
        let mut ctx = StrategyContext::new(&self.indicators, &mut self.advisor, self.age);
        self.strategy.end(&mut ctx);
        info!(
            strategy = %self.strategy.name(),
            candles = self.processed_ticks,
            "Strategy finished"
        );
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Cancel outstanding computations and drop every completion signal
    /// after a fatal error.
    fn abort(&mut self) {
        self.aborted = true;
        for pending in self.in_flight.values() {
            for task in &pending.tasks {
                task.abort();
            }
        }
        self.in_flight.clear();
        self.deferred.clear();
        self.finish = None;
    }
}
