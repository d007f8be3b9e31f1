#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::watch;

use common::{Candle, Error, HistorySnapshot, Recommendation, Result};
use strategy::indicators::Params;
use strategy::{
    AsyncIndicator, AsyncProvider, IndicatorSeries, IndicatorSet, Strategy, StrategyContext,
};

/// Candle number `i`: starts at minute `i`, closes at `i`.
pub fn candle(i: u64) -> Candle {
    let v = i as f64;
    Candle {
        start: Utc.timestamp_opt(i as i64 * 60, 0).unwrap(),
        open: v,
        high: v + 0.5,
        low: v - 0.5,
        close: v,
        volume: 1.0,
        vwp: v,
        trades: i,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Update(u64),
    /// Candle id, scalar of each sync indicator and the close each async
    /// indicator saw, in registration order.
    Check {
        id: u64,
        sync: Vec<Option<f64>>,
        asynchronous: Vec<Option<f64>>,
    },
    End,
}

pub type CallLog = Arc<Mutex<Vec<Call>>>;

/// Strategy that records every callback it receives.
pub struct Probe {
    pub log: CallLog,
    pub sync: Vec<(&'static str, &'static str, Params)>,
    pub asynchronous: Vec<(&'static str, &'static str)>,
    pub advice: Option<Recommendation>,
}

impl Probe {
    pub fn new() -> (Self, CallLog) {
        let log = CallLog::default();
        let probe = Self {
            log: log.clone(),
            sync: Vec::new(),
            asynchronous: Vec::new(),
            advice: None,
        };
        (probe, log)
    }

    pub fn with_sync(mut self, name: &'static str, kind: &'static str, period: i64) -> Self {
        let mut params = Params::new();
        params.insert("period".into(), toml::Value::Integer(period));
        self.sync.push((name, kind, params));
        self
    }

    pub fn with_async(mut self, provider: &'static str, name: &'static str) -> Self {
        self.asynchronous.push((provider, name));
        self
    }

    pub fn advising(mut self, position: Recommendation) -> Self {
        self.advice = Some(position);
        self
    }
}

impl Strategy for Probe {
    fn name(&self) -> &str {
        "probe"
    }

    fn init(&mut self, indicators: &mut IndicatorSet) -> Result<()> {
        for (name, kind, params) in &self.sync {
            indicators.add_indicator(name, kind, params)?;
        }
        for (provider, name) in &self.asynchronous {
            indicators.add_async_indicator(provider, name, "close", &Params::new())?;
        }
        Ok(())
    }

    fn update(&mut self, candle: &Candle, _ctx: &mut StrategyContext<'_>) {
        self.log.lock().unwrap().push(Call::Update(candle.trades));
    }

    fn check(&mut self, candle: &Candle, ctx: &mut StrategyContext<'_>) {
        let sync = self
            .sync
            .iter()
            .map(|(name, _, _)| ctx.indicator(name).and_then(|v| v.as_scalar()))
            .collect();
        let asynchronous = self
            .asynchronous
            .iter()
            .map(|(_, name)| ctx.indicator(name).and_then(|v| v.field("close")))
            .collect();
        self.log.lock().unwrap().push(Call::Check {
            id: candle.trades,
            sync,
            asynchronous,
        });
        if let Some(position) = self.advice {
            ctx.advice(position);
        }
    }

    fn end(&mut self, _ctx: &mut StrategyContext<'_>) {
        self.log.lock().unwrap().push(Call::End);
    }
}

pub fn calls(log: &CallLog) -> Vec<Call> {
    log.lock().unwrap().clone()
}

pub fn checked_ids(log: &CallLog) -> Vec<u64> {
    calls(log)
        .into_iter()
        .filter_map(|c| match c {
            Call::Check { id, .. } => Some(id),
            _ => None,
        })
        .collect()
}

#[derive(Debug, Default, Clone)]
struct GateState {
    all: bool,
    rows: BTreeSet<usize>,
}

/// Controls when a [`GatedProvider`]'s computations may finish. Requests are
/// identified by the row count of the snapshot they were issued with.
pub struct Gate {
    tx: watch::Sender<GateState>,
}

impl Gate {
    pub fn release(&self, rows: usize) {
        self.tx.send_modify(|s| {
            s.rows.insert(rows);
        });
    }

    pub fn open(&self) {
        self.tx.send_modify(|s| s.all = true);
    }

    /// Receivers still watching the gate: the provider, one per created
    /// indicator and one per computation still running.
    pub fn watchers(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Async provider whose single indicator type `close` echoes the close
/// column once its gate allows.
pub struct GatedProvider {
    name: &'static str,
    gate: watch::Receiver<GateState>,
    fail: bool,
}

impl GatedProvider {
    pub fn new(name: &'static str) -> (Arc<Self>, Gate) {
        let (tx, rx) = watch::channel(GateState::default());
        let provider = Arc::new(Self {
            name,
            gate: rx,
            fail: false,
        });
        (provider, Gate { tx })
    }

    pub fn open(name: &'static str) -> (Arc<Self>, Gate) {
        let (provider, gate) = Self::new(name);
        gate.open();
        (provider, gate)
    }

    pub fn failing(name: &'static str) -> (Arc<Self>, Gate) {
        let (tx, rx) = watch::channel(GateState {
            all: true,
            rows: BTreeSet::new(),
        });
        let provider = Arc::new(Self {
            name,
            gate: rx,
            fail: true,
        });
        (provider, Gate { tx })
    }
}

impl AsyncProvider for GatedProvider {
    fn name(&self) -> &str {
        self.name
    }

    fn catalog(&self) -> Vec<&'static str> {
        vec!["close"]
    }

    fn create(&self, kind: &str, _params: &Params) -> Result<Arc<dyn AsyncIndicator>> {
        if kind != "close" {
            return Err(Error::Config(format!("unknown kind {kind}")));
        }
        Ok(Arc::new(GatedIndicator {
            gate: self.gate.clone(),
            fail: self.fail,
        }))
    }
}

struct GatedIndicator {
    gate: watch::Receiver<GateState>,
    fail: bool,
}

#[async_trait]
impl AsyncIndicator for GatedIndicator {
    async fn run(&self, history: Arc<HistorySnapshot>) -> Result<IndicatorSeries, String> {
        let rows = history.len();
        let mut gate = self.gate.clone();
        let released = gate
            .wait_for(|s| s.all || s.rows.contains(&rows))
            .await
            .is_ok();
        if !released {
            return Err("gate dropped".into());
        }
        if self.fail {
            return Err("boom".into());
        }
        let mut out = IndicatorSeries::new();
        out.insert("close".into(), history.close.clone());
        Ok(out)
    }
}
