use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use common::{Candle, CandleField, Error, IndicatorValue, Result};

use crate::indicators::{self, Indicator, IndicatorInput, InputKind, Params};
use crate::providers::{AsyncIndicator, IndicatorSeries, Providers};

struct SyncSlot {
    name: String,
    indicator: Box<dyn Indicator>,
}

struct AsyncSlot {
    name: String,
    handle: Arc<dyn AsyncIndicator>,
    result: IndicatorValue,
}

/// The indicators declared by one strategy.
///
/// Registration is only possible until [`IndicatorSet::seal`] is called, which
/// the engine does right after the strategy's `init`. The number of
/// asynchronous slots therefore never changes once candles flow.
pub struct IndicatorSet {
    sync_slots: Vec<SyncSlot>,
    async_slots: Vec<AsyncSlot>,
    providers: Providers,
    sealed: bool,
}

impl IndicatorSet {
    pub fn new(providers: Providers) -> Self {
        Self {
            sync_slots: Vec::new(),
            async_slots: Vec::new(),
            providers,
            sealed: false,
        }
    }

    /// Register a synchronous indicator from the built-in catalog.
    pub fn add_indicator(&mut self, name: &str, kind: &str, params: &Params) -> Result<()> {
        self.ensure_open(name)?;
        let indicator = indicators::create(kind, params)?;
        info!(name, kind, input = ?indicator.input(), "Registered indicator");
        self.sync_slots.push(SyncSlot {
            name: name.to_string(),
            indicator,
        });
        Ok(())
    }

    /// Register an asynchronous indicator served by `provider`.
    pub fn add_async_indicator(
        &mut self,
        provider: &str,
        name: &str,
        kind: &str,
        params: &Params,
    ) -> Result<()> {
        self.ensure_open(name)?;
        let handle = self.providers.create(provider, kind, params)?;
        info!(name, kind, provider, "Registered async indicator");
        self.async_slots.push(AsyncSlot {
            name: name.to_string(),
            handle,
            result: IndicatorValue::Pending,
        });
        Ok(())
    }

    fn ensure_open(&self, name: &str) -> Result<()> {
        if self.sealed {
            return Err(Error::Config(format!(
                "indicator '{name}' registered after init; indicators can only be added in init"
            )));
        }
        if self.contains(name) {
            return Err(Error::Config(format!("indicator '{name}' is already registered")));
        }
        Ok(())
    }

    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sync_slots.iter().any(|s| s.name == name)
            || self.async_slots.iter().any(|s| s.name == name)
    }

    pub fn has_sync(&self) -> bool {
        !self.sync_slots.is_empty()
    }

    pub fn has_async(&self) -> bool {
        !self.async_slots.is_empty()
    }

    pub fn async_len(&self) -> usize {
        self.async_slots.len()
    }

    /// Feed one candle to every synchronous indicator, as a price or as the
    /// whole candle depending on its declared input.
    pub fn update_sync(&mut self, candle: &Candle, price_field: CandleField) {
        let price = candle.field(price_field);
        for slot in &mut self.sync_slots {
            let input = match slot.indicator.input() {
                InputKind::Price => IndicatorInput::Price(price),
                InputKind::Candle => IndicatorInput::Candle(candle),
            };
            slot.indicator.update(input);
        }
    }

    /// Handles for every asynchronous slot, in registration order.
    pub fn async_handles(&self) -> Vec<(String, Arc<dyn AsyncIndicator>)> {
        self.async_slots
            .iter()
            .map(|s| (s.name.clone(), s.handle.clone()))
            .collect()
    }

    pub fn set_async_result(&mut self, index: usize, value: IndicatorValue) {
        if let Some(slot) = self.async_slots.get_mut(index) {
            slot.result = value;
        }
    }

    /// Current result of the named indicator.
    pub fn get(&self, name: &str) -> Option<IndicatorValue> {
        if let Some(slot) = self.sync_slots.iter().find(|s| s.name == name) {
            return Some(slot.indicator.result());
        }
        self.async_slots
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.result.clone())
    }

    /// Results of every indicator, keyed by name.
    pub fn snapshot(&self) -> BTreeMap<String, IndicatorValue> {
        let sync = self
            .sync_slots
            .iter()
            .map(|s| (s.name.clone(), s.indicator.result()));
        let asynchronous = self
            .async_slots
            .iter()
            .map(|s| (s.name.clone(), s.result.clone()));
        sync.chain(asynchronous).collect()
    }
}

/// Reduce a computed series to its latest point: one field per output,
/// holding that output's last value.
pub fn last_values(series: IndicatorSeries) -> IndicatorValue {
    let fields: BTreeMap<String, f64> = series
        .into_iter()
        .filter_map(|(name, values)| values.last().map(|v| (name, *v)))
        .collect();
    if fields.is_empty() {
        IndicatorValue::Pending
    } else {
        IndicatorValue::Fields(fields)
    }
}
