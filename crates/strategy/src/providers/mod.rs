pub mod window;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use common::{Error, HistorySnapshot, Result};

use crate::indicators::Params;

pub use window::WindowProvider;

/// Named output sequences of one asynchronous computation, oldest first.
pub type IndicatorSeries = BTreeMap<String, Vec<f64>>;

/// Handle to one asynchronous indicator instance.
///
/// `run` receives an immutable snapshot of the rolling history and returns
/// its full output sequences; the engine keeps the last value of each.
#[async_trait]
pub trait AsyncIndicator: Send + Sync {
    async fn run(&self, history: Arc<HistorySnapshot>) -> Result<IndicatorSeries, String>;
}

/// A family of asynchronous indicators, usually backed by an external library.
pub trait AsyncProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Indicator types this provider can create.
    fn catalog(&self) -> Vec<&'static str>;

    fn create(&self, kind: &str, params: &Params) -> Result<Arc<dyn AsyncIndicator>>;
}

/// Provider id of the built-in window provider.
pub const WINDOW: &str = "window";
/// Provider id reserved for an externally linked native library.
pub const NATIVE: &str = "native";

enum ProviderSlot {
    Available(Arc<dyn AsyncProvider>),
    Unavailable(String),
}

/// Asynchronous providers known to an engine, keyed by id.
pub struct Providers {
    slots: HashMap<String, ProviderSlot>,
}

impl Default for Providers {
    /// The built-in window provider plus an unavailable native slot.
    fn default() -> Self {
        let mut providers = Self::empty();
        providers.install(Arc::new(WindowProvider));
        providers.mark_unavailable(NATIVE, "no native indicator library linked");
        providers
    }
}

impl Providers {
    pub fn empty() -> Self {
        Self {
            slots: HashMap::new(),
        }
    }

    /// Register a provider under its own name, replacing any previous entry.
    pub fn install(&mut self, provider: Arc<dyn AsyncProvider>) -> &mut Self {
        self.slots
            .insert(provider.name().to_string(), ProviderSlot::Available(provider));
        self
    }

    /// Record that a provider failed to load. Registrations against it fail.
    pub fn mark_unavailable(&mut self, name: &str, reason: impl Into<String>) -> &mut Self {
        let reason = reason.into();
        warn!(provider = name, %reason, "Indicator provider unavailable");
        self.slots
            .insert(name.to_string(), ProviderSlot::Unavailable(reason));
        self
    }

    pub fn is_available(&self, name: &str) -> bool {
        matches!(self.slots.get(name), Some(ProviderSlot::Available(_)))
    }

    /// Create an indicator through the named provider, validating the type
    /// against its catalog.
    pub fn create(
        &self,
        provider: &str,
        kind: &str,
        params: &Params,
    ) -> Result<Arc<dyn AsyncIndicator>> {
        let provider = match self.slots.get(provider) {
            Some(ProviderSlot::Available(p)) => p,
            Some(ProviderSlot::Unavailable(reason)) => {
                return Err(Error::Config(format!(
                    "indicator provider '{provider}' is not enabled: {reason}"
                )))
            }
            None => {
                return Err(Error::Config(format!(
                    "unknown indicator provider '{provider}'"
                )))
            }
        };
        if !provider.catalog().contains(&kind) {
            return Err(Error::Config(format!(
                "provider '{}' does not know the indicator '{kind}'",
                provider.name()
            )));
        }
        provider.create(kind, params)
    }
}
