use std::sync::Arc;

use async_trait::async_trait;

use common::{CandleField, Error, HistorySnapshot, Result};

use super::{AsyncIndicator, AsyncProvider, IndicatorSeries};
use crate::indicators::average::{ema_series, sma_series};
use crate::indicators::macd::{macd_periods, macd_series};
use crate::indicators::rsi::rsi_series;
use crate::indicators::{param_field, param_period, Params};

/// Built-in provider that recomputes indicators over the whole history window
/// on tokio's blocking pool.
pub struct WindowProvider;

impl AsyncProvider for WindowProvider {
    fn name(&self) -> &str {
        super::WINDOW
    }

    fn catalog(&self) -> Vec<&'static str> {
        vec!["sma", "ema", "rsi", "macd"]
    }

    fn create(&self, kind: &str, params: &Params) -> Result<Arc<dyn AsyncIndicator>> {
        let field = param_field(params, "field", CandleField::Close)?;
        let study = match kind {
            "sma" => Study::Sma(param_period(params, "period", 10, 1)?),
            "ema" => Study::Ema(param_period(params, "period", 10, 1)?),
            "rsi" => Study::Rsi(param_period(params, "period", 14, 2)?),
            "macd" => {
                let (fast, slow, signal) = macd_periods(params)?;
                Study::Macd { fast, slow, signal }
            }
            other => {
                return Err(Error::Config(format!(
                    "window provider does not know the indicator '{other}'"
                )))
            }
        };
        Ok(Arc::new(WindowIndicator { study, field }))
    }
}

#[derive(Debug, Clone, Copy)]
enum Study {
    Sma(usize),
    Ema(usize),
    Rsi(usize),
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
}

struct WindowIndicator {
    study: Study,
    field: CandleField,
}

impl WindowIndicator {
    fn compute(study: Study, data: &[f64]) -> IndicatorSeries {
        let mut out = IndicatorSeries::new();
        match study {
            Study::Sma(period) => {
                out.insert("result".into(), sma_series(data, period));
            }
            Study::Ema(period) => {
                out.insert("result".into(), ema_series(data, period));
            }
            Study::Rsi(period) => {
                out.insert("result".into(), rsi_series(data, period));
            }
            Study::Macd { fast, slow, signal } => {
                let points = macd_series(data, fast, slow, signal);
                out.insert("macd".into(), points.iter().map(|p| p.macd).collect());
                out.insert("signal".into(), points.iter().map(|p| p.signal).collect());
                out.insert("histogram".into(), points.iter().map(|p| p.histogram).collect());
            }
        }
        out
    }
}

#[async_trait]
impl AsyncIndicator for WindowIndicator {
    async fn run(&self, history: Arc<HistorySnapshot>) -> Result<IndicatorSeries, String> {
        let study = self.study;
        let field = self.field;
        tokio::task::spawn_blocking(move || Self::compute(study, history.column(field)))
            .await
            .map_err(|e| format!("window computation panicked: {e}"))
    }
}
