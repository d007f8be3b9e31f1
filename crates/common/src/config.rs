use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{CandleField, TradingMode};

/// Process-level configuration loaded from environment variables at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path of the TOML file describing the advisor and its strategies.
    pub strategy_config_path: String,
    /// JSON-lines candle file. `None` reads candles from stdin.
    pub candle_file: Option<String>,
}

impl Config {
    /// Load configuration from environment variables, reading `.env` if present.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // ignore error if .env not present

        Config {
            strategy_config_path: optional_env("STRATEGY_CONFIG_PATH")
                .unwrap_or_else(|| "config/strategies.toml".to_string()),
            candle_file: optional_env("CANDLE_FILE"),
        }
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Settings read by the tick engine. Every field has a default so an empty
/// `[advisor]` table is valid.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdvisorConfig {
    /// Candles that must be admitted before `check` may run.
    pub required_history: u64,
    /// Field fed to synchronous indicators that consume a single price.
    pub price_field: CandleField,
    /// Capacity of the rolling history consumed by asynchronous indicators.
    pub history_size: usize,
    pub mode: TradingMode,
    /// Candle interval in minutes.
    pub candle_size: u32,
    /// Run start time. Only consulted in realtime mode.
    pub start_time: Option<DateTime<Utc>>,
    /// Capacity of the strategy event broadcast channel.
    pub event_buffer: usize,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            required_history: 0,
            price_field: CandleField::Close,
            history_size: 1000,
            mode: TradingMode::Backtest,
            candle_size: 1,
            start_time: None,
            event_buffer: 1024,
        }
    }
}

impl AdvisorConfig {
    pub fn candle_interval(&self) -> Duration {
        Duration::minutes(i64::from(self.candle_size))
    }
}
