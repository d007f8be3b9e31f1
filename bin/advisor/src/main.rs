use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use common::{Candle, Config, StrategyEvent};
use engine::{EngineHandle, TickEngine};
use strategy::{build_strategy, Providers, StrategyFileConfig};

/// Capacity of each engine's command channel.
const COMMAND_BUFFER: usize = 256;

struct RunningEngine {
    name: String,
    handle: EngineHandle,
    task: JoinHandle<common::Result<()>>,
    logger: JoinHandle<()>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env();
    let file = StrategyFileConfig::load(&cfg.strategy_config_path)
        .with_context(|| format!("loading {}", cfg.strategy_config_path))?;
    info!(
        path = %cfg.strategy_config_path,
        strategies = file.strategies.len(),
        mode = %file.advisor.mode,
        "Advisor starting"
    );
    if file.strategies.is_empty() {
        warn!("No strategies configured, nothing to do");
        return Ok(());
    }

    // ── Engines ───────────────────────────────────────────────────────────────
    let mut engines = Vec::with_capacity(file.strategies.len());
    for strategy_cfg in &file.strategies {
        let strategy = build_strategy(strategy_cfg)
            .with_context(|| format!("building strategy '{}'", strategy_cfg.name))?;
        let engine = TickEngine::new(strategy, &file.advisor, Providers::default())
            .with_context(|| format!("initializing strategy '{}'", strategy_cfg.name))?;

        let (handle, commands) = engine.handle(COMMAND_BUFFER);
        let logger = tokio::spawn(log_events(strategy_cfg.name.clone(), handle.subscribe()));
        let task = tokio::spawn(engine.run(commands));
        engines.push(RunningEngine {
            name: strategy_cfg.name.clone(),
            handle,
            task,
            logger,
        });
    }

    // ── Candle feed ───────────────────────────────────────────────────────────
    let reader: Box<dyn AsyncBufRead + Unpin + Send> = match &cfg.candle_file {
        Some(path) => {
            let f = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("opening candle file {path}"))?;
            Box::new(BufReader::new(f))
        }
        None => {
            info!("Reading candles from stdin");
            Box::new(BufReader::new(tokio::io::stdin()))
        }
    };

    let fed = feed(reader, &engines).await?;
    info!(candles = fed, "Candle feed exhausted, finishing strategies");

    // ── Shutdown ──────────────────────────────────────────────────────────────
    for running in engines {
        if let Err(e) = running.handle.finish().await {
            warn!(strategy = %running.name, error = %e, "Finish failed");
        }
        drop(running.handle);
        running
            .task
            .await
            .context("engine task panicked")?
            .with_context(|| format!("strategy '{}' aborted", running.name))?;
        let _ = running.logger.await;
    }

    info!("All strategies finished");
    Ok(())
}

/// Deliver every JSON-lines candle to every engine. Returns the number of
/// candles delivered.
async fn feed(
    reader: Box<dyn AsyncBufRead + Unpin + Send>,
    engines: &[RunningEngine],
) -> Result<u64> {
    let mut lines = reader.lines();
    let mut count = 0u64;
    let mut line_no = 0u64;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let candle: Candle = serde_json::from_str(line)
            .with_context(|| format!("invalid candle on line {line_no}"))?;

        for running in engines {
            // not awaiting the signal lets async indicators overlap
            running
                .handle
                .tick(candle.clone())
                .await
                .with_context(|| format!("strategy '{}' stopped", running.name))?;
        }
        count += 1;
    }
    Ok(count)
}

async fn log_events(strategy: String, mut rx: broadcast::Receiver<StrategyEvent>) {
    loop {
        match rx.recv().await {
            Ok(StrategyEvent::WarmupCompleted { start }) => {
                info!(%strategy, %start, "Warmup completed");
            }
            Ok(StrategyEvent::Advice { recommendation }) => {
                info!(%strategy, ?recommendation, "Advice");
            }
            Ok(StrategyEvent::Update { date, indicators }) => {
                let indicators = serde_json::to_string(&indicators).unwrap_or_default();
                debug!(%strategy, %date, %indicators, "Update");
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(%strategy, skipped = n, "Event logger lagging");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
