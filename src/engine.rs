//! Engine wiring
//!
//! Owns the per-symbol processing tasks and the position monitors. One task
//! per symbol consumes the shared feed, folds ticks into candles, drives the
//! trend pipelines and publishes the latest verdict over a watch channel -
//! symbols never share mutable state, the shard key is the symbol itself.
//!
//! Everything is an explicit owned object: the caller constructs the engine
//! with its configuration, feed and executor; nothing lives in globals.

use crate::candles::aggregator::CandleAggregator;
use crate::candles::types::Candle;
use crate::config::{Config, Granularity};
use crate::errors::{EngineError, EngineResult};
use crate::feed::hub::FeedHub;
use crate::feed::PriceFeed;
use crate::logger::{self, LogTag};
use crate::trader::execution::OrderExecutor;
use crate::trader::monitor::{run_monitor, PositionMonitor};
use crate::trader::types::{ExitSignal, OrderRequest, TradeDirection};
use crate::trend::engine::TrendEngine;
use crate::trend::types::AlignmentVerdict;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::JoinHandle;

/// Upper bound on backfill size regardless of configured windows
const MAX_BACKFILL_TICKS: usize = 10_000;

/// Buffered completed candles per lagging subscriber
const CANDLE_CHANNEL_CAPACITY: usize = 64;

struct SymbolHandle {
    task: JoinHandle<EngineResult<()>>,
    verdict_rx: watch::Receiver<EngineResult<AlignmentVerdict>>,
    candle_tx: broadcast::Sender<Candle>,
}

struct MonitorHandle {
    order_id: String,
    symbol: String,
    task: JoinHandle<EngineResult<Option<crate::trader::types::Settlement>>>,
}

/// Status snapshot exposed for summary printing
#[derive(Debug, Clone, Serialize)]
pub struct SymbolStatus {
    pub symbol: String,
    pub verdict: Option<AlignmentVerdict>,
    pub status: String,
}

pub struct Engine {
    config: Config,
    hub: Arc<FeedHub>,
    executor: Arc<dyn OrderExecutor>,
    shutdown_tx: watch::Sender<bool>,
    symbols: Mutex<HashMap<String, SymbolHandle>>,
    monitors: Mutex<Vec<MonitorHandle>>,
    exit_tx: mpsc::UnboundedSender<ExitSignal>,
    exit_rx: Mutex<Option<mpsc::UnboundedReceiver<ExitSignal>>>,
}

impl Engine {
    pub fn new(config: Config, feed: Arc<dyn PriceFeed>, executor: Arc<dyn OrderExecutor>) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        let (exit_tx, exit_rx) = mpsc::unbounded_channel();
        Self {
            config,
            hub: Arc::new(FeedHub::new(feed)),
            executor,
            shutdown_tx,
            symbols: Mutex::new(HashMap::new()),
            monitors: Mutex::new(Vec::new()),
            exit_tx,
            exit_rx: Mutex::new(Some(exit_rx)),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Spawn one processing task per configured symbol
    pub async fn start(&self) -> EngineResult<()> {
        for symbol in self.config.symbols.clone() {
            self.start_symbol(&symbol).await?;
        }
        Ok(())
    }

    /// Spawn the processing task for one symbol
    pub async fn start_symbol(&self, symbol: &str) -> EngineResult<()> {
        let mut symbols = self.symbols.lock().await;
        if symbols.contains_key(symbol) {
            return Ok(());
        }

        let need = self.backfill_count();
        let (verdict_tx, verdict_rx) = watch::channel(Err(EngineError::InsufficientData {
            symbol: symbol.to_string(),
            have: 0,
            need,
        }));

        let (candle_tx, _) = broadcast::channel(CANDLE_CHANNEL_CAPACITY);

        let task = tokio::spawn(run_symbol(
            symbol.to_string(),
            self.config.clone(),
            self.hub.clone(),
            need,
            verdict_tx,
            candle_tx.clone(),
            self.shutdown_tx.subscribe(),
        ));

        symbols.insert(
            symbol.to_string(),
            SymbolHandle {
                task,
                verdict_rx,
                candle_tx,
            },
        );

        logger::info(LogTag::System, &format!("Started pipeline for {}", symbol));
        Ok(())
    }

    /// Latest alignment verdict for a symbol
    ///
    /// `Err(InsufficientData)` until the symbol's windows are full;
    /// `Err(UnknownSymbol)` when the symbol was never started.
    pub async fn verdict(&self, symbol: &str) -> EngineResult<AlignmentVerdict> {
        let symbols = self.symbols.lock().await;
        let handle = symbols
            .get(symbol)
            .ok_or_else(|| EngineError::UnknownSymbol(symbol.to_string()))?;
        let verdict = (*handle.verdict_rx.borrow()).clone();
        verdict
    }

    /// Take the exit signal receiver (once)
    pub async fn take_exit_signals(&self) -> Option<mpsc::UnboundedReceiver<ExitSignal>> {
        self.exit_rx.lock().await.take()
    }

    /// Push stream of completed candles for a symbol
    ///
    /// Dropping the receiver unsubscribes; other listeners are unaffected.
    pub async fn subscribe_candles(&self, symbol: &str) -> EngineResult<broadcast::Receiver<Candle>> {
        let symbols = self.symbols.lock().await;
        let handle = symbols
            .get(symbol)
            .ok_or_else(|| EngineError::UnknownSymbol(symbol.to_string()))?;
        Ok(handle.candle_tx.subscribe())
    }

    /// Submit an order and attach a risk monitor to it
    ///
    /// The verdict snapshot that justified the entry is captured into the
    /// monitor; the monitor's task lives until settlement, shutdown or a
    /// settlement timeout.
    pub async fn open_position(
        &self,
        symbol: &str,
        direction: TradeDirection,
    ) -> EngineResult<String> {
        let entry_snapshot = self.verdict(symbol).await?;

        let request = OrderRequest {
            symbol: symbol.to_string(),
            direction,
            stake: self.config.trading.stake,
            duration_ticks: self.config.trading.duration_ticks,
        };
        let order_id = self.executor.submit_order(&request).await?;
        let entry = self.executor.poll_position(&order_id).await?;

        logger::info(
            LogTag::Trader,
            &format!(
                "Opened {} {} @ {:.5} (order {})",
                direction, symbol, entry.current_price, order_id
            ),
        );

        let monitor = PositionMonitor::new(
            order_id.clone(),
            symbol,
            entry.current_price,
            entry_snapshot,
            &self.config.risk,
        );

        let verdict_rx = {
            let symbols = self.symbols.lock().await;
            symbols
                .get(symbol)
                .ok_or_else(|| EngineError::UnknownSymbol(symbol.to_string()))?
                .verdict_rx
                .clone()
        };

        let task = tokio::spawn(run_monitor(
            monitor,
            self.executor.clone(),
            verdict_rx,
            self.exit_tx.clone(),
            self.config.risk.clone(),
            self.shutdown_tx.subscribe(),
        ));

        self.monitors.lock().await.push(MonitorHandle {
            order_id: order_id.clone(),
            symbol: symbol.to_string(),
            task,
        });

        Ok(order_id)
    }

    /// Number of monitors still running
    pub async fn open_position_count(&self) -> usize {
        let mut monitors = self.monitors.lock().await;
        monitors.retain(|m| !m.task.is_finished());
        monitors.len()
    }

    /// Whether a monitor is still running for this symbol
    pub async fn has_open_position(&self, symbol: &str) -> bool {
        let mut monitors = self.monitors.lock().await;
        monitors.retain(|m| !m.task.is_finished());
        monitors.iter().any(|m| m.symbol == symbol)
    }

    /// Status snapshot across all symbols
    pub async fn status(&self) -> Vec<SymbolStatus> {
        let symbols = self.symbols.lock().await;
        let mut out = Vec::with_capacity(symbols.len());
        for (symbol, handle) in symbols.iter() {
            let (verdict, status) = match &*handle.verdict_rx.borrow() {
                Ok(v) => (
                    Some(v.clone()),
                    format!("{:?} ({:?})", v.alignment, v.recommendation),
                ),
                Err(e) => (None, e.to_string()),
            };
            out.push(SymbolStatus {
                symbol: symbol.clone(),
                verdict,
                status,
            });
        }
        out.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        out
    }

    /// Signal shutdown and wait for every task to wind down
    pub async fn shutdown(&self) {
        logger::info(LogTag::System, "Engine shutting down");
        let _ = self.shutdown_tx.send(true);

        let mut symbols = self.symbols.lock().await;
        for (symbol, handle) in symbols.drain() {
            match handle.task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    logger::warning(
                        LogTag::System,
                        &format!("Pipeline for {} ended with error: {}", symbol, e),
                    );
                }
                Err(e) => {
                    logger::warning(
                        LogTag::System,
                        &format!("Pipeline task for {} panicked: {}", symbol, e),
                    );
                }
            }
        }

        let mut monitors = self.monitors.lock().await;
        for handle in monitors.drain(..) {
            match handle.task.await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    logger::warning(
                        LogTag::System,
                        &format!("Monitor for {} ended with error: {}", handle.order_id, e),
                    );
                }
                Err(e) => {
                    logger::warning(
                        LogTag::System,
                        &format!("Monitor task for {} panicked: {}", handle.order_id, e),
                    );
                }
            }
        }
    }

    /// Backfill size: enough ticks to fill the largest configured window
    fn backfill_count(&self) -> usize {
        let per_candle = self.config.candles.ticks_per_candle as usize;
        self.config
            .timeframes
            .iter()
            .map(|tf| match tf.granularity {
                Granularity::Tick => tf.sample_count,
                Granularity::Candle => tf.sample_count.saturating_mul(per_candle),
            })
            .max()
            .unwrap_or(0)
            .min(MAX_BACKFILL_TICKS)
    }
}

/// Per-symbol processing loop
///
/// Backfills history, then consumes live ticks: candle aggregation first,
/// trend pipelines second, verdict published last. Terminates on shutdown,
/// on upstream stream end, or on an invariant violation (which aborts only
/// this symbol).
async fn run_symbol(
    symbol: String,
    config: Config,
    hub: Arc<FeedHub>,
    backfill: usize,
    verdict_tx: watch::Sender<EngineResult<AlignmentVerdict>>,
    candle_tx: broadcast::Sender<Candle>,
    mut shutdown: watch::Receiver<bool>,
) -> EngineResult<()> {
    let mut aggregator = CandleAggregator::new(&config.candles);
    let mut trend = TrendEngine::new(symbol.as_str(), &config.timeframes, &config.trend);

    // Backfill: fetch first, apply after - no symbol state is locked while
    // the request is in flight
    if backfill > 0 {
        let mut ticks = hub.history(&symbol, backfill).await?;
        ticks.sort_by_key(|t| t.epoch);

        aggregator.seed(&symbol, &ticks)?;
        for tick in &ticks {
            if tick.validate().is_ok() {
                trend.on_tick(tick.price);
            }
        }
        for candle in aggregator.candles(&symbol) {
            trend.on_candle_close(candle.close);
        }

        let _ = verdict_tx.send(trend.verdict());
    }

    let mut subscription = hub.subscribe(&symbol).await?;

    logger::info(
        LogTag::System,
        &format!("{}: live processing started ({} backfill ticks)", symbol, backfill),
    );

    loop {
        let tick = tokio::select! {
            tick = subscription.receiver.recv() => tick,
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    if let Ok(Some(candle)) = aggregator.force_complete(&symbol) {
                        logger::info(
                            LogTag::Candles,
                            &format!(
                                "{}: session end, short candle #{} ({} ticks)",
                                symbol, candle.sequence, candle.tick_count
                            ),
                        );
                        let _ = candle_tx.send(candle);
                    }
                    hub.unsubscribe(&symbol, subscription.id).await;
                    return Ok(());
                }
                continue;
            }
        };

        let Some(tick) = tick else {
            hub.unsubscribe(&symbol, subscription.id).await;
            let err = EngineError::upstream("stream", format!("tick stream for {} ended", symbol));
            let _ = verdict_tx.send(Err(err.clone()));
            return Err(err);
        };

        match aggregator.process_tick(&tick) {
            Ok(Some(candle)) => {
                trend.on_candle_close(candle.close);
                let _ = candle_tx.send(candle);
            }
            Ok(None) => {}
            Err(e @ EngineError::InvariantViolation { .. }) => {
                // The symbol's pipeline is corrupt; stop it rather than
                // continue emitting from bad state
                trend.reset();
                let _ = verdict_tx.send(Err(e.clone()));
                hub.unsubscribe(&symbol, subscription.id).await;
                return Err(e);
            }
            Err(_) => {
                // Invalid tick: already logged by the aggregator, skip it
                continue;
            }
        }

        trend.on_tick(tick.price);
        let _ = verdict_tx.send(trend.verdict());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CandleConfig, RiskConfig, TimeframeConfig, TradingConfig, TrendConfig};
    use crate::feed::simulated::SimulatedFeed;
    use std::time::Duration;

    fn small_config() -> Config {
        Config {
            symbols: vec!["R_100".to_string()],
            candles: CandleConfig {
                ticks_per_candle: 5,
                max_candles: 50,
            },
            trend: TrendConfig {
                min_aligned_count: 2,
                confirmation_window: 30,
                threshold_base: 0.02,
                range_window: 50,
                decycler_alpha: 0.07,
            },
            timeframes: vec![
                TimeframeConfig {
                    sample_count: 40,
                    smoothing_period: 10,
                    granularity: Granularity::Tick,
                },
                TimeframeConfig {
                    sample_count: 60,
                    smoothing_period: 12,
                    granularity: Granularity::Tick,
                },
            ],
            risk: RiskConfig {
                breakeven_trigger: 0.5,
                trailing_step: 0.35,
                poll_interval_secs: 1,
                settlement_timeout_secs: 5,
            },
            trading: TradingConfig {
                stake: 1.0,
                duration_ticks: 10,
            },
        }
    }

    async fn wait_for_verdict(engine: &Engine, symbol: &str) -> AlignmentVerdict {
        for _ in 0..100 {
            if let Ok(verdict) = engine.verdict(symbol).await {
                return verdict;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("verdict never became available");
    }

    #[tokio::test]
    async fn test_engine_produces_verdict_after_backfill() {
        let feed = Arc::new(SimulatedFeed::with_tick_interval_ms(42, 5));
        let engine = Engine::new(small_config(), feed.clone(), feed);
        engine.start().await.unwrap();

        // Backfill covers the 60-sample window, so a verdict appears fast
        let _verdict = wait_for_verdict(&engine, "R_100").await;

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_unknown_symbol_is_an_error() {
        let feed = Arc::new(SimulatedFeed::with_tick_interval_ms(42, 5));
        let engine = Engine::new(small_config(), feed.clone(), feed);
        assert!(matches!(
            engine.verdict("GHOST").await,
            Err(EngineError::UnknownSymbol(_))
        ));
    }

    #[tokio::test]
    async fn test_open_position_attaches_monitor() {
        let feed = Arc::new(SimulatedFeed::with_tick_interval_ms(42, 5));
        let engine = Engine::new(small_config(), feed.clone(), feed);
        engine.start().await.unwrap();
        wait_for_verdict(&engine, "R_100").await;

        let order_id = engine
            .open_position("R_100", TradeDirection::Rise)
            .await
            .unwrap();
        assert!(order_id.starts_with("sim-"));
        assert_eq!(engine.open_position_count().await, 1);
        assert!(engine.has_open_position("R_100").await);

        engine.shutdown().await;
        assert_eq!(engine.open_position_count().await, 0);
    }

    #[tokio::test]
    async fn test_candle_push_stream() {
        let feed = Arc::new(SimulatedFeed::with_tick_interval_ms(42, 2));
        let engine = Engine::new(small_config(), feed.clone(), feed);
        engine.start().await.unwrap();

        let mut candles = engine.subscribe_candles("R_100").await.unwrap();
        let first = candles.recv().await.unwrap();
        let second = candles.recv().await.unwrap();

        assert_eq!(first.symbol, "R_100");
        assert_eq!(first.tick_count, 5);
        assert!(second.sequence > first.sequence);
        assert!(first.is_valid() && second.is_valid());

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_status_lists_all_symbols() {
        let mut config = small_config();
        config.symbols = vec!["R_100".to_string(), "R_50".to_string()];
        let feed = Arc::new(SimulatedFeed::with_tick_interval_ms(42, 5));
        let engine = Engine::new(config, feed.clone(), feed);
        engine.start().await.unwrap();

        let status = engine.status().await;
        assert_eq!(status.len(), 2);
        assert_eq!(status[0].symbol, "R_100");
        assert_eq!(status[1].symbol, "R_50");

        engine.shutdown().await;
    }
}
