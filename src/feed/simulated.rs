//! Deterministic simulated feed and executor
//!
//! Seeded random-walk prices per symbol, used by `--simulate` runs and the
//! async test suites. Implements both boundary traits so a full engine can
//! run with no network at all: ticks are generated on a timer, orders settle
//! against the walk's current price.

use crate::errors::{EngineError, EngineResult};
use crate::feed::types::Tick;
use crate::feed::PriceFeed;
use crate::trader::execution::OrderExecutor;
use crate::trader::types::{OrderRequest, PositionUpdate, Settlement, TradeDirection};
use async_trait::async_trait;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

/// Per-tick relative price step
const WALK_VOLATILITY: f64 = 0.001;
/// Payout scale turning relative price moves into P&L units
const PAYOUT_SCALE: f64 = 100.0;

struct SymbolWalk {
    price: f64,
    epoch: i64,
    rng: StdRng,
}

impl SymbolWalk {
    fn new(symbol: &str, seed: u64, history_len: usize) -> Self {
        let mut hasher = DefaultHasher::new();
        symbol.hash(&mut hasher);
        let symbol_seed = seed ^ hasher.finish();

        // Base price also derives from the symbol so instruments differ
        let base = 50.0 + ((hasher.finish() % 200) as f64);

        Self {
            price: base,
            epoch: Utc::now().timestamp() - (history_len as i64),
            rng: StdRng::seed_from_u64(symbol_seed),
        }
    }

    fn next_tick(&mut self, symbol: &str) -> Tick {
        let step: f64 = self.rng.gen_range(-1.0..=1.0) * WALK_VOLATILITY;
        self.price = (self.price * (1.0 + step)).max(0.01);
        self.epoch += 1;
        Tick::new(symbol, self.epoch, self.price)
    }
}

struct SimPosition {
    symbol: String,
    direction: TradeDirection,
    stake: f64,
    entry_price: f64,
}

pub struct SimulatedFeed {
    seed: u64,
    tick_interval: Duration,
    walks: Arc<Mutex<HashMap<String, SymbolWalk>>>,
    stream_tasks: Mutex<HashMap<String, JoinHandle<()>>>,
    positions: Arc<Mutex<HashMap<String, SimPosition>>>,
    next_order_id: AtomicU64,
}

impl SimulatedFeed {
    pub fn new(seed: u64) -> Self {
        Self::with_tick_interval_ms(seed, 500)
    }

    pub fn with_tick_interval_ms(seed: u64, interval_ms: u64) -> Self {
        Self {
            seed,
            tick_interval: Duration::from_millis(interval_ms.max(1)),
            walks: Arc::new(Mutex::new(HashMap::new())),
            stream_tasks: Mutex::new(HashMap::new()),
            positions: Arc::new(Mutex::new(HashMap::new())),
            next_order_id: AtomicU64::new(1),
        }
    }

    async fn current_price(&self, symbol: &str) -> f64 {
        let mut walks = self.walks.lock().await;
        walks
            .entry(symbol.to_string())
            .or_insert_with(|| SymbolWalk::new(symbol, self.seed, 0))
            .price
    }

    fn position_pnl(direction: TradeDirection, stake: f64, entry: f64, current: f64) -> f64 {
        direction.sign() * (current / entry - 1.0) * PAYOUT_SCALE * stake
    }
}

#[async_trait]
impl PriceFeed for SimulatedFeed {
    async fn history(&self, symbol: &str, count: usize) -> EngineResult<Vec<Tick>> {
        let mut walks = self.walks.lock().await;
        let walk = walks
            .entry(symbol.to_string())
            .or_insert_with(|| SymbolWalk::new(symbol, self.seed, count));

        let mut ticks = Vec::with_capacity(count);
        for _ in 0..count {
            ticks.push(walk.next_tick(symbol));
        }
        Ok(ticks)
    }

    async fn stream(&self, symbol: &str) -> EngineResult<mpsc::UnboundedReceiver<Tick>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let walks = self.walks.clone();
        let interval = self.tick_interval;
        let seed = self.seed;
        let symbol_owned = symbol.to_string();

        let task = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let tick = {
                    let mut walks = walks.lock().await;
                    walks
                        .entry(symbol_owned.clone())
                        .or_insert_with(|| SymbolWalk::new(&symbol_owned, seed, 0))
                        .next_tick(&symbol_owned)
                };
                if tx.send(tick).is_err() {
                    break;
                }
            }
        });

        let mut tasks = self.stream_tasks.lock().await;
        if let Some(old) = tasks.insert(symbol.to_string(), task) {
            old.abort();
        }

        Ok(rx)
    }

    async fn stop(&self, symbol: &str) {
        let mut tasks = self.stream_tasks.lock().await;
        if let Some(task) = tasks.remove(symbol) {
            task.abort();
        }
    }
}

#[async_trait]
impl OrderExecutor for SimulatedFeed {
    async fn submit_order(&self, request: &OrderRequest) -> EngineResult<String> {
        if request.stake <= 0.0 {
            return Err(EngineError::upstream(
                "submit_order",
                "stake must be positive",
            ));
        }

        let entry_price = self.current_price(&request.symbol).await;
        let order_id = format!("sim-{}", self.next_order_id.fetch_add(1, Ordering::Relaxed));

        self.positions.lock().await.insert(
            order_id.clone(),
            SimPosition {
                symbol: request.symbol.clone(),
                direction: request.direction,
                stake: request.stake,
                entry_price,
            },
        );

        Ok(order_id)
    }

    async fn close_position(&self, order_id: &str) -> EngineResult<Settlement> {
        let position = self
            .positions
            .lock()
            .await
            .remove(order_id)
            .ok_or_else(|| EngineError::upstream("close_position", format!("unknown order {}", order_id)))?;

        let current = self.current_price(&position.symbol).await;
        Ok(Settlement {
            order_id: order_id.to_string(),
            pnl: Self::position_pnl(position.direction, position.stake, position.entry_price, current),
            settled_at: Utc::now(),
        })
    }

    async fn poll_position(&self, order_id: &str) -> EngineResult<PositionUpdate> {
        let positions = self.positions.lock().await;
        let position = positions
            .get(order_id)
            .ok_or_else(|| EngineError::upstream("poll_position", format!("unknown order {}", order_id)))?;

        let symbol = position.symbol.clone();
        let (direction, stake, entry) = (position.direction, position.stake, position.entry_price);
        // Release the positions lock before touching the walk state
        drop(positions);

        let current = self.current_price(&symbol).await;

        Ok(PositionUpdate {
            order_id: order_id.to_string(),
            current_price: current,
            pnl: Self::position_pnl(direction, stake, entry, current),
            settlement: None,
        })
    }
}
