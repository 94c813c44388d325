//! Streaming tick-to-candle aggregator

use crate::config::CandleConfig;
use crate::errors::{EngineError, EngineResult};
use crate::feed::types::Tick;
use crate::logger::{self, LogTag};
use crate::candles::types::{Candle, CandleBuffer};
use std::collections::{HashMap, VecDeque};
use tokio::sync::mpsc;

/// Per-symbol streaming aggregator
///
/// `process_tick` is O(1) amortized. Buffers and history maps are owned
/// exclusively by this struct; subscribers receive cloned, immutable candles
/// and accessors return snapshots, never references into live state.
pub struct CandleAggregator {
    ticks_per_candle: u32,
    max_candles: usize,
    buffers: HashMap<String, CandleBuffer>,
    history: HashMap<String, VecDeque<Candle>>,
    sequences: HashMap<String, u64>,
    subscribers: HashMap<String, HashMap<u64, mpsc::UnboundedSender<Candle>>>,
    next_subscriber_id: u64,
    /// Valid ticks folded since construction, per symbol (for accounting)
    processed: HashMap<String, u64>,
}

impl CandleAggregator {
    pub fn new(config: &CandleConfig) -> Self {
        Self {
            ticks_per_candle: config.ticks_per_candle.max(1),
            max_candles: config.max_candles.max(1),
            buffers: HashMap::new(),
            history: HashMap::new(),
            sequences: HashMap::new(),
            subscribers: HashMap::new(),
            next_subscriber_id: 1,
            processed: HashMap::new(),
        }
    }

    pub fn ticks_per_candle(&self) -> u32 {
        self.ticks_per_candle
    }

    /// Fold one live tick; returns the completed candle when this tick
    /// finished one
    ///
    /// Invalid ticks and ticks older than the current buffer's last epoch
    /// are dropped with a log line (`Err(InvalidInput)`), never folded into
    /// a candle. A single bad tick never aborts the symbol.
    pub fn process_tick(&mut self, tick: &Tick) -> EngineResult<Option<Candle>> {
        if let Err(e) = tick.validate() {
            logger::warning(LogTag::Candles, &format!("Dropping tick: {}", e));
            return Err(e);
        }

        if let Some(buffer) = self.buffers.get_mut(&tick.symbol) {
            // Live ordering: reject ticks older than what the buffer has
            // already seen (equal epochs are legal, feeds batch per second)
            if tick.epoch < buffer.end_epoch {
                let err = EngineError::InvalidInput(format!(
                    "out-of-order tick for {}: epoch {} < buffer end {}",
                    tick.symbol, tick.epoch, buffer.end_epoch
                ));
                logger::warning(LogTag::Candles, &format!("Dropping tick: {}", err));
                return Err(err);
            }
            buffer.apply(tick);
        } else {
            self.buffers
                .insert(tick.symbol.clone(), CandleBuffer::seed(tick));
        }

        *self.processed.entry(tick.symbol.clone()).or_insert(0) += 1;

        let complete = self
            .buffers
            .get(&tick.symbol)
            .map(|b| b.tick_count >= self.ticks_per_candle)
            .unwrap_or(false);

        if complete {
            return self.finalize(&tick.symbol).map(Some);
        }
        Ok(None)
    }

    /// Finalize a partial buffer on demand (session end, symbol shutdown)
    ///
    /// The resulting candle carries a `tick_count` below the configured size
    /// and flows to subscribers like any other.
    pub fn force_complete(&mut self, symbol: &str) -> EngineResult<Option<Candle>> {
        if !self.buffers.contains_key(symbol) {
            return Ok(None);
        }
        self.finalize(symbol).map(Some)
    }

    /// Bulk backfill before live streaming starts
    ///
    /// The batch may be out of order (it is sorted by epoch here); whole
    /// groups become history candles and the remainder seeds the live
    /// buffer. Refuses to run concurrently with a live buffer - backfill
    /// never mutates buffers a live stream is folding into.
    pub fn seed(&mut self, symbol: &str, ticks: &[Tick]) -> EngineResult<usize> {
        if self.buffers.contains_key(symbol) {
            return Err(EngineError::InvalidInput(format!(
                "cannot seed {} while a live buffer exists",
                symbol
            )));
        }

        let mut valid: Vec<&Tick> = ticks
            .iter()
            .filter(|t| t.symbol == symbol && t.validate().is_ok())
            .collect();
        valid.sort_by_key(|t| t.epoch);

        let dropped = ticks.len() - valid.len();
        if dropped > 0 {
            logger::warning(
                LogTag::Candles,
                &format!("Seed batch for {}: dropped {} invalid ticks", symbol, dropped),
            );
        }

        let mut completed = 0usize;
        for tick in valid {
            match self.process_tick(tick)? {
                Some(_) => completed += 1,
                None => {}
            }
        }

        logger::info(
            LogTag::Candles,
            &format!(
                "Seeded {} with {} candles ({} ticks buffered)",
                symbol,
                completed,
                self.buffered_tick_count(symbol)
            ),
        );

        Ok(completed)
    }

    /// Attach a listener for completed candles of `symbol`
    pub fn subscribe(&mut self, symbol: &str) -> (u64, mpsc::UnboundedReceiver<Candle>) {
        let id = self.next_subscriber_id;
        self.next_subscriber_id += 1;
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .entry(symbol.to_string())
            .or_default()
            .insert(id, tx);
        (id, rx)
    }

    /// Detach a listener; O(1), idempotent, other listeners unaffected
    pub fn unsubscribe(&mut self, symbol: &str, id: u64) {
        if let Some(subs) = self.subscribers.get_mut(symbol) {
            subs.remove(&id);
        }
    }

    /// Snapshot of the bounded candle history for a symbol
    pub fn candles(&self, symbol: &str) -> Vec<Candle> {
        self.history
            .get(symbol)
            .map(|h| h.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn last_candle(&self, symbol: &str) -> Option<Candle> {
        self.history.get(symbol).and_then(|h| h.back().cloned())
    }

    /// Ticks sitting in the symbol's live buffer
    pub fn buffered_tick_count(&self, symbol: &str) -> u32 {
        self.buffers.get(symbol).map(|b| b.tick_count).unwrap_or(0)
    }

    /// Valid ticks folded for the symbol since construction
    pub fn processed_tick_count(&self, symbol: &str) -> u64 {
        self.processed.get(symbol).copied().unwrap_or(0)
    }

    fn finalize(&mut self, symbol: &str) -> EngineResult<Candle> {
        let buffer = self
            .buffers
            .remove(symbol)
            .ok_or_else(|| EngineError::invariant("candles", format!("no buffer for {}", symbol)))?;

        // A finalize outside [1, N] or with broken OHLC bounds is a logic
        // defect; abort this symbol's pipeline rather than continue corrupt
        if buffer.tick_count == 0 || buffer.tick_count > self.ticks_per_candle {
            self.abort_symbol(symbol);
            return Err(EngineError::invariant(
                "candles",
                format!(
                    "candle for {} finalized with tick_count {} outside [1, {}]",
                    symbol, buffer.tick_count, self.ticks_per_candle
                ),
            ));
        }

        let sequence = {
            let seq = self.sequences.entry(symbol.to_string()).or_insert(0);
            *seq += 1;
            *seq
        };

        let candle = buffer.finalize(sequence);
        if !candle.is_valid() {
            self.abort_symbol(symbol);
            return Err(EngineError::invariant(
                "candles",
                format!(
                    "candle {} for {} violates OHLC bounds (o {} h {} l {} c {})",
                    sequence, symbol, candle.open, candle.high, candle.low, candle.close
                ),
            ));
        }

        let history = self.history.entry(symbol.to_string()).or_default();
        history.push_back(candle.clone());
        while history.len() > self.max_candles {
            history.pop_front();
        }

        self.emit(symbol, &candle);

        logger::debug(
            LogTag::Candles,
            &format!(
                "{} candle #{}: o {:.5} h {:.5} l {:.5} c {:.5} ({} ticks)",
                symbol, candle.sequence, candle.open, candle.high, candle.low, candle.close,
                candle.tick_count
            ),
        );

        Ok(candle)
    }

    fn emit(&mut self, symbol: &str, candle: &Candle) {
        if let Some(subs) = self.subscribers.get_mut(symbol) {
            // Drop subscribers whose receiver side went away
            subs.retain(|_, tx| tx.send(candle.clone()).is_ok());
        }
    }

    fn abort_symbol(&mut self, symbol: &str) {
        self.buffers.remove(symbol);
        self.history.remove(symbol);
        self.sequences.remove(symbol);
        logger::error(
            LogTag::Candles,
            &format!("Aborted candle pipeline for {} after invariant violation", symbol),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aggregator(n: u32, max: usize) -> CandleAggregator {
        CandleAggregator::new(&CandleConfig {
            ticks_per_candle: n,
            max_candles: max,
        })
    }

    fn tick(symbol: &str, epoch: i64, price: f64) -> Tick {
        Tick::new(symbol, epoch, price)
    }

    #[test]
    fn test_single_candle_ohlc_from_flat_then_spike() {
        let mut agg = aggregator(5, 100);
        let prices = [10.0, 10.0, 10.0, 10.0, 15.0];
        let mut emitted = None;
        for (i, price) in prices.iter().enumerate() {
            emitted = agg.process_tick(&tick("R_100", 100 + i as i64, *price)).unwrap();
        }
        let candle = emitted.expect("fifth tick completes the candle");
        assert_eq!(candle.open, 10.0);
        assert_eq!(candle.high, 15.0);
        assert_eq!(candle.low, 10.0);
        assert_eq!(candle.close, 15.0);
        assert_eq!(candle.tick_count, 5);
    }

    #[test]
    fn test_exact_candle_count_and_boundaries() {
        let n = 4u32;
        let groups = 6usize;
        let mut agg = aggregator(n, 100);

        let mut completed = Vec::new();
        for g in 0..groups {
            for i in 0..n as usize {
                let price = (g * 10 + i + 1) as f64;
                if let Some(candle) = agg
                    .process_tick(&tick("R_100", (g * (n as usize) + i) as i64 + 1, price))
                    .unwrap()
                {
                    completed.push(candle);
                }
            }
        }

        assert_eq!(completed.len(), groups);
        for (g, candle) in completed.iter().enumerate() {
            assert_eq!(candle.tick_count, n);
            // Open/close are the group's first/last tick prices
            assert_eq!(candle.open, (g * 10 + 1) as f64);
            assert_eq!(candle.close, (g * 10 + n as usize) as f64);
            assert!(candle.is_valid());
        }

        // No tick is shared or dropped at group boundaries
        assert_eq!(agg.processed_tick_count("R_100"), (groups * n as usize) as u64);
        assert_eq!(agg.buffered_tick_count("R_100"), 0);
    }

    #[test]
    fn test_sequences_strictly_increase() {
        let mut agg = aggregator(2, 100);
        let mut sequences = Vec::new();
        for i in 0..10 {
            if let Some(candle) = agg.process_tick(&tick("R_100", i + 1, 5.0)).unwrap() {
                sequences.push(candle.sequence);
            }
        }
        for pair in sequences.windows(2) {
            assert!(pair[1] > pair[0]);
        }
    }

    #[test]
    fn test_invalid_ticks_never_reach_a_candle() {
        let mut agg = aggregator(3, 100);
        assert!(agg.process_tick(&tick("R_100", 1, 10.0)).unwrap().is_none());
        assert!(agg.process_tick(&tick("R_100", 2, -1.0)).is_err());
        assert!(agg.process_tick(&tick("", 3, 5.0)).is_err());
        assert!(agg.process_tick(&tick("R_100", 0, 5.0)).is_err());
        assert!(agg.process_tick(&tick("R_100", 3, 12.0)).unwrap().is_none());
        let candle = agg.process_tick(&tick("R_100", 4, 11.0)).unwrap().unwrap();
        assert_eq!(candle.tick_count, 3);
        assert_eq!(candle.high, 12.0);
        assert_eq!(candle.low, 10.0);
    }

    #[test]
    fn test_stale_live_tick_rejected_equal_epoch_accepted() {
        let mut agg = aggregator(5, 100);
        agg.process_tick(&tick("R_100", 100, 10.0)).unwrap();
        agg.process_tick(&tick("R_100", 101, 11.0)).unwrap();

        // Older than the buffer's last tick: dropped
        assert!(agg.process_tick(&tick("R_100", 99, 12.0)).is_err());
        // Same second: accepted (feeds batch multiple ticks per second)
        assert!(agg.process_tick(&tick("R_100", 101, 12.0)).unwrap().is_none());
        assert_eq!(agg.buffered_tick_count("R_100"), 3);
    }

    #[test]
    fn test_force_complete_emits_short_candle() {
        let mut agg = aggregator(10, 100);
        agg.process_tick(&tick("R_100", 1, 10.0)).unwrap();
        agg.process_tick(&tick("R_100", 2, 11.0)).unwrap();

        let candle = agg.force_complete("R_100").unwrap().unwrap();
        assert_eq!(candle.tick_count, 2);
        assert!(candle.is_valid());

        // Buffer slot is cleared; nothing left to complete
        assert!(agg.force_complete("R_100").unwrap().is_none());
        assert_eq!(agg.buffered_tick_count("R_100"), 0);
    }

    #[test]
    fn test_history_is_bounded_with_oldest_eviction() {
        let mut agg = aggregator(1, 3);
        for i in 0..10 {
            agg.process_tick(&tick("R_100", i + 1, (i + 1) as f64)).unwrap();
        }
        let history = agg.candles("R_100");
        assert_eq!(history.len(), 3);
        // Oldest evicted: sequences 8, 9, 10 remain
        assert_eq!(history[0].sequence, 8);
        assert_eq!(history[2].sequence, 10);
    }

    #[test]
    fn test_symbols_are_independent() {
        let mut agg = aggregator(2, 100);
        agg.process_tick(&tick("R_100", 1, 10.0)).unwrap();
        agg.process_tick(&tick("R_50", 1, 99.0)).unwrap();
        let candle = agg.process_tick(&tick("R_100", 2, 11.0)).unwrap().unwrap();
        assert_eq!(candle.symbol, "R_100");
        assert_eq!(agg.buffered_tick_count("R_50"), 1);
    }

    #[tokio::test]
    async fn test_subscribers_receive_candles_independently() {
        let mut agg = aggregator(2, 100);
        let (id_a, mut rx_a) = agg.subscribe("R_100");
        let (_id_b, mut rx_b) = agg.subscribe("R_100");

        agg.process_tick(&tick("R_100", 1, 10.0)).unwrap();
        agg.process_tick(&tick("R_100", 2, 11.0)).unwrap();

        assert_eq!(rx_a.recv().await.unwrap().sequence, 1);
        assert_eq!(rx_b.recv().await.unwrap().sequence, 1);

        // Detaching one listener leaves the other working
        agg.unsubscribe("R_100", id_a);
        agg.process_tick(&tick("R_100", 3, 12.0)).unwrap();
        agg.process_tick(&tick("R_100", 4, 13.0)).unwrap();

        assert_eq!(rx_b.recv().await.unwrap().sequence, 2);
        assert!(rx_a.try_recv().is_err());
    }

    #[test]
    fn test_seed_accepts_out_of_order_batch() {
        let mut agg = aggregator(3, 100);
        // Shuffled backfill batch: 7 ticks -> 2 candles + 1 buffered
        let batch = vec![
            tick("R_100", 104, 14.0),
            tick("R_100", 101, 11.0),
            tick("R_100", 106, 16.0),
            tick("R_100", 103, 13.0),
            tick("R_100", 102, 12.0),
            tick("R_100", 107, 17.0),
            tick("R_100", 105, 15.0),
        ];
        let completed = agg.seed("R_100", &batch).unwrap();
        assert_eq!(completed, 2);
        assert_eq!(agg.buffered_tick_count("R_100"), 1);

        let history = agg.candles("R_100");
        assert_eq!(history[0].open, 11.0);
        assert_eq!(history[0].close, 13.0);
        assert_eq!(history[1].open, 14.0);
        assert_eq!(history[1].close, 16.0);

        // Live streaming picks up where the seed left off
        assert!(agg.process_tick(&tick("R_100", 108, 18.0)).unwrap().is_none());
        let candle = agg.process_tick(&tick("R_100", 109, 19.0)).unwrap().unwrap();
        assert_eq!(candle.sequence, 3);
        assert_eq!(candle.tick_count, 3);
    }

    #[test]
    fn test_seed_refused_while_live_buffer_exists() {
        let mut agg = aggregator(3, 100);
        agg.process_tick(&tick("R_100", 1, 10.0)).unwrap();
        assert!(agg.seed("R_100", &[tick("R_100", 2, 11.0)]).is_err());
    }
}
