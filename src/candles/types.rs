// Core types for candle aggregation

use crate::feed::types::Tick;
use serde::{ Deserialize, Serialize };

/// A completed, immutable OHLC candle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub symbol: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub start_epoch: i64,
    pub end_epoch: i64,
    pub tick_count: u32,
    pub total_volume: f64,
    /// Monotonically increasing per symbol
    pub sequence: u64,
}

impl Candle {
    /// Validates that the OHLC data is consistent
    pub fn is_valid(&self) -> bool {
        self.high >= self.low
            && self.high >= self.open.max(self.close)
            && self.low <= self.open.min(self.close)
            && self.start_epoch <= self.end_epoch
    }
}

/// Mutable per-symbol accumulator for the candle being built
///
/// Owned exclusively by the aggregator; external readers only ever see the
/// immutable `Candle` it finalizes into.
#[derive(Debug, Clone)]
pub struct CandleBuffer {
    pub symbol: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub start_epoch: i64,
    pub end_epoch: i64,
    pub tick_count: u32,
    pub total_volume: f64,
}

impl CandleBuffer {
    /// Seed a fresh buffer from the first tick of a new candle
    pub fn seed(tick: &Tick) -> Self {
        Self {
            symbol: tick.symbol.clone(),
            open: tick.price,
            high: tick.price,
            low: tick.price,
            close: tick.price,
            start_epoch: tick.epoch,
            end_epoch: tick.epoch,
            tick_count: 1,
            total_volume: tick.volume,
        }
    }

    /// Fold one more tick into the buffer
    pub fn apply(&mut self, tick: &Tick) {
        self.high = self.high.max(tick.price);
        self.low = self.low.min(tick.price);
        self.close = tick.price;
        self.end_epoch = tick.epoch;
        self.tick_count += 1;
        self.total_volume += tick.volume;
    }

    /// Finalize into an immutable candle with the symbol's next sequence
    pub fn finalize(self, sequence: u64) -> Candle {
        Candle {
            symbol: self.symbol,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            start_epoch: self.start_epoch,
            end_epoch: self.end_epoch,
            tick_count: self.tick_count,
            total_volume: self.total_volume,
            sequence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_fold_tracks_ohlc() {
        let mut buffer = CandleBuffer::seed(&Tick::new("R_100", 100, 10.0));
        buffer.apply(&Tick::new("R_100", 101, 12.0));
        buffer.apply(&Tick::new("R_100", 102, 9.0));
        buffer.apply(&Tick::new("R_100", 103, 11.0));

        let candle = buffer.finalize(1);
        assert_eq!(candle.open, 10.0);
        assert_eq!(candle.high, 12.0);
        assert_eq!(candle.low, 9.0);
        assert_eq!(candle.close, 11.0);
        assert_eq!(candle.tick_count, 4);
        assert_eq!(candle.total_volume, 4.0);
        assert_eq!(candle.start_epoch, 100);
        assert_eq!(candle.end_epoch, 103);
        assert!(candle.is_valid());
    }

    #[test]
    fn test_candle_validity_check() {
        let candle = Candle {
            symbol: "R_100".to_string(),
            open: 10.0,
            high: 9.0, // broken: high below open
            low: 8.0,
            close: 8.5,
            start_epoch: 1,
            end_epoch: 2,
            tick_count: 3,
            total_volume: 3.0,
            sequence: 1,
        };
        assert!(!candle.is_valid());
    }
}
