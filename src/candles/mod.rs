//! Tick-to-candle aggregation
//!
//! Folds ordered tick streams into fixed-size OHLC candles, one buffer per
//! symbol, emitting each completed candle exactly once to every subscriber.
//! History is bounded per symbol with oldest-eviction, so memory never grows
//! with stream length.

pub mod aggregator;
pub mod types;

pub use aggregator::CandleAggregator;
pub use types::{Candle, CandleBuffer};
