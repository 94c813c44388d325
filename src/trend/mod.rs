//! Multi-timeframe trend engine
//!
//! One `TimeframePipeline` per configured timeframe per symbol. Each pipeline
//! keeps a rolling price window, filters it (Super-Smoother, then Decycler),
//! computes a Hull moving average plus slope, and classifies direction
//! against an adaptive threshold. `TrendEngine` combines the pipelines into
//! an alignment verdict and a recommendation that is only actionable when
//! enough timeframes agree and a short-window check confirms.

pub mod engine;
pub mod pipeline;
pub mod types;

pub use engine::TrendEngine;
pub use pipeline::TimeframePipeline;
pub use types::{Alignment, AlignmentVerdict, Recommendation, TimeframeTrend, TrendDirection};
