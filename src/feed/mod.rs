//! Tick feed boundary
//!
//! The market-data transport is an external collaborator: the engine consumes
//! an ordered tick stream and a bulk history operation through the
//! [`PriceFeed`] trait and never touches the wire. `FeedHub` multiplexes one
//! upstream subscription per symbol to any number of engine-side consumers
//! with reference counting. `SimulatedFeed` is a deterministic random-walk
//! implementation used by tests and `--simulate` runs.

pub mod hub;
pub mod simulated;
pub mod types;

pub use hub::{FeedHub, TickSubscription};
pub use simulated::SimulatedFeed;
pub use types::Tick;

use crate::errors::EngineResult;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Upstream market-data source
///
/// Implementations own connection management and reconnects; failures map to
/// `EngineError::Upstream` with the failed operation's context. The engine
/// does not retry these calls - retry policy belongs to the caller.
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Bulk historical backfill: up to `count` past ticks, oldest first
    async fn history(&self, symbol: &str, count: usize) -> EngineResult<Vec<Tick>>;

    /// Open a live tick stream for `symbol`
    async fn stream(&self, symbol: &str) -> EngineResult<mpsc::UnboundedReceiver<Tick>>;

    /// Stop the upstream stream for `symbol` (idempotent)
    async fn stop(&self, symbol: &str);
}
