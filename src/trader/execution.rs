//! Order execution boundary
//!
//! The order endpoint (broker / exchange API) is an external collaborator.
//! The engine only sees this trait; implementations own the wire protocol.
//! Failures map to `EngineError::Upstream` with the failed operation's
//! context - the engine never retries, the caller decides.

use crate::errors::EngineResult;
use crate::trader::types::{OrderRequest, PositionUpdate, Settlement};
use async_trait::async_trait;

#[async_trait]
pub trait OrderExecutor: Send + Sync {
    /// Submit a new order; returns the order id on fill
    async fn submit_order(&self, request: &OrderRequest) -> EngineResult<String>;

    /// Request an early close; resolves with the settlement
    async fn close_position(&self, order_id: &str) -> EngineResult<Settlement>;

    /// Poll the running P&L of an open position
    async fn poll_position(&self, order_id: &str) -> EngineResult<PositionUpdate>;
}
