//! Structured error types for the trendbot engine
//!
//! The taxonomy matters to callers: `InvalidInput` is dropped-and-logged and
//! never fatal, `InsufficientData` is a legitimate state that callers branch
//! on, `Upstream` propagates with operation context and leaves retrying to
//! the caller, `InvariantViolation` and `SettlementTimeout` are fatal for the
//! affected symbol pipeline / position only.

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum EngineError {
    #[error("Invalid input: {0}")] InvalidInput(String),

    #[error("Insufficient data for {symbol}: have {have}, need {need} samples")] InsufficientData {
        symbol: String,
        have: usize,
        need: usize,
    },

    #[error("Upstream unavailable during {operation}: {reason}")] Upstream {
        operation: String,
        reason: String,
    },

    #[error("Invariant violation in {context}: {details}")] InvariantViolation {
        context: String,
        details: String,
    },

    #[error("No settlement for order {order_id} after {seconds}s")] SettlementTimeout {
        order_id: String,
        seconds: u64,
    },

    #[error("Configuration error: {0}")] Config(String),

    #[error("Unknown symbol: {0}")] UnknownSymbol(String),
}

impl EngineError {
    /// Whether the caller may retry the failed operation.
    ///
    /// Only upstream failures are retryable; the engine itself never retries
    /// them. Invariant violations and settlement timeouts indicate a defect
    /// or a dead position and must not be retried.
    pub fn is_recoverable(&self) -> bool {
        match self {
            EngineError::Upstream { .. } => true,
            EngineError::InvalidInput(_) => true,
            EngineError::InsufficientData { .. } => true,
            EngineError::InvariantViolation { .. } => false,
            EngineError::SettlementTimeout { .. } => false,
            EngineError::Config(_) => false,
            EngineError::UnknownSymbol(_) => false,
        }
    }

    /// True when the error is the "not enough history yet" state.
    pub fn is_insufficient_data(&self) -> bool {
        matches!(self, EngineError::InsufficientData { .. })
    }

    pub fn upstream(operation: &str, reason: impl ToString) -> Self {
        EngineError::Upstream {
            operation: operation.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn invariant(context: &str, details: impl ToString) -> Self {
        EngineError::InvariantViolation {
            context: context.to_string(),
            details: details.to_string(),
        }
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
