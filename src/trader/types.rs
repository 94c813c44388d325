use chrono::{ DateTime, Utc };
use serde::{ Deserialize, Serialize };

/// Direction of a submitted contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeDirection {
    Rise,
    Fall,
}

impl TradeDirection {
    /// +1 for Rise, -1 for Fall; used when turning price moves into P&L
    pub fn sign(&self) -> f64 {
        match self {
            TradeDirection::Rise => 1.0,
            TradeDirection::Fall => -1.0,
        }
    }
}

impl std::fmt::Display for TradeDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeDirection::Rise => write!(f, "RISE"),
            TradeDirection::Fall => write!(f, "FALL"),
        }
    }
}

/// Order submission request passed to the executor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub direction: TradeDirection,
    pub stake: f64,
    pub duration_ticks: u32,
}

/// Periodic position snapshot from the executor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionUpdate {
    pub order_id: String,
    pub current_price: f64,
    pub pnl: f64,
    /// Present when the counterparty already settled the contract
    #[serde(default)]
    pub settlement: Option<Settlement>,
}

/// Final settlement of a closed position
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settlement {
    pub order_id: String,
    pub pnl: f64,
    pub settled_at: DateTime<Utc>,
}

/// Position monitor lifecycle states
///
/// `Open → Closing → Closed`; `Closing` is entered exactly once, when the
/// close request is issued, and further price updates are ignored until the
/// settlement confirmation arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MonitorState {
    Open,
    Closing,
    Closed,
}

/// Why a position exit was raised
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExitReason {
    /// P&L fell back to the armed trailing stop level
    TrailingStop {
        pnl: f64,
        stop_level: f64,
    },
    /// The live alignment verdict for the symbol degraded to mixed
    AlignmentDegraded,
    /// Counterparty settled the contract
    Settled,
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitReason::TrailingStop { pnl, stop_level } => {
                write!(f, "trailing stop hit (pnl {:.4} <= stop {:.4})", pnl, stop_level)
            }
            ExitReason::AlignmentDegraded => write!(f, "timeframe alignment degraded to mixed"),
            ExitReason::Settled => write!(f, "settled by counterparty"),
        }
    }
}

/// Exit notification pushed to the engine's exit channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitSignal {
    pub order_id: String,
    pub symbol: String,
    pub reason: ExitReason,
    pub raised_at: DateTime<Utc>,
}
