//! Position risk monitor
//!
//! One monitor per open order. The state machine itself (`PositionMonitor`)
//! is pure and synchronous - every decision is a function of the P&L feed
//! and the live alignment verdict - while `run_monitor` drives it from a
//! periodic poll task and owns the boundary calls.
//!
//! Exit rules, first match wins on every update:
//! 1. P&L fell back to the armed trailing stop level
//! 2. The symbol's alignment verdict degraded to mixed
//! 3. The counterparty settled the contract

use crate::config::RiskConfig;
use crate::errors::{EngineError, EngineResult};
use crate::logger::{self, LogTag};
use crate::trader::execution::OrderExecutor;
use crate::trader::types::{ExitReason, ExitSignal, MonitorState, PositionUpdate, Settlement};
use crate::trend::types::{Alignment, AlignmentVerdict};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, timeout};

/// Bounded timeout for a single poll call
const POLL_CALL_TIMEOUT_SECS: u64 = 5;

/// Per-position risk state machine
#[derive(Debug, Clone)]
pub struct PositionMonitor {
    order_id: String,
    symbol: String,
    entry_price: f64,
    /// Alignment verdict that justified the entry
    entry_snapshot: AlignmentVerdict,
    state: MonitorState,
    pnl: f64,
    max_profit: f64,
    trailing_stop: Option<f64>,
    breakeven_active: bool,
    breakeven_trigger: f64,
    trailing_step: f64,
}

impl PositionMonitor {
    pub fn new(
        order_id: impl Into<String>,
        symbol: impl Into<String>,
        entry_price: f64,
        entry_snapshot: AlignmentVerdict,
        risk: &RiskConfig,
    ) -> Self {
        Self {
            order_id: order_id.into(),
            symbol: symbol.into(),
            entry_price,
            entry_snapshot,
            state: MonitorState::Open,
            pnl: 0.0,
            max_profit: 0.0,
            trailing_stop: None,
            breakeven_active: false,
            breakeven_trigger: risk.breakeven_trigger,
            trailing_step: risk.trailing_step,
        }
    }

    pub fn order_id(&self) -> &str {
        &self.order_id
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn entry_price(&self) -> f64 {
        self.entry_price
    }

    pub fn entry_snapshot(&self) -> &AlignmentVerdict {
        &self.entry_snapshot
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn pnl(&self) -> f64 {
        self.pnl
    }

    pub fn max_profit(&self) -> f64 {
        self.max_profit
    }

    /// Armed trailing stop level, if any
    pub fn trailing_stop(&self) -> Option<f64> {
        self.trailing_stop
    }

    pub fn breakeven_active(&self) -> bool {
        self.breakeven_active
    }

    /// Feed one P&L observation through the state machine
    ///
    /// Updates peak profit, breakeven and trailing stop, then checks the
    /// trailing exit rule. Ignored outside the `Open` state.
    pub fn on_pnl(&mut self, pnl: f64) -> Option<ExitReason> {
        if self.state != MonitorState::Open {
            return None;
        }

        self.pnl = pnl;
        if pnl > self.max_profit {
            self.max_profit = pnl;
        }

        // Breakeven: once triggered, the stop never sits below zero again
        if !self.breakeven_active && pnl >= self.breakeven_trigger {
            self.breakeven_active = true;
            self.raise_stop(0.0);
        }

        // Trailing: follow peak profit at a fixed step, monotonically
        if self.max_profit > self.trailing_step {
            self.raise_stop(self.max_profit - self.trailing_step);
        }

        match self.trailing_stop {
            Some(stop) if pnl <= stop => Some(ExitReason::TrailingStop {
                pnl,
                stop_level: stop,
            }),
            _ => None,
        }
    }

    /// Check the live alignment verdict; mixed alignment forces an exit
    ///
    /// Neutral is agreement about the absence of a trend and does not force
    /// an exit; only disagreement (mixed) does.
    pub fn on_alignment(&self, verdict: &AlignmentVerdict) -> Option<ExitReason> {
        if self.state != MonitorState::Open {
            return None;
        }
        if verdict.alignment == Alignment::Mixed {
            return Some(ExitReason::AlignmentDegraded);
        }
        None
    }

    /// Transition `Open → Closing`; the close request is issued exactly once
    pub fn begin_close(&mut self) {
        if self.state == MonitorState::Open {
            self.state = MonitorState::Closing;
        }
    }

    /// Transition to `Closed` on settlement confirmation
    pub fn confirm_settled(&mut self) {
        self.state = MonitorState::Closed;
    }

    /// Stop level only ever moves up
    fn raise_stop(&mut self, candidate: f64) {
        let new_stop = match self.trailing_stop {
            Some(current) => current.max(candidate),
            None => candidate,
        };
        self.trailing_stop = Some(new_stop);
    }
}

/// Drive a monitor from a periodic poll until it exits
///
/// Polls the executor at `risk.poll_interval_secs`, feeds the state machine
/// and the live verdict channel, and on an exit trigger issues one close
/// request. Returns the settlement, `Ok(None)` on shutdown, or
/// `EngineError::SettlementTimeout` when the close confirmation never
/// arrives - the task always terminates, timers are never leaked.
pub async fn run_monitor(
    mut monitor: PositionMonitor,
    executor: Arc<dyn OrderExecutor>,
    verdicts: watch::Receiver<EngineResult<AlignmentVerdict>>,
    exit_tx: mpsc::UnboundedSender<ExitSignal>,
    risk: RiskConfig,
    mut shutdown: watch::Receiver<bool>,
) -> EngineResult<Option<Settlement>> {
    let mut poll_timer = interval(Duration::from_secs(risk.poll_interval_secs.max(1)));

    logger::info(
        LogTag::Monitor,
        &format!(
            "Monitoring position {} on {} (entry {:.5})",
            monitor.order_id(),
            monitor.symbol(),
            monitor.entry_price()
        ),
    );

    loop {
        tokio::select! {
            _ = poll_timer.tick() => {}
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    logger::info(
                        LogTag::Monitor,
                        &format!("Monitor for {} shutting down", monitor.order_id()),
                    );
                    return Ok(None);
                }
                continue;
            }
        }

        let update = match timeout(
            Duration::from_secs(POLL_CALL_TIMEOUT_SECS),
            executor.poll_position(monitor.order_id()),
        )
        .await
        {
            Ok(Ok(update)) => update,
            Ok(Err(e)) => {
                // A single failed poll is not fatal; next tick retries the
                // read (the engine never replays the same request).
                logger::warning(
                    LogTag::Monitor,
                    &format!("Poll failed for {}: {}", monitor.order_id(), e),
                );
                continue;
            }
            Err(_) => {
                logger::warning(
                    LogTag::Monitor,
                    &format!(
                        "Poll for {} timed out after {}s",
                        monitor.order_id(),
                        POLL_CALL_TIMEOUT_SECS
                    ),
                );
                continue;
            }
        };

        // Settlement notice from upstream wins over everything else
        if let Some(settlement) = update.settlement {
            monitor.confirm_settled();
            raise_exit(&exit_tx, &monitor, ExitReason::Settled);
            logger::info(
                LogTag::Monitor,
                &format!(
                    "Position {} settled upstream, pnl {:.4}",
                    monitor.order_id(),
                    settlement.pnl
                ),
            );
            return Ok(Some(settlement));
        }

        // An insufficient-data verdict is a state, not a degradation; only a
        // computed mixed verdict forces an exit
        let exit_reason = monitor
            .on_pnl(update.pnl)
            .or_else(|| match &*verdicts.borrow() {
                Ok(verdict) => monitor.on_alignment(verdict),
                Err(_) => None,
            });

        let Some(reason) = exit_reason else {
            logger::debug(
                LogTag::Monitor,
                &format!(
                    "{}: pnl {:.4}, peak {:.4}, stop {:?}",
                    monitor.order_id(),
                    monitor.pnl(),
                    monitor.max_profit(),
                    monitor.trailing_stop()
                ),
            );
            continue;
        };

        monitor.begin_close();
        raise_exit(&exit_tx, &monitor, reason.clone());
        logger::info(
            LogTag::Monitor,
            &format!("Closing {}: {}", monitor.order_id(), reason),
        );

        // One close request; bounded wait for the settlement confirmation
        return match timeout(
            Duration::from_secs(risk.settlement_timeout_secs),
            executor.close_position(monitor.order_id()),
        )
        .await
        {
            Ok(Ok(settlement)) => {
                monitor.confirm_settled();
                logger::info(
                    LogTag::Monitor,
                    &format!(
                        "Position {} closed, pnl {:.4}",
                        monitor.order_id(),
                        settlement.pnl
                    ),
                );
                Ok(Some(settlement))
            }
            Ok(Err(e)) => {
                logger::error(
                    LogTag::Monitor,
                    &format!("Close failed for {}: {}", monitor.order_id(), e),
                );
                Err(e)
            }
            Err(_) => {
                let err = EngineError::SettlementTimeout {
                    order_id: monitor.order_id().to_string(),
                    seconds: risk.settlement_timeout_secs,
                };
                logger::error(LogTag::Monitor, &err.to_string());
                Err(err)
            }
        };
    }
}

fn raise_exit(exit_tx: &mpsc::UnboundedSender<ExitSignal>, monitor: &PositionMonitor, reason: ExitReason) {
    let _ = exit_tx.send(ExitSignal {
        order_id: monitor.order_id().to_string(),
        symbol: monitor.symbol().to_string(),
        reason,
        raised_at: Utc::now(),
    });
}
