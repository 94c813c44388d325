use std::sync::Arc;
use std::time::Duration;

use trendbot::arguments::{
    get_config_path_override, is_help_requested, is_simulation_enabled, print_help,
};
use trendbot::config::{Config, DEFAULT_CONFIG_PATH};
use trendbot::engine::Engine;
use trendbot::feed::SimulatedFeed;
use trendbot::logger::{self, LogTag};
use trendbot::trend::types::Recommendation;
use trendbot::trader::TradeDirection;

/// Main entry point for trendbot
///
/// Lifecycle: arguments → logger → config → engine → trading loop.
/// Without `--simulate` there is nothing to connect to - the market-data
/// transport is an external adapter - so the binary asks for it explicitly.
#[tokio::main]
async fn main() {
    logger::init();

    if is_help_requested() {
        print_help();
        std::process::exit(0);
    }

    let config_path = get_config_path_override().unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            logger::error(LogTag::Config, &format!("Failed to load config: {:#}", e));
            std::process::exit(1);
        }
    };
    logger::info(
        LogTag::Config,
        &format!(
            "Loaded {} ({} symbols, {} timeframes)",
            config_path,
            config.symbols.len(),
            config.timeframes.len()
        ),
    );

    if !is_simulation_enabled() {
        logger::error(
            LogTag::System,
            "No feed adapter wired in; run with --simulate for the built-in random-walk feed",
        );
        std::process::exit(1);
    }

    logger::info(LogTag::System, "trendbot starting up (simulated feed)");

    let feed = Arc::new(SimulatedFeed::new(0xBADC0FFE));
    let engine = Arc::new(Engine::new(config, feed.clone(), feed));

    if let Err(e) = engine.start().await {
        logger::error(LogTag::System, &format!("Engine start failed: {}", e));
        std::process::exit(1);
    }

    // Exit signal drain: log every raised exit
    if let Some(mut exit_rx) = engine.take_exit_signals().await {
        tokio::spawn(async move {
            while let Some(signal) = exit_rx.recv().await {
                logger::info(
                    LogTag::Trader,
                    &format!("Exit for {} on {}: {}", signal.order_id, signal.symbol, signal.reason),
                );
            }
        });
    }

    let trading_engine = engine.clone();
    let trading_loop = tokio::spawn(async move {
        let mut timer = tokio::time::interval(Duration::from_secs(1));
        loop {
            timer.tick().await;
            for symbol in trading_engine.config().symbols.clone() {
                match trading_engine.verdict(&symbol).await {
                    Ok(verdict) => {
                        let direction = match verdict.recommendation {
                            Recommendation::Rise => TradeDirection::Rise,
                            Recommendation::Fall => TradeDirection::Fall,
                            Recommendation::Hold => continue,
                        };
                        if trading_engine.has_open_position(&symbol).await {
                            continue;
                        }
                        match trading_engine.open_position(&symbol, direction).await {
                            Ok(order_id) => {
                                logger::info(
                                    LogTag::Trader,
                                    &format!(
                                        "Entered {} on {} (confidence {:.2}, order {})",
                                        direction, symbol, verdict.confidence, order_id
                                    ),
                                );
                            }
                            Err(e) => {
                                logger::warning(
                                    LogTag::Trader,
                                    &format!("Entry on {} failed: {}", symbol, e),
                                );
                            }
                        }
                    }
                    Err(e) if e.is_insufficient_data() => {
                        logger::debug(LogTag::Trend, &format!("{}", e));
                    }
                    Err(e) => {
                        logger::warning(LogTag::Trend, &format!("{}: {}", symbol, e));
                    }
                }
            }
        }
    });

    // Periodic status summary
    let status_engine = engine.clone();
    let status_loop = tokio::spawn(async move {
        let mut timer = tokio::time::interval(Duration::from_secs(10));
        loop {
            timer.tick().await;
            for status in status_engine.status().await {
                logger::info(
                    LogTag::System,
                    &format!("{}: {}", status.symbol, status.status),
                );
            }
        }
    });

    match tokio::signal::ctrl_c().await {
        Ok(()) => logger::info(LogTag::System, "Interrupt received, shutting down"),
        Err(e) => logger::error(LogTag::System, &format!("Signal handler failed: {}", e)),
    }

    trading_loop.abort();
    status_loop.abort();
    engine.shutdown().await;
    logger::info(LogTag::System, "Goodbye");
}
