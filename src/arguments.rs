/// Centralized argument handling for trendbot
///
/// Consolidates command-line argument parsing and debug flag checking so the
/// rest of the code never touches `env::args()` directly.
///
/// Features:
/// - Centralized CMD_ARGS storage with thread-safe access
/// - Debug flag checking functions for all modules
/// - Unified argument parsing utilities
use once_cell::sync::Lazy;
use std::env;
use std::sync::Mutex;

/// Global command-line arguments storage
/// Thread-safe singleton that stores arguments for access throughout the application
pub static CMD_ARGS: Lazy<Mutex<Vec<String>>> = Lazy::new(|| Mutex::new(env::args().collect()));

/// Sets the global command-line arguments
/// Used by tests to override the default env::args() collection
pub fn set_cmd_args(args: Vec<String>) {
    if let Ok(mut cmd_args) = CMD_ARGS.lock() {
        *cmd_args = args;
    }
}

/// Gets a copy of the current command-line arguments
/// Returns a vector clone to avoid holding the mutex lock
pub fn get_cmd_args() -> Vec<String> {
    match CMD_ARGS.lock() {
        Ok(args) => args.clone(),
        Err(_) => {
            // Fallback to env::args if mutex is poisoned
            env::args().collect()
        }
    }
}

/// Checks if a specific argument is present in the command line
pub fn has_arg(arg: &str) -> bool {
    get_cmd_args().iter().any(|a| a == arg)
}

/// Gets the value of a command-line argument that follows a flag
/// Returns None if the flag is not found or has no value
pub fn get_arg_value(flag: &str) -> Option<String> {
    let args = get_cmd_args();
    for (i, arg) in args.iter().enumerate() {
        if arg == flag && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
    }
    None
}

// =============================================================================
// DEBUG FLAG CHECKING FUNCTIONS
// These functions check for specific debug flags in the command-line arguments
// =============================================================================

/// Tick feed debug mode
pub fn is_debug_feed_enabled() -> bool {
    has_arg("--debug-feed")
}

/// Candle aggregation debug mode
pub fn is_debug_candles_enabled() -> bool {
    has_arg("--debug-candles")
}

/// Trend engine debug mode
pub fn is_debug_trend_enabled() -> bool {
    has_arg("--debug-trend")
}

/// Trader / position monitor debug mode
pub fn is_debug_trader_enabled() -> bool {
    has_arg("--debug-trader")
}

/// Global verbose mode
pub fn is_verbose_enabled() -> bool {
    has_arg("--verbose")
}

/// Simulation mode: run against the built-in random-walk feed
pub fn is_simulation_enabled() -> bool {
    has_arg("--simulate")
}

/// Help request
pub fn is_help_requested() -> bool {
    has_arg("--help") || has_arg("-h")
}

/// Config file path override (`--config <path>`)
pub fn get_config_path_override() -> Option<String> {
    get_arg_value("--config")
}

/// Print the command-line help text
pub fn print_help() {
    println!("trendbot - multi-timeframe trend engine for tick-driven markets");
    println!();
    println!("USAGE:");
    println!("  trendbot [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("  --config <path>     Use an alternative config file");
    println!("  --simulate          Run against the built-in simulated feed");
    println!("  --verbose           Show verbose log output");
    println!("  --debug-feed        Debug logs for the tick feed");
    println!("  --debug-candles     Debug logs for candle aggregation");
    println!("  --debug-trend       Debug logs for the trend engine");
    println!("  --debug-trader      Debug logs for the position monitor");
    println!("  -h, --help          Print this help text");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arg_value_extraction() {
        set_cmd_args(vec![
            "trendbot".to_string(),
            "--config".to_string(),
            "custom.toml".to_string(),
            "--debug-candles".to_string(),
        ]);

        assert_eq!(get_arg_value("--config"), Some("custom.toml".to_string()));
        assert!(has_arg("--debug-candles"));
        assert!(!has_arg("--debug-trend"));
        assert_eq!(get_arg_value("--missing"), None);

        // Restore real args for other tests
        set_cmd_args(env::args().collect());
    }
}
