/// Logger configuration derived from command-line arguments
///
/// Holds the minimum level threshold and the per-tag debug/verbose switches.
/// Initialized once at startup via `init_from_args()`; readable from any
/// thread afterwards.
use super::levels::LogLevel;
use super::tags::LogTag;
use crate::arguments::{get_arg_value, has_arg};
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::sync::RwLock;

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Minimum level that gets displayed (Error always passes)
    pub min_level: LogLevel,
    /// Tags with --debug-<tag> enabled
    pub debug_tags: HashSet<&'static str>,
    /// Global --verbose switch
    pub verbose: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            debug_tags: HashSet::new(),
            verbose: false,
        }
    }
}

static LOGGER_CONFIG: Lazy<RwLock<LoggerConfig>> =
    Lazy::new(|| RwLock::new(LoggerConfig::default()));

/// Serializes tests that mutate the global logger configuration
#[cfg(test)]
pub(crate) static TEST_CONFIG_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// Current logger configuration (cloned snapshot)
pub fn get_logger_config() -> LoggerConfig {
    LOGGER_CONFIG
        .read()
        .map(|c| c.clone())
        .unwrap_or_default()
}

/// Replace the logger configuration (used by tests)
pub fn set_logger_config(config: LoggerConfig) {
    if let Ok(mut current) = LOGGER_CONFIG.write() {
        *current = config;
    }
}

/// Build the configuration from command-line arguments
///
/// Recognized flags:
/// - `--log-level <level>` minimum level threshold
/// - `--debug-<tag>` per-module debug switches
/// - `--verbose` global verbose switch
pub fn init_from_args() {
    let mut config = LoggerConfig::default();

    if let Some(level) = get_arg_value("--log-level").and_then(|v| LogLevel::from_str(&v)) {
        config.min_level = level;
    }

    for tag in LogTag::all() {
        let flag = format!("--debug-{}", tag.to_debug_key());
        if has_arg(&flag) {
            config.debug_tags.insert(tag.to_debug_key());
        }
    }

    config.verbose = has_arg("--verbose");
    if config.verbose {
        config.min_level = LogLevel::Verbose;
    } else if !config.debug_tags.is_empty() && config.min_level < LogLevel::Debug {
        // --debug-<tag> raises the threshold so the tag's debug lines pass
        config.min_level = LogLevel::Debug;
    }

    set_logger_config(config);
}

/// Whether --debug-<tag> was given for this tag
pub fn is_debug_enabled_for_tag(tag: &LogTag) -> bool {
    get_logger_config().debug_tags.contains(tag.to_debug_key())
}

/// Whether verbose output is enabled
pub fn is_verbose_enabled() -> bool {
    get_logger_config().verbose
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_flag_gating() {
        let _guard = TEST_CONFIG_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let mut config = LoggerConfig::default();
        config.debug_tags.insert("candles");
        config.min_level = LogLevel::Debug;
        set_logger_config(config);

        assert!(is_debug_enabled_for_tag(&LogTag::Candles));
        assert!(!is_debug_enabled_for_tag(&LogTag::Trend));

        set_logger_config(LoggerConfig::default());
    }
}
