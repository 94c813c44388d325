/// Core logging implementation with automatic filtering
///
/// Checks if a log should be displayed based on level and tag, then delegates
/// to the format module for writing.
use super::config::{get_logger_config, is_debug_enabled_for_tag, is_verbose_enabled};
use super::levels::LogLevel;
use super::tags::LogTag;

/// Check if a log message should be displayed
///
/// Filtering rules:
/// 1. Errors are always shown
/// 2. Check against minimum log level threshold
/// 3. Debug level requires --debug-<module> flag for that tag
/// 4. Verbose level requires the --verbose flag
pub fn should_log(tag: &LogTag, level: LogLevel) -> bool {
    let config = get_logger_config();

    // Rule 1: Errors always log (critical)
    if level == LogLevel::Error {
        return true;
    }

    // Rule 2: Check minimum level threshold
    if level > config.min_level {
        return false;
    }

    // Rule 3: Debug level requires debug mode for that specific tag
    if level == LogLevel::Debug {
        return is_debug_enabled_for_tag(tag) || is_verbose_enabled();
    }

    // Rule 4: Verbose requires the explicit --verbose flag
    if level == LogLevel::Verbose {
        return is_verbose_enabled();
    }

    true
}

/// Internal logging function with automatic filtering
pub fn log_internal(tag: LogTag, level: LogLevel, message: &str) {
    if !should_log(&tag, level) {
        return;
    }

    super::format::format_and_log(tag, level.as_str(), message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::config::{set_logger_config, LoggerConfig};

    #[test]
    fn test_errors_always_pass() {
        let _guard = crate::logger::config::TEST_CONFIG_LOCK
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        set_logger_config(LoggerConfig::default());
        assert!(should_log(&LogTag::Feed, LogLevel::Error));
    }

    #[test]
    fn test_debug_requires_flag() {
        let _guard = crate::logger::config::TEST_CONFIG_LOCK
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        set_logger_config(LoggerConfig::default());
        assert!(!should_log(&LogTag::Candles, LogLevel::Debug));

        let mut config = LoggerConfig::default();
        config.min_level = LogLevel::Debug;
        config.debug_tags.insert("candles");
        set_logger_config(config);
        assert!(should_log(&LogTag::Candles, LogLevel::Debug));
        assert!(!should_log(&LogTag::Trader, LogLevel::Debug));

        set_logger_config(LoggerConfig::default());
    }
}
