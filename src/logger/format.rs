//! Log formatting and output with ANSI colors
//!
//! Handles:
//! - Colorized console output with tag and level formatting
//! - Broken pipe handling for piped commands

use super::tags::LogTag;
use chrono::Local;
use colored::*;
use std::io::{stdout, ErrorKind, Write};

/// Log format widths for alignment
const TAG_WIDTH: usize = 8;
const LEVEL_WIDTH: usize = 7;

/// Format and output a log message
pub fn format_and_log(tag: LogTag, log_type: &str, message: &str) {
    let time = Local::now().format("%H:%M:%S").to_string();
    let prefix = format!("{} ", time).dimmed().to_string();

    let tag_str = format_tag(&tag);
    let log_type_str = format_log_type(log_type);

    let line = format!("{}[{}] [{}] {}", prefix, tag_str, log_type_str, message);
    print_stdout_safe(&line);
}

/// Format a tag with appropriate color
fn format_tag(tag: &LogTag) -> ColoredString {
    match tag {
        LogTag::System => format!("{:<width$}", "SYSTEM", width = TAG_WIDTH)
            .bright_yellow()
            .bold(),
        LogTag::Config => format!("{:<width$}", "CONFIG", width = TAG_WIDTH)
            .bright_white()
            .bold(),
        LogTag::Feed => format!("{:<width$}", "FEED", width = TAG_WIDTH)
            .bright_blue()
            .bold(),
        LogTag::Candles => format!("{:<width$}", "CANDLES", width = TAG_WIDTH)
            .bright_cyan()
            .bold(),
        LogTag::Trend => format!("{:<width$}", "TREND", width = TAG_WIDTH)
            .bright_magenta()
            .bold(),
        LogTag::Trader => format!("{:<width$}", "TRADER", width = TAG_WIDTH)
            .bright_green()
            .bold(),
        LogTag::Monitor => format!("{:<width$}", "MONITOR", width = TAG_WIDTH)
            .bright_cyan()
            .bold(),
    }
}

/// Format a log level / type with appropriate color
fn format_log_type(log_type: &str) -> ColoredString {
    let padded = format!("{:<width$}", log_type, width = LEVEL_WIDTH);
    match log_type {
        "ERROR" => padded.bright_red().bold(),
        "WARNING" => padded.bright_yellow(),
        "INFO" => padded.normal(),
        "DEBUG" => padded.bright_purple(),
        "VERBOSE" => padded.dimmed(),
        _ => padded.normal(),
    }
}

/// Print to stdout, swallowing broken pipe errors
///
/// When output is piped (e.g. `trendbot | head`) the pipe may close early;
/// panicking on that would take the whole bot down.
fn print_stdout_safe(line: &str) {
    let mut out = stdout();
    if let Err(e) = writeln!(out, "{}", line) {
        if e.kind() == ErrorKind::BrokenPipe {
            std::process::exit(0);
        }
    }
    let _ = out.flush();
}
