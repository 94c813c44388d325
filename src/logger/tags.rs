//! Log tags identifying the subsystem a message originates from

/// Subsystem tag attached to every log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogTag {
    System,
    Config,
    Feed,
    Candles,
    Trend,
    Trader,
    Monitor,
}

impl LogTag {
    /// Key used for --debug-<key> command-line flags
    pub fn to_debug_key(&self) -> &'static str {
        match self {
            LogTag::System => "system",
            LogTag::Config => "config",
            LogTag::Feed => "feed",
            LogTag::Candles => "candles",
            LogTag::Trend => "trend",
            LogTag::Trader => "trader",
            LogTag::Monitor => "monitor",
        }
    }

    /// Plain uppercase name for non-colored output
    pub fn to_plain_string(&self) -> &'static str {
        match self {
            LogTag::System => "SYSTEM",
            LogTag::Config => "CONFIG",
            LogTag::Feed => "FEED",
            LogTag::Candles => "CANDLES",
            LogTag::Trend => "TREND",
            LogTag::Trader => "TRADER",
            LogTag::Monitor => "MONITOR",
        }
    }

    /// All tags, used when enumerating debug flags
    pub fn all() -> &'static [LogTag] {
        &[
            LogTag::System,
            LogTag::Config,
            LogTag::Feed,
            LogTag::Candles,
            LogTag::Trend,
            LogTag::Trader,
            LogTag::Monitor,
        ]
    }
}

impl std::fmt::Display for LogTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_plain_string())
    }
}
