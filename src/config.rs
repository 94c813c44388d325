use anyhow::{ Context, Result };
use serde::{ Deserialize, Serialize };
use std::fs;
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "trendbot.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Symbols to subscribe and analyze
    pub symbols: Vec<String>,
    pub candles: CandleConfig,
    pub trend: TrendConfig,
    #[serde(default)]
    pub timeframes: Vec<TimeframeConfig>,
    pub risk: RiskConfig,
    pub trading: TradingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandleConfig {
    /// Ticks folded into one candle
    pub ticks_per_candle: u32,
    /// Bounded per-symbol candle history, oldest evicted first
    pub max_candles: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendConfig {
    /// Pipelines that must agree before a recommendation is emitted
    pub min_aligned_count: usize,
    /// Samples for the short-term confirmation check
    pub confirmation_window: usize,
    /// Base multiplier for the adaptive direction threshold
    pub threshold_base: f64,
    /// Window for the recent price range feeding the adaptive threshold
    pub range_window: usize,
    /// Decycler smoothing constant (0 < alpha < 1)
    pub decycler_alpha: f64,
}

/// One trend pipeline: window length and indicator period
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeframeConfig {
    pub sample_count: usize,
    pub smoothing_period: usize,
    #[serde(default)]
    pub granularity: Granularity,
}

/// Input granularity of a pipeline: raw ticks or completed candles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    #[default]
    Tick,
    Candle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Absolute P&L at which breakeven protection activates
    pub breakeven_trigger: f64,
    /// Distance the trailing stop keeps below max profit
    pub trailing_step: f64,
    /// Position poll cadence in seconds
    pub poll_interval_secs: u64,
    /// Fatal timeout waiting for settlement confirmation
    pub settlement_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    /// Stake per order in account currency
    pub stake: f64,
    /// Contract duration in ticks
    pub duration_ticks: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            symbols: vec!["R_100".to_string()],
            candles: CandleConfig {
                ticks_per_candle: 5,
                max_candles: 500,
            },
            trend: TrendConfig {
                min_aligned_count: 3,
                confirmation_window: 30,
                threshold_base: 0.02,
                range_window: 50,
                decycler_alpha: 0.07,
            },
            timeframes: vec![
                TimeframeConfig {
                    sample_count: 1000,
                    smoothing_period: 50,
                    granularity: Granularity::Tick,
                },
                TimeframeConfig {
                    sample_count: 2000,
                    smoothing_period: 70,
                    granularity: Granularity::Tick,
                },
                TimeframeConfig {
                    sample_count: 3000,
                    smoothing_period: 90,
                    granularity: Granularity::Tick,
                },
                TimeframeConfig {
                    sample_count: 4000,
                    smoothing_period: 110,
                    granularity: Granularity::Tick,
                }
            ],
            risk: RiskConfig {
                breakeven_trigger: 0.5,
                trailing_step: 0.35,
                poll_interval_secs: 1,
                settlement_timeout_secs: 30,
            },
            trading: TradingConfig {
                stake: 1.0,
                duration_ticks: 10,
            },
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        if !Path::new(path).exists() {
            let default_config = Self::default();
            default_config.save(path)?;
            return Ok(default_config);
        }

        let content = fs
            ::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: Self = toml
            ::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;

        config.validate().with_context(|| format!("Invalid config in {}", path))?;

        Ok(config)
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self).with_context(|| "Failed to serialize config")?;

        fs::write(path, content).with_context(|| format!("Failed to write config file: {}", path))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.symbols.is_empty() {
            return Err(anyhow::anyhow!("at least one symbol is required"));
        }
        if self.candles.ticks_per_candle < 1 {
            return Err(anyhow::anyhow!("ticks_per_candle must be >= 1"));
        }
        if self.candles.max_candles < 1 {
            return Err(anyhow::anyhow!("max_candles must be >= 1"));
        }
        if self.timeframes.is_empty() {
            return Err(anyhow::anyhow!("at least one timeframe is required"));
        }
        if self.trend.min_aligned_count > self.timeframes.len() {
            return Err(
                anyhow::anyhow!(
                    "min_aligned_count ({}) exceeds timeframe count ({})",
                    self.trend.min_aligned_count,
                    self.timeframes.len()
                )
            );
        }
        if !(self.trend.decycler_alpha > 0.0 && self.trend.decycler_alpha < 1.0) {
            return Err(anyhow::anyhow!("decycler_alpha must be in (0, 1)"));
        }
        for tf in &self.timeframes {
            if tf.smoothing_period < 4 {
                return Err(anyhow::anyhow!("smoothing_period must be >= 4"));
            }
            if tf.sample_count < tf.smoothing_period * 2 {
                return Err(
                    anyhow::anyhow!(
                        "sample_count ({}) too small for smoothing_period ({})",
                        tf.sample_count,
                        tf.smoothing_period
                    )
                );
            }
        }
        if self.risk.trailing_step <= 0.0 {
            return Err(anyhow::anyhow!("trailing_step must be positive"));
        }
        if self.trading.stake <= 0.0 {
            return Err(anyhow::anyhow!("stake must be positive"));
        }
        Ok(())
    }
}
