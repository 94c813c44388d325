//! Alignment verdict across timeframe pipelines

use crate::config::{Granularity, TimeframeConfig, TrendConfig};
use crate::errors::{EngineError, EngineResult};
use crate::indicators::price_range;
use crate::logger::{self, LogTag};
use crate::trend::pipeline::{evaluate_window, TimeframePipeline};
use crate::trend::types::{
    Alignment, AlignmentVerdict, Recommendation, TimeframeTrend, TrendDirection,
};
use std::collections::VecDeque;

/// Per-symbol multi-timeframe trend engine
///
/// Owns one pipeline per configured timeframe plus a short buffer of the
/// most recent prices for the confirmation check. Constructed explicitly by
/// the caller; configuration is passed in, nothing is global.
pub struct TrendEngine {
    symbol: String,
    config: TrendConfig,
    pipelines: Vec<TimeframePipeline>,
    /// Most recent raw prices for the short-term confirmation check
    recent: VecDeque<f64>,
}

impl TrendEngine {
    pub fn new(symbol: impl Into<String>, timeframes: &[TimeframeConfig], trend: &TrendConfig) -> Self {
        let pipelines = timeframes
            .iter()
            .map(|tf| TimeframePipeline::new(tf, trend))
            .collect();
        Self {
            symbol: symbol.into(),
            config: trend.clone(),
            pipelines,
            recent: VecDeque::with_capacity(trend.confirmation_window),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Feed a live tick price: tick-granularity pipelines plus the
    /// confirmation buffer
    pub fn on_tick(&mut self, price: f64) {
        if self.recent.len() == self.config.confirmation_window {
            self.recent.pop_front();
        }
        self.recent.push_back(price);

        for pipeline in &mut self.pipelines {
            if pipeline.granularity() == Granularity::Tick {
                pipeline.push(price);
            }
        }
    }

    /// Feed a completed candle close to candle-granularity pipelines
    pub fn on_candle_close(&mut self, close: f64) {
        for pipeline in &mut self.pipelines {
            if pipeline.granularity() == Granularity::Candle {
                pipeline.push(close);
            }
        }
    }

    /// Drop all pipeline state for this symbol
    ///
    /// Used when the candle aggregator aborts the symbol after an invariant
    /// violation; stale windows must not survive into a restart.
    pub fn reset(&mut self) {
        let config = self.config.clone();
        for pipeline in &mut self.pipelines {
            let rebuilt = TimeframePipeline::new(
                &TimeframeConfig {
                    sample_count: pipeline.sample_count(),
                    smoothing_period: pipeline.smoothing_period(),
                    granularity: pipeline.granularity(),
                },
                &config,
            );
            *pipeline = rebuilt;
        }
        self.recent.clear();
    }

    /// Current alignment verdict
    ///
    /// `Err(InsufficientData)` until every pipeline holds its full window;
    /// afterwards always a verdict object, never silence.
    pub fn verdict(&self) -> EngineResult<AlignmentVerdict> {
        let mut trends = Vec::with_capacity(self.pipelines.len());
        for pipeline in &self.pipelines {
            match pipeline.evaluate() {
                Some(trend) => trends.push(trend),
                None => {
                    return Err(EngineError::InsufficientData {
                        symbol: self.symbol.clone(),
                        have: pipeline.len(),
                        need: pipeline.sample_count(),
                    });
                }
            }
        }

        let verdict = combine_verdict(&trends, self.config.min_aligned_count, self.confirmation());

        logger::debug(
            LogTag::Trend,
            &format!(
                "{}: {:?} confidence {:.2} -> {:?}",
                self.symbol, verdict.alignment, verdict.confidence, verdict.recommendation
            ),
        );

        Ok(verdict)
    }

    /// Re-derive direction from the most recent short window
    ///
    /// `None` when the buffer is still too short to classify.
    fn confirmation(&self) -> Option<TrendDirection> {
        let recent: Vec<f64> = self.recent.iter().copied().collect();
        let period = (self.config.confirmation_window / 2).max(4);
        let threshold =
            price_range(&recent, self.config.confirmation_window) * self.config.threshold_base;
        evaluate_window(&recent, period, self.config.decycler_alpha, threshold)
            .map(|trend| trend.direction)
    }
}

/// Combine per-pipeline trends into the alignment verdict
///
/// Pure so the counting rules are testable with synthetic pipeline outputs.
pub(crate) fn combine_verdict(
    trends: &[TimeframeTrend],
    min_aligned: usize,
    confirmation: Option<TrendDirection>,
) -> AlignmentVerdict {
    let total = trends.len();
    let bullish = trends
        .iter()
        .filter(|t| t.direction == TrendDirection::Bullish)
        .count();
    let bearish = trends
        .iter()
        .filter(|t| t.direction == TrendDirection::Bearish)
        .count();
    let neutral = total - bullish - bearish;

    if neutral == total {
        return AlignmentVerdict::neutral();
    }

    let (alignment, confidence) = if bullish == total {
        (
            Alignment::AllBullish,
            trends.iter().map(|t| t.strength).sum::<f64>() / (total as f64),
        )
    } else if bearish == total {
        (
            Alignment::AllBearish,
            trends.iter().map(|t| t.strength).sum::<f64>() / (total as f64),
        )
    } else {
        // Mixed signals never reach full confidence
        let dominant = bullish.max(bearish) as f64;
        (Alignment::Mixed, (dominant / (total as f64)) * 0.5)
    };

    if alignment == Alignment::Mixed {
        return AlignmentVerdict {
            alignment,
            confidence,
            recommendation: Recommendation::Hold,
            reason: Some(format!(
                "timeframes disagree: {} bullish, {} bearish, {} neutral",
                bullish, bearish, neutral
            )),
        };
    }

    // Aligned, but the minimum-agreement policy still gates emission
    let aligned = bullish.max(bearish);
    if aligned < min_aligned {
        return AlignmentVerdict {
            alignment,
            confidence,
            recommendation: Recommendation::Hold,
            reason: Some(format!(
                "only {} of {} required timeframes aligned",
                aligned, min_aligned
            )),
        };
    }

    // Actionable only when the short window agrees with the long ones
    let expected = if alignment == Alignment::AllBullish {
        TrendDirection::Bullish
    } else {
        TrendDirection::Bearish
    };

    match confirmation {
        Some(direction) if direction == expected => AlignmentVerdict {
            alignment,
            confidence,
            recommendation: if expected == TrendDirection::Bullish {
                Recommendation::Rise
            } else {
                Recommendation::Fall
            },
            reason: None,
        },
        Some(direction) => AlignmentVerdict {
            alignment,
            confidence,
            recommendation: Recommendation::Hold,
            reason: Some(format!(
                "short-term confirmation disagrees ({:?})",
                direction
            )),
        },
        None => AlignmentVerdict {
            alignment,
            confidence,
            recommendation: Recommendation::Hold,
            reason: Some("insufficient short-term history for confirmation".to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trend(direction: TrendDirection, strength: f64) -> TimeframeTrend {
        TimeframeTrend {
            direction,
            strength,
            value: 100.0,
            slope: match direction {
                TrendDirection::Bullish => 1.0,
                TrendDirection::Bearish => -1.0,
                TrendDirection::Neutral => 0.0,
            },
        }
    }

    fn small_config() -> TrendConfig {
        TrendConfig {
            min_aligned_count: 2,
            confirmation_window: 30,
            threshold_base: 0.02,
            range_window: 50,
            decycler_alpha: 0.07,
        }
    }

    fn small_timeframes() -> Vec<TimeframeConfig> {
        vec![
            TimeframeConfig {
                sample_count: 40,
                smoothing_period: 10,
                granularity: Granularity::Tick,
            },
            TimeframeConfig {
                sample_count: 60,
                smoothing_period: 12,
                granularity: Granularity::Tick,
            },
        ]
    }

    #[test]
    fn test_full_agreement_at_full_strength_gives_full_confidence() {
        let trends = vec![
            trend(TrendDirection::Bullish, 1.0),
            trend(TrendDirection::Bullish, 1.0),
            trend(TrendDirection::Bullish, 1.0),
            trend(TrendDirection::Bullish, 1.0),
        ];
        let verdict = combine_verdict(&trends, 3, Some(TrendDirection::Bullish));
        assert_eq!(verdict.alignment, Alignment::AllBullish);
        assert_eq!(verdict.confidence, 1.0);
        assert_eq!(verdict.recommendation, Recommendation::Rise);
        assert_eq!(verdict.reason, None);
    }

    #[test]
    fn test_mixed_signals_are_penalized() {
        // 2 bullish + 1 bearish + 1 neutral of 4
        let trends = vec![
            trend(TrendDirection::Bullish, 0.9),
            trend(TrendDirection::Bullish, 0.8),
            trend(TrendDirection::Bearish, 0.7),
            trend(TrendDirection::Neutral, 0.0),
        ];
        let verdict = combine_verdict(&trends, 3, Some(TrendDirection::Bullish));
        assert_eq!(verdict.alignment, Alignment::Mixed);
        assert!(verdict.confidence <= 0.25);
        assert_eq!(verdict.recommendation, Recommendation::Hold);
        assert!(verdict.reason.is_some());
    }

    #[test]
    fn test_all_neutral_has_zero_confidence() {
        let trends = vec![
            trend(TrendDirection::Neutral, 0.0),
            trend(TrendDirection::Neutral, 0.0),
        ];
        let verdict = combine_verdict(&trends, 2, None);
        assert_eq!(verdict.alignment, Alignment::Neutral);
        assert_eq!(verdict.confidence, 0.0);
        assert_eq!(verdict.recommendation, Recommendation::Hold);
    }

    #[test]
    fn test_min_aligned_gate_downgrades_to_hold() {
        // Fully aligned, but fewer pipelines than the policy requires
        let trends = vec![
            trend(TrendDirection::Bearish, 0.9),
            trend(TrendDirection::Bearish, 0.9),
        ];
        let verdict = combine_verdict(&trends, 3, Some(TrendDirection::Bearish));
        assert_eq!(verdict.alignment, Alignment::AllBearish);
        assert_eq!(verdict.recommendation, Recommendation::Hold);
        assert!(verdict.reason.unwrap().contains("aligned"));
    }

    #[test]
    fn test_confirmation_disagreement_holds_with_reason() {
        let trends = vec![
            trend(TrendDirection::Bullish, 0.9),
            trend(TrendDirection::Bullish, 0.9),
            trend(TrendDirection::Bullish, 0.9),
        ];
        let verdict = combine_verdict(&trends, 3, Some(TrendDirection::Bearish));
        assert_eq!(verdict.alignment, Alignment::AllBullish);
        assert_eq!(verdict.recommendation, Recommendation::Hold);
        assert!(verdict.reason.unwrap().contains("confirmation"));
    }

    #[test]
    fn test_engine_reports_insufficient_data_first() {
        let mut engine = TrendEngine::new("R_100", &small_timeframes(), &small_config());
        for i in 0..30 {
            engine.on_tick(100.0 + i as f64);
        }
        let err = engine.verdict().unwrap_err();
        assert!(err.is_insufficient_data());
    }

    #[test]
    fn test_engine_rise_on_sustained_ramp() {
        let mut engine = TrendEngine::new("R_100", &small_timeframes(), &small_config());
        for i in 0..80 {
            engine.on_tick(100.0 + i as f64);
        }
        let verdict = engine.verdict().unwrap();
        assert_eq!(verdict.alignment, Alignment::AllBullish);
        assert_eq!(verdict.recommendation, Recommendation::Rise);
        assert!(verdict.confidence > 0.5);
    }

    #[test]
    fn test_engine_fall_on_sustained_decline() {
        let mut engine = TrendEngine::new("R_100", &small_timeframes(), &small_config());
        for i in 0..80 {
            engine.on_tick(1000.0 - (i as f64) * 2.0);
        }
        let verdict = engine.verdict().unwrap();
        assert_eq!(verdict.alignment, Alignment::AllBearish);
        assert_eq!(verdict.recommendation, Recommendation::Fall);
    }

    #[test]
    fn test_engine_reset_clears_history() {
        let mut engine = TrendEngine::new("R_100", &small_timeframes(), &small_config());
        for i in 0..80 {
            engine.on_tick(100.0 + i as f64);
        }
        assert!(engine.verdict().is_ok());

        engine.reset();
        assert!(engine.verdict().unwrap_err().is_insufficient_data());
    }
}
