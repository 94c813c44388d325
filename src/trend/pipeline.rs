//! Single-timeframe indicator pipeline
//!
//! Rolling window of recent prices for one timeframe. Evaluation filters the
//! window (Super-Smoother first, then Decycler - the order changes the HMA's
//! sensitivity and is load-bearing), computes the HMA and its slope, and
//! classifies direction against an adaptive threshold derived from the
//! recent price range, so classification stays scale-invariant across
//! instruments with different tick sizes.

use crate::config::{Granularity, TimeframeConfig, TrendConfig};
use crate::indicators::{decycler, hma, price_range, super_smoother};
use crate::trend::types::{TimeframeTrend, TrendDirection};
use std::collections::VecDeque;

pub struct TimeframePipeline {
    sample_count: usize,
    smoothing_period: usize,
    granularity: Granularity,
    decycler_alpha: f64,
    threshold_base: f64,
    range_window: usize,
    window: VecDeque<f64>,
}

impl TimeframePipeline {
    pub fn new(timeframe: &TimeframeConfig, trend: &TrendConfig) -> Self {
        Self {
            sample_count: timeframe.sample_count,
            smoothing_period: timeframe.smoothing_period,
            granularity: timeframe.granularity,
            decycler_alpha: trend.decycler_alpha,
            threshold_base: trend.threshold_base,
            range_window: trend.range_window,
            window: VecDeque::with_capacity(timeframe.sample_count),
        }
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    pub fn smoothing_period(&self) -> usize {
        self.smoothing_period
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// Whether the window holds the full configured history
    pub fn is_ready(&self) -> bool {
        self.window.len() >= self.sample_count
    }

    /// Append one sample, evicting the oldest when the window is full
    pub fn push(&mut self, price: f64) {
        if self.window.len() == self.sample_count {
            self.window.pop_front();
        }
        self.window.push_back(price);
    }

    /// Recompute direction/strength for the current window
    ///
    /// `None` until the window is full; afterwards always a value.
    pub fn evaluate(&self) -> Option<TimeframeTrend> {
        if !self.is_ready() {
            return None;
        }

        let raw: Vec<f64> = self.window.iter().copied().collect();

        // Longer timeframes get a larger multiplier so their naturally wider
        // swings do not read as spurious signals.
        let multiplier = 1.0 + (self.sample_count as f64) / 4000.0;
        let threshold = price_range(&raw, self.range_window) * self.threshold_base * multiplier;

        evaluate_window(&raw, self.smoothing_period, self.decycler_alpha, threshold)
    }
}

/// Filter a price window and classify its trend
///
/// Shared by the timeframe pipelines and the engine's short-window
/// confirmation check. Smoothing runs before the HMA; slope is measured
/// against the HMA `max(3, period/4)` samples earlier.
pub fn evaluate_window(
    raw: &[f64],
    period: usize,
    alpha: f64,
    threshold: f64,
) -> Option<TimeframeTrend> {
    let smoothed = super_smoother(raw, period);
    let filtered = decycler(&smoothed, alpha);

    let lookback = (period / 4).max(3);
    if filtered.len() < period + lookback {
        return None;
    }

    let current = hma(&filtered, period)?;
    let earlier = hma(&filtered[..filtered.len() - lookback], period)?;
    let slope = current - earlier;
    let price = *raw.last()?;

    // A dead-flat window has no range to measure against; call it neutral
    if threshold <= f64::EPSILON {
        return Some(TimeframeTrend {
            direction: TrendDirection::Neutral,
            strength: 0.0,
            value: current,
            slope,
        });
    }

    let direction = if slope > threshold && price > current {
        TrendDirection::Bullish
    } else if slope < -threshold && price < current {
        TrendDirection::Bearish
    } else {
        TrendDirection::Neutral
    };

    let strength = if direction == TrendDirection::Neutral {
        0.0
    } else {
        (slope.abs() / threshold).min(1.0)
    };

    Some(TimeframeTrend {
        direction,
        strength,
        value: current,
        slope,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_trend_config() -> TrendConfig {
        TrendConfig {
            min_aligned_count: 1,
            confirmation_window: 30,
            threshold_base: 0.02,
            range_window: 50,
            decycler_alpha: 0.07,
        }
    }

    fn test_pipeline(sample_count: usize, smoothing_period: usize) -> TimeframePipeline {
        TimeframePipeline::new(
            &TimeframeConfig {
                sample_count,
                smoothing_period,
                granularity: Granularity::Tick,
            },
            &test_trend_config(),
        )
    }

    #[test]
    fn test_not_ready_until_window_full() {
        let mut pipeline = test_pipeline(40, 10);
        for i in 0..39 {
            pipeline.push(100.0 + i as f64);
            assert!(pipeline.evaluate().is_none());
        }
        pipeline.push(140.0);
        assert!(pipeline.evaluate().is_some());
    }

    #[test]
    fn test_window_is_bounded() {
        let mut pipeline = test_pipeline(40, 10);
        for i in 0..500 {
            pipeline.push(i as f64);
        }
        assert_eq!(pipeline.len(), 40);
    }

    #[test]
    fn test_steady_ramp_reads_bullish() {
        let mut pipeline = test_pipeline(60, 12);
        for i in 0..60 {
            pipeline.push(100.0 + i as f64);
        }
        let trend = pipeline.evaluate().unwrap();
        assert_eq!(trend.direction, TrendDirection::Bullish);
        assert!(trend.slope > 0.0);
        assert!(trend.strength > 0.5);
    }

    #[test]
    fn test_steady_decline_reads_bearish() {
        let mut pipeline = test_pipeline(60, 12);
        for i in 0..60 {
            pipeline.push(500.0 - i as f64);
        }
        let trend = pipeline.evaluate().unwrap();
        assert_eq!(trend.direction, TrendDirection::Bearish);
        assert!(trend.slope < 0.0);
    }

    #[test]
    fn test_flat_series_reads_neutral() {
        let mut pipeline = test_pipeline(60, 12);
        for _ in 0..60 {
            pipeline.push(250.0);
        }
        let trend = pipeline.evaluate().unwrap();
        assert_eq!(trend.direction, TrendDirection::Neutral);
        assert_eq!(trend.strength, 0.0);
    }

    #[test]
    fn test_strength_is_capped_at_one() {
        let mut pipeline = test_pipeline(60, 12);
        // Violent ramp: slope far exceeds the adaptive threshold
        for i in 0..60 {
            pipeline.push(100.0 * (i as f64 + 1.0));
        }
        let trend = pipeline.evaluate().unwrap();
        assert!(trend.strength <= 1.0);
    }

    #[test]
    fn test_oscillation_does_not_read_as_trend() {
        let mut pipeline = test_pipeline(60, 12);
        for i in 0..60 {
            let wobble = if i % 2 == 0 { 0.3 } else { -0.3 };
            pipeline.push(200.0 + wobble);
        }
        let trend = pipeline.evaluate().unwrap();
        assert_eq!(trend.direction, TrendDirection::Neutral);
    }
}
