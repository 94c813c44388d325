use serde::{ Deserialize, Serialize };

/// Direction classification of one timeframe pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Bullish,
    Bearish,
    Neutral,
}

/// Derived state of one timeframe pipeline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeframeTrend {
    pub direction: TrendDirection,
    /// Normalized trend strength in [0, 1]
    pub strength: f64,
    /// Current HMA value over the filtered window
    pub value: f64,
    /// HMA slope vs. the lookback samples earlier
    pub slope: f64,
}

/// Agreement of trend direction across all pipelines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    AllBullish,
    AllBearish,
    Mixed,
    Neutral,
}

/// Actionable recommendation derived from alignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recommendation {
    Rise,
    Fall,
    Hold,
}

/// Combined verdict across all timeframe pipelines
///
/// Recomputed on every update, never persisted. Once minimum history exists,
/// callers always receive a verdict object - `hold` with a reason rather
/// than silence when something blocks a recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentVerdict {
    pub alignment: Alignment,
    /// Confidence in [0, 1]; mixed verdicts are penalized and capped at 0.5
    pub confidence: f64,
    pub recommendation: Recommendation,
    /// Why an actionable recommendation was withheld, when it was
    pub reason: Option<String>,
}

impl AlignmentVerdict {
    /// Verdict for pipelines that all report neutral
    pub fn neutral() -> Self {
        Self {
            alignment: Alignment::Neutral,
            confidence: 0.0,
            recommendation: Recommendation::Hold,
            reason: None,
        }
    }
}
