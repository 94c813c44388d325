//! Tick data model

use crate::errors::{EngineError, EngineResult};
use serde::{ Deserialize, Serialize };

/// A single price tick as delivered by the feed
///
/// Immutable once constructed; arrives in non-decreasing epoch order per
/// symbol on the live stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub symbol: String,
    /// Unix timestamp in seconds
    pub epoch: i64,
    pub price: f64,
    /// Defaults to 1 when the feed carries no volume
    #[serde(default = "default_volume")]
    pub volume: f64,
}

fn default_volume() -> f64 {
    1.0
}

impl Tick {
    pub fn new(symbol: impl Into<String>, epoch: i64, price: f64) -> Self {
        Self {
            symbol: symbol.into(),
            epoch,
            price,
            volume: 1.0,
        }
    }

    /// Basic validity: positive finite price, positive epoch, non-empty symbol
    ///
    /// Invalid ticks are dropped and logged by the aggregator, never folded
    /// into a candle.
    pub fn validate(&self) -> EngineResult<()> {
        if self.symbol.is_empty() {
            return Err(EngineError::InvalidInput("tick with empty symbol".to_string()));
        }
        if self.epoch <= 0 {
            return Err(EngineError::InvalidInput(format!(
                "tick for {} with non-positive epoch {}",
                self.symbol, self.epoch
            )));
        }
        if !(self.price > 0.0) || !self.price.is_finite() {
            return Err(EngineError::InvalidInput(format!(
                "tick for {} with invalid price {}",
                self.symbol, self.price
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_tick_passes() {
        assert!(Tick::new("R_100", 1_700_000_000, 142.5).validate().is_ok());
    }

    #[test]
    fn test_invalid_ticks_rejected() {
        assert!(Tick::new("", 1, 1.0).validate().is_err());
        assert!(Tick::new("R_100", 0, 1.0).validate().is_err());
        assert!(Tick::new("R_100", 1, 0.0).validate().is_err());
        assert!(Tick::new("R_100", 1, -3.0).validate().is_err());
        assert!(Tick::new("R_100", 1, f64::NAN).validate().is_err());
    }

    #[test]
    fn test_volume_defaults_to_one() {
        let tick: Tick = serde_json::from_str(
            r#"{"symbol":"R_100","epoch":1700000000,"price":42.0}"#,
        )
        .unwrap();
        assert_eq!(tick.volume, 1.0);
    }
}
