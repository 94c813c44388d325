//! Rate of change and price range helpers

/// Percent change vs. the price `lookback` samples back
///
/// `None` when history is insufficient or the base price is zero.
pub fn roc(prices: &[f64], lookback: usize) -> Option<f64> {
    if lookback == 0 || prices.len() < lookback + 1 {
        return None;
    }

    let last = *prices.last()?;
    let base = prices[prices.len() - lookback - 1];
    if base == 0.0 {
        return None;
    }

    Some(((last - base) / base) * 100.0)
}

/// Max-min spread over the last `window` samples
///
/// Basis for the adaptive direction threshold: thresholds scale with the
/// instrument's recent range instead of a fixed epsilon, which keeps
/// direction classification scale-invariant across tick sizes.
pub fn price_range(prices: &[f64], window: usize) -> f64 {
    if prices.is_empty() || window == 0 {
        return 0.0;
    }

    let start = prices.len().saturating_sub(window);
    let slice = &prices[start..];
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &p in slice {
        if p < min {
            min = p;
        }
        if p > max {
            max = p;
        }
    }
    max - min
}
