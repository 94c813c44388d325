//! Weighted and Hull moving averages
//!
//! WMA[t] = sum(price[i] * w[i]) / sum(w), weights 1..=period over the last
//! `period` samples, most recent weighted heaviest.
//! HMA[t] = 2 * WMA(period/2) - WMA(period), the standard low-lag Hull
//! construction built from two WMAs.

/// Weighted moving average over the last `period` elements
///
/// Returns `None` when fewer than `period` samples are available.
pub fn wma(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let window = &prices[prices.len() - period..];
    let mut weighted_sum = 0.0;
    for (i, price) in window.iter().enumerate() {
        weighted_sum += price * ((i + 1) as f64);
    }

    // Weight sum is period*(period+1)/2
    let weight_sum = ((period * (period + 1)) / 2) as f64;
    Some(weighted_sum / weight_sum)
}

/// Hull moving average: 2 * WMA(period/2) - WMA(period)
///
/// Returns `None` if either leg lacks history.
pub fn hma(prices: &[f64], period: usize) -> Option<f64> {
    let half = wma(prices, period / 2)?;
    let full = wma(prices, period)?;
    Some(2.0 * half - full)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wma_known_value() {
        // wma([1,2,3], 3) = (1*1 + 2*2 + 3*3) / 6 = 14/6
        let value = wma(&[1.0, 2.0, 3.0], 3).unwrap();
        assert!((value - 14.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_wma_uses_last_period_elements() {
        // Leading elements must not contribute
        let long = wma(&[100.0, 1.0, 2.0, 3.0], 3).unwrap();
        let short = wma(&[1.0, 2.0, 3.0], 3).unwrap();
        assert_eq!(long, short);
    }

    #[test]
    fn test_wma_insufficient_history() {
        assert_eq!(wma(&[1.0, 2.0], 3), None);
        assert_eq!(wma(&[], 1), None);
        assert_eq!(wma(&[1.0], 0), None);
    }

    #[test]
    fn test_wma_constant_series() {
        let value = wma(&[5.0; 20], 10).unwrap();
        assert!((value - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_hma_undefined_without_full_window() {
        assert_eq!(hma(&[1.0, 2.0, 3.0], 8), None);
    }

    #[test]
    fn test_hma_tracks_trend_with_less_lag() {
        // On a steady ramp the HMA sits above both WMAs, closer to the
        // latest price than the plain WMA.
        let prices: Vec<f64> = (1..=40).map(|i| i as f64).collect();
        let h = hma(&prices, 16).unwrap();
        let w = wma(&prices, 16).unwrap();
        let last = *prices.last().unwrap();
        assert!(h > w);
        assert!((last - h).abs() < (last - w).abs());
    }

    #[test]
    fn test_hma_constant_series_is_flat() {
        let value = hma(&[7.5; 50], 20).unwrap();
        assert!((value - 7.5).abs() < 1e-9);
    }
}
