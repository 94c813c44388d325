//! Ehlers recursive noise filters
//!
//! Super-Smoother: two-pole low-pass filter with coefficients derived from
//! the cutoff period. Decycler: single-pole filter that removes the
//! high-frequency cycle component, leaving the trend. Both are applied to the
//! raw price window before any trend indicator.

use std::f64::consts::PI;

/// Two-pole Ehlers Super-Smoother over the whole series
///
/// Coefficients: a1 = exp(-1.414*pi/period), c2 = 2*a1*cos(1.414*pi/period),
/// c3 = -a1^2, c1 = 1 - c2 - c3. The first two outputs are the raw prices
/// (the filter needs two previous filtered values as seed).
pub fn super_smoother(prices: &[f64], period: usize) -> Vec<f64> {
    if prices.len() < 3 || period < 2 {
        return prices.to_vec();
    }

    let a1 = (-1.414 * PI / (period as f64)).exp();
    let c2 = 2.0 * a1 * (1.414 * PI / (period as f64)).cos();
    let c3 = -a1 * a1;
    let c1 = 1.0 - c2 - c3;

    let mut filtered = Vec::with_capacity(prices.len());
    filtered.push(prices[0]);
    filtered.push(prices[1]);

    for i in 2..prices.len() {
        let avg = (prices[i] + prices[i - 1]) / 2.0;
        let value = c1 * avg + c2 * filtered[i - 1] + c3 * filtered[i - 2];
        filtered.push(value);
    }

    filtered
}

/// Single-pole decycler: d[i] = d[i-1] + alpha * (price[i] - d[i-1])
///
/// `alpha` is a fixed smoothing constant (typical 0.05-0.1), not adaptive.
pub fn decycler(prices: &[f64], alpha: f64) -> Vec<f64> {
    if prices.is_empty() {
        return Vec::new();
    }

    let mut out = Vec::with_capacity(prices.len());
    out.push(prices[0]);
    for i in 1..prices.len() {
        let prev = out[i - 1];
        out.push(prev + alpha * (prices[i] - prev));
    }
    out
}
