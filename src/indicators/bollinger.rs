// =============================================================================
// Bollinger Bands
// =============================================================================
//
// Bollinger Bands consist of a middle band (SMA), an upper band (SMA + k*σ),
// and a lower band (SMA - k*σ), with σ the population standard deviation of
// the window. The Band Width (BBW) is the normalised distance:
// BBW = (upper - lower) / middle * 100.

use serde::{Deserialize, Serialize};

/// Result of a Bollinger Band calculation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BollingerResult {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
    pub width: f64,
}

impl BollingerResult {
    /// Position of `price` inside the bands: 0 at the lower band, 1 at the
    /// upper band. `None` when the bands have collapsed.
    pub fn percent_b(&self, price: f64) -> Option<f64> {
        let span = self.upper - self.lower;
        (span > 0.0).then(|| (price - self.lower) / span)
    }
}

/// Calculate Bollinger Bands for the given closing prices.
///
/// Returns `Some(BollingerResult)` containing:
/// - `upper`  = SMA + `num_std` * σ
/// - `middle` = SMA
/// - `lower`  = SMA - `num_std` * σ
/// - `width`  = (upper - lower) / middle * 100, or 0 when middle is zero
///
/// Returns `None` when fewer than `period` data points exist or any band is
/// non-finite.
pub fn calculate_bollinger(closes: &[f64], period: usize, num_std: f64) -> Option<BollingerResult> {
    if period == 0 || closes.len() < period {
        return None;
    }

    let window = &closes[closes.len() - period..];
    let sum: f64 = window.iter().sum();
    let middle = sum / period as f64;

    let variance = window.iter().map(|x| (x - middle).powi(2)).sum::<f64>() / period as f64;
    let std_dev = variance.sqrt();

    let upper = middle + num_std.abs() * std_dev;
    let lower = middle - num_std.abs() * std_dev;
    let width = if middle == 0.0 {
        0.0
    } else {
        (upper - lower) / middle.abs() * 100.0
    };

    if upper.is_finite() && lower.is_finite() && width.is_finite() {
        Some(BollingerResult {
            upper,
            middle,
            lower,
            width,
        })
    } else {
        None
    }
}
