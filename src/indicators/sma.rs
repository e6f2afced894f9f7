// =============================================================================
// Simple Moving Average (SMA)
// =============================================================================

/// Arithmetic mean of exactly the last `period` closes.
///
/// Returns `None` when `period` is zero, fewer than `period` closes exist, or
/// the mean is non-finite.
pub fn calculate_sma(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period {
        return None;
    }

    let window = &closes[closes.len() - period..];
    let mean = window.iter().sum::<f64>() / period as f64;

    mean.is_finite().then_some(mean)
}
