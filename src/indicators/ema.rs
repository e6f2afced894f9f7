// =============================================================================
// Exponential Moving Average (EMA)
// =============================================================================
//
// EMA gives more weight to recent prices, making it more responsive to new
// information than the Simple Moving Average (SMA).
//
// Formula:
//   multiplier = 2 / (period + 1)
//   EMA_t      = close_t * multiplier + EMA_{t-1} * (1 - multiplier)
//
// The series is seeded with the very first close, so every input close has a
// corresponding EMA value.
// =============================================================================

/// Compute the EMA series for the given `closes` slice and look-back `period`.
///
/// The output has the same length as the input.
///
/// # Edge cases
/// - `period == 0` or empty input => empty vec
/// - A non-finite intermediate value truncates the series at that point.
pub fn calculate_ema(closes: &[f64], period: usize) -> Vec<f64> {
    let Some(&seed) = closes.first() else {
        return Vec::new();
    };
    if period == 0 || !seed.is_finite() {
        return Vec::new();
    }

    let multiplier = 2.0 / (period + 1) as f64;

    let mut result = Vec::with_capacity(closes.len());
    result.push(seed);

    let mut prev_ema = seed;
    for &close in &closes[1..] {
        let ema = close * multiplier + prev_ema * (1.0 - multiplier);
        if !ema.is_finite() {
            // Downstream consumers should not trust a broken series.
            break;
        }
        result.push(ema);
        prev_ema = ema;
    }

    result
}

/// Most recent EMA value.
///
/// Returns `None` when fewer than `period` closes exist; a seeded EMA over a
/// shorter window is still mostly the seed and is not reported.
pub fn current_ema(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period {
        return None;
    }
    let series = calculate_ema(closes, period);
    if series.len() != closes.len() {
        return None;
    }
    series.last().copied()
}
