// =============================================================================
// Stochastic Oscillator & Williams %R
// =============================================================================
//
// Both oscillators locate the latest close inside the trailing high/low range:
//
//   %K  = (close - LL) / (HH - LL) * 100          in [0, 100]
//   %R  = (HH - close) / (HH - LL) * -100         in [-100, 0]
//
// When HH == LL the range is empty and the oscillators report their midpoint
// (50 and -50 respectively).

use crate::market_data::Candle;

/// Highest high and lowest low over the trailing `period` candles.
fn trailing_extremes(candles: &[Candle], period: usize) -> Option<(f64, f64)> {
    if period == 0 || candles.len() < period {
        return None;
    }
    let window = &candles[candles.len() - period..];
    let hh = window.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
    let ll = window.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
    (hh.is_finite() && ll.is_finite()).then_some((hh, ll))
}

/// Stochastic %K over the trailing `period` candles.
pub fn calculate_stochastic(candles: &[Candle], period: usize) -> Option<f64> {
    let (hh, ll) = trailing_extremes(candles, period)?;
    let close = candles.last()?.close;

    if hh == ll {
        return Some(50.0);
    }
    let k = (close - ll) / (hh - ll) * 100.0;
    k.is_finite().then(|| k.clamp(0.0, 100.0))
}

/// Williams %R over the trailing `period` candles.
pub fn calculate_williams_r(candles: &[Candle], period: usize) -> Option<f64> {
    let (hh, ll) = trailing_extremes(candles, period)?;
    let close = candles.last()?.close;

    if hh == ll {
        return Some(-50.0);
    }
    let r = (hh - close) / (hh - ll) * -100.0;
    r.is_finite().then(|| r.clamp(-100.0, 0.0))
}
