// =============================================================================
// Moving Average Convergence Divergence (MACD)
// =============================================================================
//
//   MACD line  = EMA(12) - EMA(26)
//   Signal     = EMA(9) of the MACD line
//   Histogram  = MACD - Signal
//
// The MACD line is only reported once the slow EMA has seen `slow` closes;
// the warm-up portion is discarded before the signal line is computed.
// =============================================================================

use serde::{Deserialize, Serialize};

use super::ema::calculate_ema;

pub const FAST_PERIOD: usize = 12;
pub const SLOW_PERIOD: usize = 26;
pub const SIGNAL_PERIOD: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacdResult {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// MACD line series, one value per close from index `SLOW_PERIOD - 1` on.
///
/// Empty when fewer than `SLOW_PERIOD` closes are available.
pub fn macd_line(closes: &[f64]) -> Vec<f64> {
    if closes.len() < SLOW_PERIOD {
        return Vec::new();
    }

    let fast = calculate_ema(closes, FAST_PERIOD);
    let slow = calculate_ema(closes, SLOW_PERIOD);
    let len = fast.len().min(slow.len());
    if len < SLOW_PERIOD {
        return Vec::new();
    }

    (SLOW_PERIOD - 1..len).map(|i| fast[i] - slow[i]).collect()
}

/// Latest MACD, signal and histogram values.
pub fn calculate_macd(closes: &[f64]) -> Option<MacdResult> {
    let line = macd_line(closes);
    let macd = *line.last()?;
    let signal = *calculate_ema(&line, SIGNAL_PERIOD).last()?;
    let histogram = macd - signal;

    histogram.is_finite().then_some(MacdResult {
        macd,
        signal,
        histogram,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn macd_insufficient_data() {
        let closes: Vec<f64> = (1..=25).map(|x| x as f64).collect();
        assert!(calculate_macd(&closes).is_none());
        assert!(macd_line(&closes).is_empty());
    }

    #[test]
    fn macd_line_length() {
        let closes: Vec<f64> = (1..=40).map(|x| x as f64).collect();
        assert_eq!(macd_line(&closes).len(), 40 - SLOW_PERIOD + 1);
    }

    #[test]
    fn macd_positive_in_uptrend() {
        let closes: Vec<f64> = (1..=80).map(|x| 100.0 + x as f64 * 0.5).collect();
        let m = calculate_macd(&closes).unwrap();
        assert!(m.macd > 0.0);
        assert!((m.histogram - (m.macd - m.signal)).abs() < 1e-12);
    }

    #[test]
    fn macd_negative_in_downtrend() {
        let closes: Vec<f64> = (1..=80).map(|x| 200.0 - x as f64 * 0.5).collect();
        let m = calculate_macd(&closes).unwrap();
        assert!(m.macd < 0.0);
    }

    #[test]
    fn macd_flat_is_zero() {
        let m = calculate_macd(&[50.0; 60]).unwrap();
        assert!(m.macd.abs() < 1e-12);
        assert!(m.signal.abs() < 1e-12);
        assert!(m.histogram.abs() < 1e-12);
    }
}
