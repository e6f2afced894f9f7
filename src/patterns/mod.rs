// =============================================================================
// Pattern Detection
// =============================================================================
//
// Scans a candle window for candlestick reversal patterns, pivot
// support/resistance proximity, Fibonacci retracement proximity and
// price/oscillator divergences.  Short windows yield empty results, never
// errors.

pub mod candlestick;
pub mod divergence;
pub mod levels;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::market_data::Candle;
use crate::types::Sentiment;

pub use divergence::{detect_divergences, Divergence, DivergenceKind};
pub use levels::{find_pivots, KeyLevels};

/// Detections at or below this confidence are discarded.
pub const CONFIDENCE_FLOOR: f64 = 60.0;
/// Candlestick patterns are scanned over this many trailing candles.
pub const RECENT_WINDOW: usize = 20;
pub const MIN_BASIC_CANDLES: usize = 3;
pub const MIN_ADVANCED_CANDLES: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternDetection {
    pub name: String,
    /// 0..=100
    pub confidence: f64,
    pub description: String,
    pub bullish: bool,
    /// False for indecision markers (Doji); `bullish` carries no direction then.
    #[serde(default = "directional_default")]
    pub directional: bool,
}

fn directional_default() -> bool {
    true
}

impl PatternDetection {
    pub fn bias(&self) -> Sentiment {
        match (self.directional, self.bullish) {
            (false, _) => Sentiment::Neutral,
            (true, true) => Sentiment::Bullish,
            (true, false) => Sentiment::Bearish,
        }
    }
}

/// Detect every pattern in `candles` (oldest first).
///
/// The result keeps only detections with confidence strictly above
/// [`CONFIDENCE_FLOOR`], sorted by confidence descending.  Repeated detections
/// of the same pattern are kept.
pub fn detect_patterns(candles: &[Candle]) -> Vec<PatternDetection> {
    if candles.len() < MIN_BASIC_CANDLES {
        return Vec::new();
    }

    let recent = &candles[candles.len().saturating_sub(RECENT_WINDOW)..];
    let mut found = candlestick::scan(recent);

    if candles.len() >= MIN_ADVANCED_CANDLES {
        if let Some(last) = candles.last() {
            let pivots = find_pivots(candles);
            found.extend(levels::pivot_proximity(&pivots, last.close));
            found.extend(levels::fibonacci_proximity(candles, last.close));
        }
    }

    found.retain(|p| p.confidence > CONFIDENCE_FLOOR && p.confidence.is_finite());
    // Stable sort keeps chronological order among equal confidences.
    found.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    trace!(window = candles.len(), detected = found.len(), "pattern scan complete");
    found
}
