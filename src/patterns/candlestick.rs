// =============================================================================
// Candlestick reversal patterns
// =============================================================================
//
// Single candle:  Hammer / Shooting Star, Doji
// Two candles:    Bullish / Bearish Engulfing
// Three candles:  Morning Star / Evening Star

use crate::market_data::Candle;

use super::PatternDetection;

const SHADOW_BODY_RATIO: f64 = 2.0;
const SMALL_BODY_RANGE: f64 = 0.3;
const DOJI_BODY_RANGE: f64 = 0.1;

pub const DOJI_CONFIDENCE: f64 = 75.0;
pub const ENGULFING_CONFIDENCE: f64 = 85.0;
pub const STAR_CONFIDENCE: f64 = 80.0;
const SHADOW_CONFIDENCE_CAP: f64 = 95.0;

/// Scan every candle of `window` and return all candlestick detections in
/// chronological order.  Confidence filtering happens in the caller.
pub fn scan(window: &[Candle]) -> Vec<PatternDetection> {
    let mut found = Vec::new();
    for i in 0..window.len() {
        let candle = &window[i];
        found.extend(shadow_pattern(candle));
        found.extend(doji(candle));
        if i >= 1 {
            found.extend(engulfing(&window[i - 1], candle));
        }
        if i >= 2 {
            found.extend(star(&window[i - 2], &window[i - 1], candle));
        }
    }
    found
}

// ---------------------------------------------------------------------------
// Single candle
// ---------------------------------------------------------------------------

/// Hammer (dominant lower shadow) or Shooting Star (dominant upper shadow).
///
/// Requires a small, non-zero body (< 30% of range), a dominant shadow longer
/// than twice the body and an opposite shadow shorter than half the body.
/// Confidence grows with the shadow/body ratio and is capped at 95.
fn shadow_pattern(c: &Candle) -> Option<PatternDetection> {
    let body = c.body();
    let range = c.range();
    if body <= 0.0 || range <= 0.0 || body >= SMALL_BODY_RANGE * range {
        return None;
    }

    let (upper, lower) = (c.upper_shadow(), c.lower_shadow());
    let (name, shadow, description) = if lower > SHADOW_BODY_RATIO * body && upper < 0.5 * body {
        ("Hammer", lower, "long lower shadow rejecting lower prices")
    } else if upper > SHADOW_BODY_RATIO * body && lower < 0.5 * body {
        ("Shooting Star", upper, "long upper shadow rejecting higher prices")
    } else {
        return None;
    };

    let ratio = shadow / body;
    let confidence = (60.0 + ratio * 5.0).min(SHADOW_CONFIDENCE_CAP);

    Some(PatternDetection {
        name: name.to_string(),
        confidence,
        description: format!("{description} (shadow {ratio:.1}x body)"),
        bullish: c.is_bullish(),
        directional: true,
    })
}

/// Doji: body under 10% of range.  An indecision marker with no direction.
fn doji(c: &Candle) -> Option<PatternDetection> {
    let range = c.range();
    if range <= 0.0 || c.body() >= DOJI_BODY_RANGE * range {
        return None;
    }
    Some(PatternDetection {
        name: "Doji".to_string(),
        confidence: DOJI_CONFIDENCE,
        description: "open and close nearly equal, market indecision".to_string(),
        bullish: false,
        directional: false,
    })
}

// ---------------------------------------------------------------------------
// Two candles
// ---------------------------------------------------------------------------

/// Current body fully contains and exceeds the previous, opposite-colored body.
fn engulfing(prev: &Candle, cur: &Candle) -> Option<PatternDetection> {
    if cur.body() <= prev.body() {
        return None;
    }

    if prev.is_bearish() && cur.is_bullish() && cur.open <= prev.close && cur.close >= prev.open {
        return Some(PatternDetection {
            name: "Bullish Engulfing".to_string(),
            confidence: ENGULFING_CONFIDENCE,
            description: "bullish body engulfs the prior bearish body".to_string(),
            bullish: true,
            directional: true,
        });
    }

    if prev.is_bullish() && cur.is_bearish() && cur.open >= prev.close && cur.close <= prev.open {
        return Some(PatternDetection {
            name: "Bearish Engulfing".to_string(),
            confidence: ENGULFING_CONFIDENCE,
            description: "bearish body engulfs the prior bullish body".to_string(),
            bullish: false,
            directional: true,
        });
    }

    None
}

// ---------------------------------------------------------------------------
// Three candles
// ---------------------------------------------------------------------------

/// Morning Star / Evening Star: a strong candle, a small-bodied pause under a
/// third of its body, then a reversal closing past the first body's midpoint.
fn star(first: &Candle, second: &Candle, third: &Candle) -> Option<PatternDetection> {
    if second.body() >= first.body() / 3.0 {
        return None;
    }
    let midpoint = (first.open + first.close) / 2.0;

    if first.is_bearish() && third.is_bullish() && third.close > midpoint {
        return Some(PatternDetection {
            name: "Morning Star".to_string(),
            confidence: STAR_CONFIDENCE,
            description: "three-candle bullish reversal after a decline".to_string(),
            bullish: true,
            directional: true,
        });
    }

    if first.is_bullish() && third.is_bearish() && third.close < midpoint {
        return Some(PatternDetection {
            name: "Evening Star".to_string(),
            confidence: STAR_CONFIDENCE,
            description: "three-candle bearish reversal after an advance".to_string(),
            bullish: false,
            directional: true,
        });
    }

    None
}
