// =============================================================================
// Key price levels: pivot support/resistance and Fibonacci retracements
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::market_data::Candle;

use super::PatternDetection;

/// Neighbors on each side a pivot must beat.
const PIVOT_SPAN: usize = 2;
const PIVOT_PROXIMITY: f64 = 0.02;
const FIB_PROXIMITY: f64 = 0.01;

pub const PIVOT_CONFIDENCE: f64 = 70.0;
pub const FIB_CONFIDENCE: f64 = 80.0;
pub const FIB_RATIOS: [f64; 5] = [0.236, 0.382, 0.5, 0.618, 0.786];

/// Pivot levels found in a window, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyLevels {
    pub support: Vec<f64>,
    pub resistance: Vec<f64>,
}

/// 5-point extrema: a high strictly above the two highs on each side is
/// resistance, a low strictly below the two lows on each side is support.
pub fn find_pivots(candles: &[Candle]) -> KeyLevels {
    let mut levels = KeyLevels::default();
    if candles.len() < 2 * PIVOT_SPAN + 1 {
        return levels;
    }

    for i in PIVOT_SPAN..candles.len() - PIVOT_SPAN {
        let neighbors = (i - PIVOT_SPAN..=i + PIVOT_SPAN).filter(|&j| j != i);
        let c = &candles[i];

        if neighbors.clone().all(|j| c.high > candles[j].high) {
            levels.resistance.push(c.high);
        }
        if neighbors.clone().all(|j| c.low < candles[j].low) {
            levels.support.push(c.low);
        }
    }
    levels
}

/// "Near Support" / "Near Resistance" detections for every pivot level within
/// 2% of `close`.
pub fn pivot_proximity(levels: &KeyLevels, close: f64) -> Vec<PatternDetection> {
    let near = |level: f64| level != 0.0 && ((close - level) / level).abs() <= PIVOT_PROXIMITY;

    let support = levels.support.iter().copied().filter(|&l| near(l)).map(|level| PatternDetection {
        name: "Near Support".to_string(),
        confidence: PIVOT_CONFIDENCE,
        description: format!("price {close:.4} within 2% of pivot support {level:.4}"),
        bullish: true,
        directional: true,
    });
    let resistance = levels
        .resistance
        .iter()
        .copied()
        .filter(|&l| near(l))
        .map(|level| PatternDetection {
            name: "Near Resistance".to_string(),
            confidence: PIVOT_CONFIDENCE,
            description: format!("price {close:.4} within 2% of pivot resistance {level:.4}"),
            bullish: false,
            directional: true,
        });

    support.chain(resistance).collect()
}

/// Retracement prices measured down from the window high.
pub fn fibonacci_levels(candles: &[Candle]) -> Vec<(f64, f64)> {
    let high = candles.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
    let low = candles.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
    if !high.is_finite() || !low.is_finite() || high <= low {
        return Vec::new();
    }
    let span = high - low;
    FIB_RATIOS.iter().map(|&r| (r, high - span * r)).collect()
}

/// Fibonacci detections for every retracement within 1% of `close`.
pub fn fibonacci_proximity(candles: &[Candle], close: f64) -> Vec<PatternDetection> {
    fibonacci_levels(candles)
        .into_iter()
        .filter(|&(_, level)| level != 0.0 && ((close - level) / level).abs() <= FIB_PROXIMITY)
        .map(|(ratio, level)| PatternDetection {
            name: format!("Fibonacci {:.1}%", ratio * 100.0),
            confidence: FIB_CONFIDENCE,
            description: format!("price {close:.4} near the {ratio} retracement at {level:.4}"),
            bullish: close > level,
            directional: true,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::Timeframe;
    use chrono::{Duration, TimeZone, Utc};

    fn bars(hl: &[(f64, f64)]) -> Vec<Candle> {
        hl.iter()
            .enumerate()
            .map(|(i, &(high, low))| {
                let mid = (high + low) / 2.0;
                Candle {
                    symbol: "TEST".into(),
                    timeframe: Timeframe::FourHours,
                    timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::hours(4 * i as i64),
                    open: mid,
                    high,
                    low,
                    close: mid,
                    volume: 1.0,
                }
            })
            .collect()
    }

    #[test]
    fn pivots_need_two_neighbors_each_side() {
        let candles = bars(&[
            (101.0, 99.0),
            (102.0, 98.0),
            (105.0, 100.0),
            (103.0, 99.5),
            (102.0, 97.0),
            (101.0, 95.0),
            (102.0, 96.0),
            (103.0, 97.0),
        ]);
        let levels = find_pivots(&candles);
        assert_eq!(levels.resistance, vec![105.0]);
        assert_eq!(levels.support, vec![95.0]);
    }

    #[test]
    fn equal_neighbors_do_not_form_pivots() {
        let candles = bars(&[(100.0, 90.0); 7]);
        assert_eq!(find_pivots(&candles), KeyLevels::default());
    }

    #[test]
    fn proximity_emits_near_levels() {
        let levels = KeyLevels {
            support: vec![98.5, 80.0],
            resistance: vec![101.0],
        };
        let found = pivot_proximity(&levels, 100.0);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].name, "Near Support");
        assert!(found[0].bullish);
        assert_eq!(found[1].name, "Near Resistance");
        assert!(!found[1].bullish);
        assert!(found.iter().all(|p| p.confidence == PIVOT_CONFIDENCE));
    }

    #[test]
    fn fibonacci_levels_span_the_window() {
        let candles = bars(&[(200.0, 150.0), (180.0, 100.0)]);
        let levels = fibonacci_levels(&candles);
        assert_eq!(levels.len(), 5);
        // 0.5 retracement of 100..200 is 150.
        assert!((levels[2].1 - 150.0).abs() < 1e-9);
    }

    #[test]
    fn fibonacci_proximity_tags_ratio_and_side() {
        let candles = bars(&[(200.0, 150.0), (180.0, 100.0)]);
        let found = fibonacci_proximity(&candles, 151.0);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Fibonacci 50.0%");
        assert_eq!(found[0].confidence, FIB_CONFIDENCE);
        assert!(found[0].bullish);

        let below = fibonacci_proximity(&candles, 149.0);
        assert!(!below[0].bullish);
    }

    #[test]
    fn flat_window_has_no_fibonacci() {
        assert!(fibonacci_levels(&bars(&[(100.0, 100.0); 3])).is_empty());
    }
}
