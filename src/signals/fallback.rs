// =============================================================================
// Local heuristic fallback
// =============================================================================
//
// The single entry point used whenever the external advisory is absent,
// failing or slow:
//   RSI > 70 => SELL, confidence 60 + min(20, rsi - 70)
//   RSI < 30 => BUY,  confidence 60 + min(20, 30 - rsi)
//   otherwise HOLD at 50

use crate::indicators::rsi::{OVERBOUGHT, OVERSOLD};
use crate::types::Recommendation;

use super::advisory::AdvisoryRecommendation;

pub const NEUTRAL_CONFIDENCE: f64 = 50.0;

pub fn heuristic_fallback(rsi: Option<f64>) -> AdvisoryRecommendation {
    let (recommendation, confidence, reasoning) = match rsi {
        Some(r) if r > OVERBOUGHT => (
            Recommendation::Sell,
            60.0 + (r - OVERBOUGHT).min(20.0),
            format!("RSI {r:.2} overbought"),
        ),
        Some(r) if r < OVERSOLD => (
            Recommendation::Buy,
            60.0 + (OVERSOLD - r).min(20.0),
            format!("RSI {r:.2} oversold"),
        ),
        Some(r) => (Recommendation::Hold, NEUTRAL_CONFIDENCE, format!("RSI {r:.2} neutral")),
        None => (Recommendation::Hold, NEUTRAL_CONFIDENCE, "RSI unavailable".to_string()),
    };

    AdvisoryRecommendation {
        recommendation,
        confidence,
        reasoning,
        sentiment: recommendation.sentiment(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Sentiment;

    #[test]
    fn boundary_just_below_overbought_holds() {
        let f = heuristic_fallback(Some(69.99));
        assert_eq!(f.recommendation, Recommendation::Hold);
        assert_eq!(f.confidence, 50.0);
    }

    #[test]
    fn boundary_just_above_overbought_sells() {
        let f = heuristic_fallback(Some(70.01));
        assert_eq!(f.recommendation, Recommendation::Sell);
        assert_eq!(f.sentiment, Sentiment::Bearish);
        assert!((f.confidence - 60.01).abs() < 1e-9);
    }

    #[test]
    fn exactly_seventy_holds() {
        assert_eq!(heuristic_fallback(Some(70.0)).recommendation, Recommendation::Hold);
        assert_eq!(heuristic_fallback(Some(30.0)).recommendation, Recommendation::Hold);
    }

    #[test]
    fn oversold_buys_with_capped_confidence() {
        let f = heuristic_fallback(Some(2.0));
        assert_eq!(f.recommendation, Recommendation::Buy);
        assert_eq!(f.confidence, 80.0);
    }

    #[test]
    fn rsi_of_one_hundred_caps_at_eighty() {
        let f = heuristic_fallback(Some(100.0));
        assert_eq!(f.recommendation, Recommendation::Sell);
        assert_eq!(f.confidence, 80.0);
    }

    #[test]
    fn missing_rsi_holds() {
        let f = heuristic_fallback(None);
        assert_eq!(f.recommendation, Recommendation::Hold);
        assert_eq!(f.sentiment, Sentiment::Neutral);
    }
}
