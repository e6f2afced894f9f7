// =============================================================================
// Cross-timeframe Market Regime
// =============================================================================
//
// Classifies the market from the per-timeframe signals:
//
//   trend strength = |sum(w * dir * confidence)| / sum(w)        (0..=100)
//
//   1. TRENDING       strength > 70   (direction UP / DOWN, strength)
//   2. RANGING        strength < 30   (high / low of recent closes)
//   3. TRANSITIONING  otherwise       (bias from the signed net trend)
//
// Volatility is the weight-averaged ATR volatility of the timeframes that
// report one.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::multi_timeframe::TimeframeAnalysis;
use crate::types::Sentiment;

pub const TRENDING_THRESHOLD: f64 = 70.0;
pub const RANGING_THRESHOLD: f64 = 30.0;
/// Net trend magnitude needed for a non-neutral transitioning bias.
pub const BIAS_THRESHOLD: f64 = 10.0;

// =============================================================================
// Types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RegimeKind {
    Trending,
    Ranging,
    Transitioning,
}

impl std::fmt::Display for RegimeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trending => write!(f, "TRENDING"),
            Self::Ranging => write!(f, "RANGING"),
            Self::Transitioning => write!(f, "TRANSITIONING"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TrendDirection {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub high: f64,
    pub low: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketRegime {
    pub kind: RegimeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<TrendDirection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strength: Option<f64>,
    pub volatility: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<PriceRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bias: Option<Sentiment>,
}

impl MarketRegime {
    /// Regime reported when no timeframe produced an analysis.
    pub fn neutral() -> Self {
        Self {
            kind: RegimeKind::Transitioning,
            direction: None,
            strength: None,
            volatility: 0.0,
            range: None,
            bias: Some(Sentiment::Neutral),
        }
    }
}

// =============================================================================
// Detection
// =============================================================================

pub fn detect(analyses: &[TimeframeAnalysis]) -> MarketRegime {
    if analyses.is_empty() {
        return MarketRegime::neutral();
    }

    let net = net_trend(analyses);
    let volatility = aggregate_volatility(analyses);
    let regime = classify(net, volatility, price_range(analyses));

    debug!(
        regime = %regime.kind,
        net_trend = format!("{:.2}", net),
        volatility = format!("{:.2}", volatility),
        "Regime detected"
    );
    regime
}

/// Pure classification from the signed net trend (-100..=100).
pub fn classify(net_trend: f64, volatility: f64, range: Option<PriceRange>) -> MarketRegime {
    let strength = net_trend.abs();

    if strength > TRENDING_THRESHOLD {
        let direction = if net_trend > 0.0 { TrendDirection::Up } else { TrendDirection::Down };
        return MarketRegime {
            kind: RegimeKind::Trending,
            direction: Some(direction),
            strength: Some(strength),
            volatility,
            range: None,
            bias: None,
        };
    }

    if strength < RANGING_THRESHOLD {
        return MarketRegime {
            kind: RegimeKind::Ranging,
            direction: None,
            strength: None,
            volatility,
            range,
            bias: None,
        };
    }

    let bias = if net_trend > BIAS_THRESHOLD {
        Sentiment::Bullish
    } else if net_trend < -BIAS_THRESHOLD {
        Sentiment::Bearish
    } else {
        Sentiment::Neutral
    };
    MarketRegime {
        kind: RegimeKind::Transitioning,
        direction: None,
        strength: None,
        volatility,
        range: None,
        bias: Some(bias),
    }
}

/// `sum(w * dir * confidence) / sum(w)`: signed, in -100..=100.
pub fn net_trend(analyses: &[TimeframeAnalysis]) -> f64 {
    let total_weight: f64 = analyses.iter().map(|a| a.weight).sum();
    if total_weight <= 0.0 {
        return 0.0;
    }
    analyses
        .iter()
        .map(|a| a.weight * a.signal.recommendation.direction() * a.signal.confidence)
        .sum::<f64>()
        / total_weight
}

pub fn trend_strength(analyses: &[TimeframeAnalysis]) -> f64 {
    net_trend(analyses).abs()
}

pub fn aggregate_volatility(analyses: &[TimeframeAnalysis]) -> f64 {
    let (sum, weight) = analyses
        .iter()
        .filter_map(|a| a.signal.volatility.map(|v| (v * a.weight, a.weight)))
        .fold((0.0, 0.0), |(s, w), (v, aw)| (s + v, w + aw));
    if weight > 0.0 {
        sum / weight
    } else {
        0.0
    }
}

/// High and low of every timeframe's recent closes.
pub fn price_range(analyses: &[TimeframeAnalysis]) -> Option<PriceRange> {
    let mut closes = analyses.iter().flat_map(|a| a.recent_closes.iter().copied());
    let first = closes.next()?;
    let (low, high) = closes.fold((first, first), |(lo, hi), c| (lo.min(c), hi.max(c)));
    Some(PriceRange { high, low })
}
