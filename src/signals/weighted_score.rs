// =============================================================================
// Weighted Ensemble Scorer: indicator vote aggregation
// =============================================================================
//
// Each available indicator casts a directional vote (+1 bullish, -1 bearish,
// 0 neutral) with a confidence in [0, 1].  The scorer weights the votes into a
// signed score and maps it onto BUY / SELL / HOLD.  Agreement measures how
// many votes point the same way as a given recommendation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::indicators::IndicatorSet;
use crate::types::Recommendation;

/// A single signal input to the scoring engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalInput {
    pub name: String,
    pub weight: f64,
    pub confidence: f64,
    /// +1.0 for bullish, -1.0 for bearish, 0.0 for neutral.
    pub direction: f64,
}

impl SignalInput {
    fn vote(name: &str, direction: f64, confidence: f64) -> Self {
        Self {
            name: name.to_string(),
            weight: 0.0,
            confidence: confidence.clamp(0.0, 1.0),
            direction,
        }
    }

    pub fn agrees_with(&self, recommendation: Recommendation) -> bool {
        self.direction == recommendation.direction()
    }
}

/// The contribution of a single signal to the final score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalContribution {
    pub name: String,
    pub weight: f64,
    pub confidence: f64,
    pub direction: f64,
    pub contribution: f64,
}

/// Result of the weighted scoring pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringResult {
    pub total_score: f64,
    pub decision: Recommendation,
    pub signal_contributions: Vec<SignalContribution>,
}

/// Per-indicator weights for the scoring engine.
#[derive(Debug, Clone)]
pub struct IndicatorWeights {
    pub weights: HashMap<String, f64>,
}

impl Default for IndicatorWeights {
    fn default() -> Self {
        let weights = [
            ("rsi", 0.15),
            ("macd", 0.15),
            ("price_sma20", 0.10),
            ("sma50_sma200", 0.10),
            ("ema_trend", 0.15),
            ("bollinger", 0.10),
            ("stochastic", 0.075),
            ("williams_r", 0.075),
            ("adx", 0.10),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        Self { weights }
    }
}

/// Turn an indicator set into directional votes.  Missing indicators cast no
/// vote.
pub fn indicator_votes(set: &IndicatorSet) -> Vec<SignalInput> {
    let close = set.last_close;
    let mut votes = Vec::with_capacity(9);

    if let Some(rsi) = set.rsi {
        let dir = if rsi > 70.0 {
            -1.0
        } else if rsi < 30.0 {
            1.0
        } else {
            0.0
        };
        votes.push(SignalInput::vote("rsi", dir, (rsi - 50.0).abs() / 50.0));
    }

    if let Some(m) = set.macd {
        votes.push(SignalInput::vote("macd", sign(m.histogram), 1.0));
    }

    if let Some(sma20) = set.sma20 {
        votes.push(SignalInput::vote("price_sma20", sign(close - sma20), 0.6));
    }

    if let (Some(sma50), Some(sma200)) = (set.sma50, set.sma200) {
        votes.push(SignalInput::vote("sma50_sma200", sign(sma50 - sma200), 0.8));
    }

    if let (Some(ema20), Some(ema50)) = (set.ema20, set.ema50) {
        votes.push(SignalInput::vote("ema_trend", sign(ema20 - ema50), 0.8));
    }

    if let Some(bb) = set.bollinger {
        let dir = if close > bb.upper {
            -1.0
        } else if close < bb.lower {
            1.0
        } else {
            0.0
        };
        votes.push(SignalInput::vote("bollinger", dir, 0.7));
    }

    if let Some(k) = set.stochastic {
        let dir = if k > 80.0 {
            -1.0
        } else if k < 20.0 {
            1.0
        } else {
            0.0
        };
        votes.push(SignalInput::vote("stochastic", dir, 0.6));
    }

    if let Some(r) = set.williams_r {
        let dir = if r > -20.0 {
            -1.0
        } else if r < -80.0 {
            1.0
        } else {
            0.0
        };
        votes.push(SignalInput::vote("williams_r", dir, 0.6));
    }

    if let Some(adx) = set.adx {
        // Only a trending market gives ADX a direction.
        let dir = if adx.is_trending() { sign(adx.plus_di - adx.minus_di) } else { 0.0 };
        votes.push(SignalInput::vote("adx", dir, (adx.adx / 50.0).min(1.0)));
    }

    votes
}

/// Percent of votes (0..=100) pointing the same way as `recommendation`;
/// neutral votes count as agreeing with HOLD.  50 when there are no votes.
pub fn agreement_pct(votes: &[SignalInput], recommendation: Recommendation) -> f64 {
    if votes.is_empty() {
        return 50.0;
    }
    let agreeing = votes.iter().filter(|v| v.agrees_with(recommendation)).count();
    agreeing as f64 / votes.len() as f64 * 100.0
}

fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// The main weighted scoring engine.
pub struct WeightedScorer {
    weights: IndicatorWeights,
    /// Minimum absolute score to lean BUY or SELL.
    pub entry_threshold: f64,
}

impl WeightedScorer {
    pub fn new(entry_threshold: f64) -> Self {
        Self {
            weights: IndicatorWeights::default(),
            entry_threshold,
        }
    }

    pub fn with_weights(mut self, weights: IndicatorWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Score a set of signal inputs.  Inputs without a configured weight use
    /// their own `weight`.
    pub fn score(&self, signals: &[SignalInput]) -> ScoringResult {
        let mut contributions = Vec::with_capacity(signals.len());
        let mut total_score = 0.0;

        for signal in signals {
            let base_weight = self
                .weights
                .weights
                .get(&signal.name)
                .copied()
                .unwrap_or(signal.weight);

            let contribution = base_weight * signal.confidence * signal.direction;

            contributions.push(SignalContribution {
                name: signal.name.clone(),
                weight: base_weight,
                confidence: signal.confidence,
                direction: signal.direction,
                contribution,
            });

            total_score += contribution;
        }

        ScoringResult {
            total_score,
            decision: Recommendation::from_score(total_score, self.entry_threshold),
            signal_contributions: contributions,
        }
    }
}

impl Default for WeightedScorer {
    fn default() -> Self {
        Self::new(0.15)
    }
}
