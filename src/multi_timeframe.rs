// =============================================================================
// Multi-Timeframe Aggregation
// =============================================================================
//
// Folds the per-timeframe signals of one symbol into a consensus:
//
//   score[rec]  += weight * confidence / 100      for every timeframe
//   consensus    = argmax(score / sum(weight))    ties go to the later of
//                                                 BUY, SELL, HOLD
//   confidence   = winning normalized score * 100
//
// plus confirmations, pairwise return correlations, the market regime, an
// aggregate volume view and an overall confidence:
//
//   overall = round(agreement * 0.4 + correlation strength * 0.3
//                   + trend strength * 0.3)
//
// Timeframes that failed are listed in `failures`; when nothing succeeded the
// result is a neutral, zero-confidence consensus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::EngineError;
use crate::market_data::{Candle, Timeframe};
use crate::regime::{self, MarketRegime};
use crate::signals::volume::{Significance, VolumeTrend};
use crate::signals::Signal;
use crate::types::Recommendation;

/// Closes kept per timeframe for correlation and range (20 returns).
pub const CORRELATION_WINDOW: usize = 21;

// =============================================================================
// Types
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeframeAnalysis {
    pub timeframe: Timeframe,
    pub signal: Signal,
    pub weight: f64,
    pub recent_closes: Vec<f64>,
}

impl TimeframeAnalysis {
    pub fn new(signal: Signal, candles: &[Candle]) -> Self {
        let start = candles.len().saturating_sub(CORRELATION_WINDOW);
        Self {
            timeframe: signal.timeframe,
            weight: signal.timeframe.weight(),
            recent_closes: candles[start..].iter().map(|c| c.close).collect(),
            signal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalConfirmation {
    pub signal: Recommendation,
    /// 0..=100
    pub confidence: f64,
    pub confirmations: Vec<Timeframe>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeframeCorrelation {
    pub timeframe1: Timeframe,
    pub timeframe2: Timeframe,
    /// Pearson coefficient of recent close-to-close returns, -1..=1.
    pub correlation: f64,
    pub agreement: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeSummary {
    pub trend: VolumeTrend,
    pub strength: f64,
    pub abnormal_volume: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeframeFailure {
    pub timeframe: Timeframe,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiTimeframeAnalysis {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub timeframe_analyses: Vec<TimeframeAnalysis>,
    pub market_regime: MarketRegime,
    pub correlations: Vec<TimeframeCorrelation>,
    pub signal_confirmation: SignalConfirmation,
    pub volume_analysis: VolumeSummary,
    /// 0..=100
    pub confidence: f64,
    pub failures: Vec<TimeframeFailure>,
}

impl MultiTimeframeAnalysis {
    pub fn is_degraded(&self) -> bool {
        self.timeframe_analyses.is_empty()
    }
}

// =============================================================================
// Aggregation
// =============================================================================

pub fn aggregate(
    symbol: &str,
    analyses: Vec<TimeframeAnalysis>,
    failures: Vec<TimeframeFailure>,
) -> MultiTimeframeAnalysis {
    if analyses.is_empty() {
        let err = EngineError::AggregateFailure {
            attempted: failures.len(),
        };
        warn!(symbol, error = %err, "returning neutral consensus");
        return MultiTimeframeAnalysis {
            symbol: symbol.to_string(),
            timestamp: Utc::now(),
            timeframe_analyses: Vec::new(),
            market_regime: MarketRegime::neutral(),
            correlations: Vec::new(),
            signal_confirmation: SignalConfirmation {
                signal: Recommendation::Hold,
                confidence: 0.0,
                confirmations: Vec::new(),
            },
            volume_analysis: VolumeSummary {
                trend: VolumeTrend::Neutral,
                strength: 0.0,
                abnormal_volume: false,
            },
            confidence: 0.0,
            failures,
        };
    }

    let signal_confirmation = consensus(&analyses);
    let correlations = correlations(&analyses);
    let market_regime = regime::detect(&analyses);
    let volume_analysis = aggregate_volume(&analyses);

    let agreement = signal_agreement(&analyses, signal_confirmation.signal);
    let confidence = (agreement * 0.4
        + correlation_strength(&correlations) * 0.3
        + regime::trend_strength(&analyses) * 0.3)
        .round()
        .clamp(0.0, 100.0);

    debug!(
        symbol,
        consensus = %signal_confirmation.signal,
        consensus_confidence = format!("{:.2}", signal_confirmation.confidence),
        overall = confidence,
        regime = %market_regime.kind,
        timeframes = analyses.len(),
        failed = failures.len(),
        "multi-timeframe analysis complete"
    );

    MultiTimeframeAnalysis {
        symbol: symbol.to_string(),
        timestamp: Utc::now(),
        timeframe_analyses: analyses,
        market_regime,
        correlations,
        signal_confirmation,
        volume_analysis,
        confidence,
        failures,
    }
}

/// Weighted vote over the per-timeframe recommendations.
pub fn consensus(analyses: &[TimeframeAnalysis]) -> SignalConfirmation {
    let total_weight: f64 = analyses.iter().map(|a| a.weight).sum();
    if analyses.is_empty() || total_weight <= 0.0 {
        return SignalConfirmation {
            signal: Recommendation::Hold,
            confidence: 0.0,
            confirmations: Vec::new(),
        };
    }

    let order = [Recommendation::Buy, Recommendation::Sell, Recommendation::Hold];
    let mut scores = [0.0_f64; 3];
    for a in analyses {
        let slot = match a.signal.recommendation {
            Recommendation::Buy => 0,
            Recommendation::Sell => 1,
            Recommendation::Hold => 2,
        };
        scores[slot] += a.weight * a.signal.confidence / 100.0;
    }

    let mut winner = 0;
    for i in 1..order.len() {
        if scores[i] >= scores[winner] {
            winner = i;
        }
    }
    let signal = order[winner];

    SignalConfirmation {
        signal,
        confidence: (scores[winner] / total_weight * 100.0).clamp(0.0, 100.0),
        confirmations: analyses
            .iter()
            .filter(|a| a.signal.recommendation == signal)
            .map(|a| a.timeframe)
            .collect(),
    }
}

/// Every unordered pair of timeframes, in input order.
pub fn correlations(analyses: &[TimeframeAnalysis]) -> Vec<TimeframeCorrelation> {
    let mut out = Vec::new();
    for (i, a) in analyses.iter().enumerate() {
        for b in &analyses[i + 1..] {
            out.push(TimeframeCorrelation {
                timeframe1: a.timeframe,
                timeframe2: b.timeframe,
                correlation: pearson(&returns(&a.recent_closes), &returns(&b.recent_closes)),
                agreement: a.signal.recommendation == b.signal.recommendation,
            });
        }
    }
    out
}

fn returns(closes: &[f64]) -> Vec<f64> {
    closes
        .windows(2)
        .map(|w| if w[0] != 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

/// Pearson coefficient of the tail-aligned overlap of `a` and `b`.  Zero when
/// fewer than two points overlap or either side has no variance.
pub fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n < 2 {
        return 0.0;
    }
    let a = &a[a.len() - n..];
    let b = &b[b.len() - n..];

    let mean_a = a.iter().sum::<f64>() / n as f64;
    let mean_b = b.iter().sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    let denom = (var_a * var_b).sqrt();
    if denom <= f64::EPSILON {
        return 0.0;
    }
    (cov / denom).clamp(-1.0, 1.0)
}

/// Percent of timeframes recommending `signal`.
pub fn signal_agreement(analyses: &[TimeframeAnalysis], signal: Recommendation) -> f64 {
    if analyses.is_empty() {
        return 0.0;
    }
    let agreeing = analyses.iter().filter(|a| a.signal.recommendation == signal).count();
    agreeing as f64 / analyses.len() as f64 * 100.0
}

/// Mean absolute correlation in percent.
pub fn correlation_strength(correlations: &[TimeframeCorrelation]) -> f64 {
    if correlations.is_empty() {
        return 0.0;
    }
    correlations.iter().map(|c| c.correlation.abs()).sum::<f64>() / correlations.len() as f64 * 100.0
}

pub fn aggregate_volume(analyses: &[TimeframeAnalysis]) -> VolumeSummary {
    if analyses.is_empty() {
        return VolumeSummary {
            trend: VolumeTrend::Neutral,
            strength: 0.0,
            abnormal_volume: false,
        };
    }

    let strength = analyses.iter().map(|a| a.signal.volume.score).sum::<f64>() / analyses.len() as f64 * 100.0;
    let abnormal_volume = analyses
        .iter()
        .any(|a| a.signal.volume.significance == Significance::High);

    let count = |t: VolumeTrend| analyses.iter().filter(|a| a.signal.volume.trend == t).count();
    let (up, down) = (count(VolumeTrend::Increasing), count(VolumeTrend::Decreasing));
    let trend = if up > down {
        VolumeTrend::Increasing
    } else if down > up {
        VolumeTrend::Decreasing
    } else {
        VolumeTrend::Neutral
    };

    VolumeSummary {
        trend,
        strength,
        abnormal_volume,
    }
}
