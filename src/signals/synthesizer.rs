// =============================================================================
// Signal Synthesizer
// =============================================================================
//
// Pipeline for one (symbol, timeframe) window:
//   1. indicators + patterns + divergences
//   2. advisory opinion (bounded wait) or the heuristic fallback
//   3. volume trend and ATR volatility
//   4. confidence blend:  patterns 40% / indicator agreement 30% / volume 30%,
//      averaged with the source confidence
//   5. risk level and ATR stop/target
//
// `synthesize` never fails.  Anything that prevents a real analysis produces
// a degraded HOLD signal whose reasoning says why.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::EngineResult;
use crate::indicators::{atr, IndicatorSet};
use crate::market_data::{Candle, CandleKey, Timeframe};
use crate::patterns::{detect_divergences, detect_patterns, Divergence, PatternDetection};
use crate::risk::RiskEngine;
use crate::types::{Recommendation, RiskLevel, Sentiment};

use super::advisory::{request_with_timeout, AdvisoryProvider, AnalysisContext};
use super::fallback::heuristic_fallback;
use super::volume::VolumeAnalysis;
use super::weighted_score::{agreement_pct, indicator_votes, WeightedScorer};

/// Relative weights of the confidence blend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceWeights {
    pub patterns: f64,
    pub agreement: f64,
    pub volume: f64,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            patterns: 0.4,
            agreement: 0.3,
            volume: 0.3,
        }
    }
}

/// Where the recommendation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalSource {
    Advisory,
    Fallback,
    Degraded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub id: Uuid,
    pub symbol: String,
    pub timeframe: Timeframe,
    pub recommendation: Recommendation,
    /// 0..=100
    pub confidence: f64,
    pub sentiment: Sentiment,
    pub risk_level: RiskLevel,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub patterns: Vec<PatternDetection>,
    pub divergences: Vec<Divergence>,
    pub reasoning: String,
    pub indicators: Option<IndicatorSet>,
    pub volume: VolumeAnalysis,
    /// ATR as a percent of the mean close.
    pub volatility: Option<f64>,
    /// Signed weighted indicator score.
    pub technical_score: f64,
    pub source: SignalSource,
    pub created_at: DateTime<Utc>,
}

impl Signal {
    /// Neutral, zero-confidence signal explaining why no analysis was possible.
    pub fn degraded(key: &CandleKey, reason: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            symbol: key.symbol.clone(),
            timeframe: key.timeframe,
            recommendation: Recommendation::Hold,
            confidence: 0.0,
            sentiment: Sentiment::Neutral,
            risk_level: RiskLevel::Medium,
            stop_loss: None,
            take_profit: None,
            patterns: Vec::new(),
            divergences: Vec::new(),
            reasoning: reason.into(),
            indicators: None,
            volume: VolumeAnalysis::default(),
            volatility: None,
            technical_score: 0.0,
            source: SignalSource::Degraded,
            created_at: Utc::now(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.source == SignalSource::Degraded
    }
}

pub struct SignalSynthesizer {
    risk: RiskEngine,
    scorer: WeightedScorer,
    advisory: Option<Arc<dyn AdvisoryProvider>>,
    advisory_timeout: Duration,
    weights: ConfidenceWeights,
}

impl Default for SignalSynthesizer {
    fn default() -> Self {
        Self::new(RiskEngine::default())
    }
}

impl SignalSynthesizer {
    pub fn new(risk: RiskEngine) -> Self {
        Self {
            risk,
            scorer: WeightedScorer::default(),
            advisory: None,
            advisory_timeout: Duration::from_secs(10),
            weights: ConfidenceWeights::default(),
        }
    }

    pub fn with_advisory(mut self, provider: Arc<dyn AdvisoryProvider>, timeout: Duration) -> Self {
        info!(timeout_ms = timeout.as_millis() as u64, "advisory provider attached");
        self.advisory = Some(provider);
        self.advisory_timeout = timeout;
        self
    }

    pub fn with_weights(mut self, weights: ConfidenceWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_scorer(mut self, scorer: WeightedScorer) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn risk(&self) -> &RiskEngine {
        &self.risk
    }

    /// Full synthesis from raw candles.
    pub async fn synthesize(&self, key: &CandleKey, candles: &[Candle]) -> Signal {
        let indicators = IndicatorSet::calculate(candles);
        self.synthesize_with(key, candles, indicators).await
    }

    /// Synthesis reusing an already computed indicator set.
    pub async fn synthesize_with(
        &self,
        key: &CandleKey,
        candles: &[Candle],
        indicators: EngineResult<IndicatorSet>,
    ) -> Signal {
        let indicators = match indicators {
            Ok(set) => set,
            Err(e) => {
                debug!(key = %key, error = %e, "degraded signal");
                return Signal::degraded(key, e.to_string());
            }
        };

        let patterns = detect_patterns(candles);
        let divergences = detect_divergences(candles);
        let volume = VolumeAnalysis::analyze(candles);
        let volatility = atr::volatility_pct(candles, atr::DEFAULT_PERIOD);

        let context = AnalysisContext {
            symbol: key.symbol.clone(),
            timeframe: key.timeframe,
            last_close: indicators.last_close,
            indicators,
            patterns,
            divergences,
            volume,
            volatility,
        };

        let mut reasoning = Vec::new();
        let (opinion, source) = match &self.advisory {
            Some(provider) => match request_with_timeout(provider.as_ref(), &context, self.advisory_timeout).await {
                Ok(advisory) => (advisory, SignalSource::Advisory),
                Err(e) => {
                    reasoning.push(e.to_string());
                    (heuristic_fallback(context.indicators.rsi), SignalSource::Fallback)
                }
            },
            None => (heuristic_fallback(context.indicators.rsi), SignalSource::Fallback),
        };
        reasoning.insert(0, opinion.reasoning.clone());

        let recommendation = opinion.recommendation;
        let votes = indicator_votes(&context.indicators);
        let scoring = self.scorer.score(&votes);

        let pattern_score = pattern_alignment(&context.patterns, recommendation);
        let agreement = agreement_pct(&votes, recommendation);
        let blend = self.weights.patterns * pattern_score
            + self.weights.agreement * agreement
            + self.weights.volume * context.volume.blend_score();
        let confidence = (0.5 * opinion.confidence + 0.5 * blend).clamp(0.0, 100.0);

        let levels = atr::calculate_atr(candles, atr::DEFAULT_PERIOD)
            .and_then(|a| self.risk.dynamic_levels(context.last_close, a, recommendation));

        reasoning.push(format!(
            "technical score {:.3} leans {} ({} votes, {:.0}% agree)",
            scoring.total_score,
            scoring.decision,
            votes.len(),
            agreement
        ));
        if !context.patterns.is_empty() {
            let names: Vec<&str> = context.patterns.iter().take(3).map(|p| p.name.as_str()).collect();
            reasoning.push(format!("patterns: {}", names.join(", ")));
        }
        for d in &context.divergences {
            reasoning.push(d.description.clone());
        }

        debug!(
            key = %key,
            recommendation = %recommendation,
            confidence = format!("{:.2}", confidence),
            source = ?source,
            "signal synthesized"
        );

        let AnalysisContext {
            symbol,
            timeframe,
            indicators,
            patterns,
            divergences,
            volume,
            volatility,
            ..
        } = context;

        Signal {
            id: Uuid::new_v4(),
            symbol,
            timeframe,
            recommendation,
            confidence,
            sentiment: opinion.sentiment,
            risk_level: RiskLevel::from_volatility(volatility),
            stop_loss: levels.map(|l| l.stop_loss),
            take_profit: levels.map(|l| l.take_profit),
            patterns,
            divergences,
            reasoning: reasoning.join("; "),
            indicators: Some(indicators),
            volume,
            volatility,
            technical_score: scoring.total_score,
            source,
            created_at: Utc::now(),
        }
    }
}

/// Share (0..=100) of directional pattern confidence pointing the same way
/// as `recommendation`.  Indecision patterns are ignored.  50 without
/// directional patterns or without a direction.
fn pattern_alignment(patterns: &[PatternDetection], recommendation: Recommendation) -> f64 {
    let expected = recommendation.sentiment();
    let (agreeing, total) = patterns
        .iter()
        .filter(|p| p.directional)
        .fold((0.0, 0.0), |(agreeing, total), p| {
            let agreeing = if p.bias() == expected { agreeing + p.confidence } else { agreeing };
            (agreeing, total + p.confidence)
        });
    if total <= 0.0 || recommendation == Recommendation::Hold {
        return 50.0;
    }
    agreeing / total * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::advisory::AdvisoryRecommendation;
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, TimeZone};

    fn series(closes: &[f64]) -> Vec<Candle> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                symbol: "BTCUSDT".into(),
                timeframe: Timeframe::OneHour,
                timestamp: start + ChronoDuration::hours(i as i64),
                open: close - 0.5,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 1_000.0,
            })
            .collect()
    }

    fn key() -> CandleKey {
        CandleKey::new("BTCUSDT", Timeframe::OneHour)
    }

    struct Bearish;

    #[async_trait]
    impl AdvisoryProvider for Bearish {
        async fn request_advisory(&self, _: &AnalysisContext) -> anyhow::Result<AdvisoryRecommendation> {
            Ok(AdvisoryRecommendation {
                recommendation: Recommendation::Sell,
                confidence: 90.0,
                reasoning: "distribution".into(),
                sentiment: Sentiment::Bearish,
            })
        }
    }

    struct Down;

    #[async_trait]
    impl AdvisoryProvider for Down {
        async fn request_advisory(&self, _: &AnalysisContext) -> anyhow::Result<AdvisoryRecommendation> {
            anyhow::bail!("connection refused")
        }
    }

    // ---- degraded ----

    #[tokio::test]
    async fn short_window_degrades() {
        let signal = SignalSynthesizer::default().synthesize(&key(), &series(&[1.0; 5])).await;
        assert_eq!(signal.recommendation, Recommendation::Hold);
        assert_eq!(signal.confidence, 0.0);
        assert_eq!(signal.sentiment, Sentiment::Neutral);
        assert!(signal.is_degraded());
        assert!(signal.reasoning.contains("insufficient data"));
    }

    // ---- fallback ----

    #[tokio::test]
    async fn rising_series_uses_fallback_and_sells() {
        let closes: Vec<f64> = (100..120).map(f64::from).collect();
        let signal = SignalSynthesizer::default().synthesize(&key(), &series(&closes)).await;

        // Monotonic gains push RSI to 100, the fallback calls it overbought.
        assert_eq!(signal.source, SignalSource::Fallback);
        assert_eq!(signal.recommendation, Recommendation::Sell);
        assert_eq!(signal.sentiment, Sentiment::Bearish);
        assert!((0.0..=100.0).contains(&signal.confidence));

        let levels = (signal.stop_loss.unwrap(), signal.take_profit.unwrap());
        assert!(levels.0 > 119.0, "sell stop sits above price");
        assert!(levels.1 < 119.0, "sell target sits below price");
    }

    #[tokio::test]
    async fn failing_advisory_is_noted_in_reasoning() {
        let closes: Vec<f64> = (100..130).map(f64::from).collect();
        let synth = SignalSynthesizer::default().with_advisory(Arc::new(Down), Duration::from_secs(1));
        let signal = synth.synthesize(&key(), &series(&closes)).await;

        assert_eq!(signal.source, SignalSource::Fallback);
        assert!(signal.reasoning.contains("advisory unavailable"));
        assert!(signal.reasoning.contains("connection refused"));
    }

    #[tokio::test]
    async fn entry_threshold_sets_technical_lean() {
        let closes: Vec<f64> = (100..130).map(f64::from).collect();
        let strict = SignalSynthesizer::default().with_scorer(WeightedScorer::new(10.0));
        let signal = strict.synthesize(&key(), &series(&closes)).await;
        assert!(signal.reasoning.contains("leans HOLD"), "{}", signal.reasoning);
    }

    // ---- advisory ----

    #[tokio::test]
    async fn advisory_drives_recommendation() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + (i as f64 * 0.7).sin()).collect();
        let synth = SignalSynthesizer::default().with_advisory(Arc::new(Bearish), Duration::from_secs(1));
        let signal = synth.synthesize(&key(), &series(&closes)).await;

        assert_eq!(signal.source, SignalSource::Advisory);
        assert_eq!(signal.recommendation, Recommendation::Sell);
        assert!(signal.reasoning.starts_with("distribution"));
        // Source confidence contributes half.
        assert!(signal.confidence >= 45.0 && signal.confidence <= 95.0);
        assert!(signal.indicators.is_some());
    }

    // ---- blend ----

    #[test]
    fn pattern_alignment_weights_by_confidence() {
        let p = |bullish, confidence| PatternDetection {
            name: "x".into(),
            confidence,
            description: String::new(),
            bullish,
            directional: true,
        };
        let patterns = vec![p(true, 90.0), p(false, 30.0)];
        assert!((pattern_alignment(&patterns, Recommendation::Buy) - 75.0).abs() < 1e-9);
        assert!((pattern_alignment(&patterns, Recommendation::Sell) - 25.0).abs() < 1e-9);
        assert_eq!(pattern_alignment(&patterns, Recommendation::Hold), 50.0);
        assert_eq!(pattern_alignment(&[], Recommendation::Buy), 50.0);
    }

    #[test]
    fn doji_does_not_lean_either_way() {
        let doji = PatternDetection {
            name: "Doji".into(),
            confidence: 75.0,
            description: String::new(),
            bullish: false,
            directional: false,
        };
        let buy = pattern_alignment(std::slice::from_ref(&doji), Recommendation::Buy);
        let sell = pattern_alignment(std::slice::from_ref(&doji), Recommendation::Sell);
        assert_eq!(buy, 50.0);
        assert_eq!(sell, 50.0);

        // Alongside a bullish pattern the doji adds no weight to either side.
        let engulfing = PatternDetection {
            name: "Bullish Engulfing".into(),
            confidence: 85.0,
            description: String::new(),
            bullish: true,
            directional: true,
        };
        let mixed = vec![engulfing, doji];
        assert_eq!(pattern_alignment(&mixed, Recommendation::Buy), 100.0);
        assert_eq!(pattern_alignment(&mixed, Recommendation::Sell), 0.0);
    }

    #[test]
    fn default_weights_sum_to_one() {
        let w = ConfidenceWeights::default();
        assert!((w.patterns + w.agreement + w.volume - 1.0).abs() < 1e-12);
    }
}
