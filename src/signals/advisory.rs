// =============================================================================
// External advisory collaborator
// =============================================================================
//
// An optional outside opinion (an analytics or language-model service) that
// receives the computed context and answers with a recommendation.  Absence,
// errors and timeouts are normal conditions, recovered by the heuristic
// fallback.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{EngineError, EngineResult};
use crate::indicators::IndicatorSet;
use crate::market_data::Timeframe;
use crate::patterns::{Divergence, PatternDetection};
use crate::types::{Recommendation, Sentiment};

use super::volume::VolumeAnalysis;

/// Everything the advisory gets to see about one series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisContext {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub last_close: f64,
    pub indicators: IndicatorSet,
    pub patterns: Vec<PatternDetection>,
    pub divergences: Vec<Divergence>,
    pub volume: VolumeAnalysis,
    pub volatility: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisoryRecommendation {
    pub recommendation: Recommendation,
    /// 0..=100
    pub confidence: f64,
    pub reasoning: String,
    pub sentiment: Sentiment,
}

#[async_trait]
pub trait AdvisoryProvider: Send + Sync {
    async fn request_advisory(&self, context: &AnalysisContext) -> anyhow::Result<AdvisoryRecommendation>;
}

/// Call `provider` with a bounded wait.
///
/// Provider errors, timeouts and out-of-range confidences all become
/// `AdvisoryUnavailable`.
pub async fn request_with_timeout(
    provider: &dyn AdvisoryProvider,
    context: &AnalysisContext,
    timeout: Duration,
) -> EngineResult<AdvisoryRecommendation> {
    let outcome = tokio::time::timeout(timeout, provider.request_advisory(context)).await;

    let advisory = match outcome {
        Ok(Ok(advisory)) => advisory,
        Ok(Err(e)) => {
            warn!(symbol = %context.symbol, timeframe = %context.timeframe, error = %e, "advisory request failed");
            return Err(EngineError::advisory(format!("{e:#}")));
        }
        Err(_) => {
            warn!(
                symbol = %context.symbol,
                timeframe = %context.timeframe,
                timeout_ms = timeout.as_millis() as u64,
                "advisory request timed out"
            );
            return Err(EngineError::advisory(format!("timed out after {}ms", timeout.as_millis())));
        }
    };

    if !(0.0..=100.0).contains(&advisory.confidence) {
        warn!(symbol = %context.symbol, confidence = advisory.confidence, "advisory confidence out of range");
        return Err(EngineError::advisory(format!(
            "confidence {} outside [0, 100]",
            advisory.confidence
        )));
    }

    Ok(advisory)
}
