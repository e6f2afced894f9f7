// =============================================================================
// Signals Module
// =============================================================================
//
// Signal synthesis for a single (symbol, timeframe):
// - Weighted indicator voting and agreement
// - Volume trend analysis
// - Optional external advisory with heuristic fallback
// - Single-flight freshness caching
// - Binary-option projection

pub mod advisory;
pub mod binary;
pub mod cache;
pub mod fallback;
pub mod synthesizer;
pub mod volume;
pub mod weighted_score;

pub use advisory::{AdvisoryProvider, AdvisoryRecommendation, AnalysisContext};
pub use binary::{BinaryDirection, BinarySignal};
pub use cache::{EntryState, ExpiryPolicy, FixedTtl, FreshnessWindows, SingleFlightCache};
pub use fallback::heuristic_fallback;
pub use synthesizer::{ConfidenceWeights, Signal, SignalSource, SignalSynthesizer};
pub use volume::VolumeAnalysis;
pub use weighted_score::{ScoringResult, SignalInput, WeightedScorer};
