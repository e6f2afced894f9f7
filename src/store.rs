// =============================================================================
// Analysis Store
// =============================================================================
//
// Sink for computed analyses.  The engine writes indicator sets, pattern
// lists and signals after every fresh computation; a failed write is logged
// and never affects the analysis result.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::RwLock;

use crate::indicators::IndicatorSet;
use crate::market_data::CandleKey;
use crate::patterns::PatternDetection;
use crate::signals::Signal;

#[async_trait]
pub trait AnalysisStore: Send + Sync {
    async fn save_indicators(&self, indicators: &IndicatorSet) -> Result<()>;
    async fn save_patterns(&self, key: &CandleKey, patterns: &[PatternDetection]) -> Result<()>;
    async fn save_signal(&self, signal: &Signal) -> Result<()>;
}

/// Signals kept per (symbol, timeframe) by default.
pub const DEFAULT_SIGNAL_HISTORY: usize = 500;

#[derive(Default)]
struct SignalHistory {
    /// Insertion sequence, shared across keys for newest-first listing.
    next_seq: u64,
    by_key: HashMap<CandleKey, VecDeque<(u64, Signal)>>,
}

/// Latest indicators and patterns per key plus a bounded signal history per
/// key; the oldest signal is evicted once a key holds `history` entries.
pub struct InMemoryAnalysisStore {
    indicators: Arc<RwLock<HashMap<CandleKey, IndicatorSet>>>,
    patterns: Arc<RwLock<HashMap<CandleKey, Vec<PatternDetection>>>>,
    signals: Arc<RwLock<SignalHistory>>,
    history: usize,
}

impl Default for InMemoryAnalysisStore {
    fn default() -> Self {
        Self::with_history(DEFAULT_SIGNAL_HISTORY)
    }
}

impl InMemoryAnalysisStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history(history: usize) -> Self {
        Self {
            indicators: Arc::default(),
            patterns: Arc::default(),
            signals: Arc::default(),
            history: history.max(1),
        }
    }

    pub fn indicators(&self, key: &CandleKey) -> Option<IndicatorSet> {
        self.indicators.read().get(key).cloned()
    }

    pub fn patterns(&self, key: &CandleKey) -> Vec<PatternDetection> {
        self.patterns.read().get(key).cloned().unwrap_or_default()
    }

    /// Signals for `symbol`, newest first.
    pub fn signals_for(&self, symbol: &str) -> Vec<Signal> {
        let history = self.signals.read();
        let mut found: Vec<&(u64, Signal)> = history
            .by_key
            .iter()
            .filter(|(key, _)| key.symbol == symbol)
            .flat_map(|(_, signals)| signals.iter())
            .collect();
        found.sort_by(|a, b| b.0.cmp(&a.0));
        found.into_iter().map(|(_, s)| s.clone()).collect()
    }

    pub fn signal_count(&self) -> usize {
        self.signals.read().by_key.values().map(VecDeque::len).sum()
    }
}

#[async_trait]
impl AnalysisStore for InMemoryAnalysisStore {
    async fn save_indicators(&self, indicators: &IndicatorSet) -> Result<()> {
        let key = CandleKey::new(indicators.symbol.clone(), indicators.timeframe);
        self.indicators.write().insert(key, indicators.clone());
        Ok(())
    }

    async fn save_patterns(&self, key: &CandleKey, patterns: &[PatternDetection]) -> Result<()> {
        self.patterns.write().insert(key.clone(), patterns.to_vec());
        Ok(())
    }

    async fn save_signal(&self, signal: &Signal) -> Result<()> {
        let key = CandleKey::new(signal.symbol.clone(), signal.timeframe);
        let mut history = self.signals.write();
        let seq = history.next_seq;
        history.next_seq += 1;

        let signals = history.by_key.entry(key).or_default();
        if signals.len() >= self.history {
            signals.pop_front();
        }
        signals.push_back((seq, signal.clone()));
        Ok(())
    }
}
