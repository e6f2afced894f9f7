// =============================================================================
// Analysis Engine: cached, concurrent multi-timeframe orchestration
// =============================================================================
//
// For every (symbol, timeframe):
//
//   candles     ── CandleSource, bounded wait ──────────── cache: market data
//   indicators  ── IndicatorSet::calculate ─────────────── cache: indicators
//   signal      ── SignalSynthesizer::synthesize_with ──── cache: analysis
//
// Each layer is a single-flight cache, so concurrent requests for the same
// stale key trigger exactly one fetch / computation.  Timeframes of a symbol
// run concurrently; a timeframe that cannot be analysed is dropped from the
// consensus and reported in `failures`.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tracing::{debug, info, warn};

use crate::error::{EngineError, EngineResult};
use crate::indicators::{IndicatorSet, MIN_CANDLES};
use crate::market_data::{validate_series, Candle, CandleKey, CandleSource, Timeframe};
use crate::multi_timeframe::{self, MultiTimeframeAnalysis, TimeframeAnalysis, TimeframeFailure};
use crate::runtime_config::EngineConfig;
use crate::signals::{
    AdvisoryProvider, BinarySignal, EntryState, Signal, SignalSynthesizer, SingleFlightCache, WeightedScorer,
};
use crate::store::AnalysisStore;

// =============================================================================
// Builder
// =============================================================================

pub struct EngineBuilder {
    source: Arc<dyn CandleSource>,
    config: EngineConfig,
    advisory: Option<Arc<dyn AdvisoryProvider>>,
    store: Option<Arc<dyn AnalysisStore>>,
}

impl EngineBuilder {
    pub fn advisory(mut self, provider: Arc<dyn AdvisoryProvider>) -> Self {
        self.advisory = Some(provider);
        self
    }

    pub fn store(mut self, store: Arc<dyn AnalysisStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn build(self) -> AnalysisEngine {
        let config = self.config;

        let mut synthesizer = SignalSynthesizer::new(config.risk.engine())
            .with_scorer(WeightedScorer::new(config.entry_threshold))
            .with_weights(config.confidence_weights);
        if let Some(provider) = self.advisory {
            synthesizer = synthesizer.with_advisory(provider, config.advisory_timeout());
        }

        let windows = config.freshness.windows();
        info!(
            symbols = ?config.symbols,
            timeframes = ?config.timeframes,
            market_data_secs = windows.market_data.as_secs(),
            indicators_secs = windows.indicators.as_secs(),
            analysis_secs = windows.analysis.as_secs(),
            "analysis engine ready"
        );

        AnalysisEngine {
            source: self.source,
            synthesizer: Arc::new(synthesizer),
            store: self.store,
            candles: SingleFlightCache::with_ttl("market_data", windows.market_data),
            indicators: SingleFlightCache::with_ttl("indicators", windows.indicators),
            signals: SingleFlightCache::with_ttl("analysis", windows.analysis),
            config: Arc::new(config),
        }
    }
}

// =============================================================================
// AnalysisEngine
// =============================================================================

/// Cheap to clone; clones share caches and collaborators.
#[derive(Clone)]
pub struct AnalysisEngine {
    source: Arc<dyn CandleSource>,
    synthesizer: Arc<SignalSynthesizer>,
    store: Option<Arc<dyn AnalysisStore>>,
    candles: SingleFlightCache<Arc<Vec<Candle>>>,
    indicators: SingleFlightCache<IndicatorSet>,
    signals: SingleFlightCache<Signal>,
    config: Arc<EngineConfig>,
}

impl AnalysisEngine {
    pub fn builder(source: Arc<dyn CandleSource>, config: EngineConfig) -> EngineBuilder {
        EngineBuilder {
            source,
            config,
            advisory: None,
            store: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // -------------------------------------------------------------------------
    // Multi-timeframe
    // -------------------------------------------------------------------------

    /// Consensus across every configured timeframe.  Never fails.
    pub async fn analyze(&self, symbol: &str) -> MultiTimeframeAnalysis {
        self.analyze_timeframes(symbol, &self.config.timeframes).await
    }

    pub async fn analyze_timeframes(&self, symbol: &str, timeframes: &[Timeframe]) -> MultiTimeframeAnalysis {
        let results = join_all(timeframes.iter().map(|&tf| self.analyze_timeframe(symbol, tf))).await;

        let mut analyses = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        for result in results {
            match result {
                Ok(a) => analyses.push(a),
                Err(f) => failures.push(f),
            }
        }
        multi_timeframe::aggregate(symbol, analyses, failures)
    }

    /// Consensus for every configured symbol, in configuration order.
    pub async fn analyze_all(&self) -> Vec<MultiTimeframeAnalysis> {
        join_all(self.config.symbols.iter().map(|s| self.analyze(s))).await
    }

    // -------------------------------------------------------------------------
    // Single timeframe
    // -------------------------------------------------------------------------

    pub async fn analyze_timeframe(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> Result<TimeframeAnalysis, TimeframeFailure> {
        let key = CandleKey::new(symbol, timeframe);
        let fail = |reason: String| {
            debug!(key = %key, reason = %reason, "timeframe dropped");
            TimeframeFailure { timeframe, reason }
        };

        let candles = self
            .candles_for(&key)
            .await
            .ok_or_else(|| fail("market data unavailable".to_string()))?;

        if candles.len() < MIN_CANDLES {
            return Err(fail(
                EngineError::InsufficientData {
                    required: MIN_CANDLES,
                    available: candles.len(),
                }
                .to_string(),
            ));
        }
        validate_series(&candles).map_err(|e| fail(e.to_string()))?;

        let signal = self
            .signal_for(&key, Arc::clone(&candles))
            .await
            .ok_or_else(|| fail("analysis unavailable".to_string()))?;

        Ok(TimeframeAnalysis::new(signal, &candles))
    }

    /// Signal for one timeframe; a degraded signal when analysis is impossible.
    pub async fn signal(&self, symbol: &str, timeframe: Timeframe) -> Signal {
        match self.analyze_timeframe(symbol, timeframe).await {
            Ok(a) => a.signal,
            Err(f) => Signal::degraded(&CandleKey::new(symbol, timeframe), f.reason),
        }
    }

    pub async fn binary_signal(&self, symbol: &str, timeframe: Timeframe) -> EngineResult<BinarySignal> {
        let key = CandleKey::new(symbol, timeframe);
        let candle_count = self.candles_for(&key).await.map(|c| c.len()).unwrap_or(0);
        let signal = self.signal(symbol, timeframe).await;
        BinarySignal::from_signal(&signal, candle_count)
    }

    // -------------------------------------------------------------------------
    // Cache layers
    // -------------------------------------------------------------------------

    async fn candles_for(&self, key: &CandleKey) -> Option<Arc<Vec<Candle>>> {
        let source = Arc::clone(&self.source);
        let limit = self.config.candle_limit;
        let timeout = self.config.candle_fetch_timeout();
        let key_owned = key.clone();

        self.candles
            .get_or_compute(key, move || fetch_candles(source, key_owned, limit, timeout))
            .await
    }

    async fn signal_for(&self, key: &CandleKey, candles: Arc<Vec<Candle>>) -> Option<Signal> {
        let engine = self.clone();
        let key_owned = key.clone();

        self.signals
            .get_or_compute(key, move || async move {
                let indicators = engine.indicators_for(&key_owned, Arc::clone(&candles)).await?;
                let signal = engine
                    .synthesizer
                    .synthesize_with(&key_owned, &candles, Ok(indicators))
                    .await;

                if let Some(store) = &engine.store {
                    if let Err(e) = store.save_patterns(&key_owned, &signal.patterns).await {
                        warn!(key = %key_owned, error = %e, "failed to store patterns");
                    }
                    if let Err(e) = store.save_signal(&signal).await {
                        warn!(key = %key_owned, error = %e, "failed to store signal");
                    }
                }
                Some(signal)
            })
            .await
    }

    async fn indicators_for(&self, key: &CandleKey, candles: Arc<Vec<Candle>>) -> Option<IndicatorSet> {
        let store = self.store.clone();
        let key_owned = key.clone();

        self.indicators
            .get_or_compute(key, move || async move {
                let set = match IndicatorSet::calculate(&candles) {
                    Ok(set) => set,
                    Err(e) => {
                        warn!(key = %key_owned, error = %e, "indicator calculation failed");
                        return None;
                    }
                };
                if let Some(store) = store {
                    if let Err(e) = store.save_indicators(&set).await {
                        warn!(key = %key_owned, error = %e, "failed to store indicators");
                    }
                }
                Some(set)
            })
            .await
    }

    /// Freshness of the analysis layer for `key`.
    pub fn status(&self, key: &CandleKey) -> EntryState {
        self.signals.status(key)
    }

    /// Force every layer of `key` stale.
    pub fn invalidate(&self, key: &CandleKey) {
        self.candles.invalidate(key);
        self.indicators.invalidate(key);
        self.signals.invalidate(key);
    }

    pub fn purge_expired(&self) -> usize {
        self.candles.purge_expired() + self.indicators.purge_expired() + self.signals.purge_expired()
    }
}

async fn fetch_candles(
    source: Arc<dyn CandleSource>,
    key: CandleKey,
    limit: usize,
    timeout: Duration,
) -> Option<Arc<Vec<Candle>>> {
    match tokio::time::timeout(timeout, source.get_candles(&key.symbol, key.timeframe, limit)).await {
        Ok(Ok(candles)) => {
            debug!(key = %key, count = candles.len(), "candles fetched");
            Some(Arc::new(candles))
        }
        Ok(Err(e)) => {
            warn!(key = %key, error = %e, "candle fetch failed");
            None
        }
        Err(_) => {
            warn!(key = %key, timeout_ms = timeout.as_millis() as u64, "candle fetch timed out");
            None
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryAnalysisStore;
    use crate::types::Recommendation;
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn series(symbol: &str, timeframe: Timeframe, n: usize) -> Vec<Candle> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..n)
            .map(|i| {
                let close = 100.0 + (i as f64 * 0.4).sin() * 3.0 + i as f64 * 0.05;
                Candle {
                    symbol: symbol.into(),
                    timeframe,
                    timestamp: start + ChronoDuration::minutes(timeframe.minutes() as i64 * i as i64),
                    open: close - 0.2,
                    high: close + 0.8,
                    low: close - 0.8,
                    close,
                    volume: 500.0 + (i % 7) as f64 * 20.0,
                }
            })
            .collect()
    }

    /// Serves synthetic series; one timeframe can be made to fail or stall.
    struct Scripted {
        calls: AtomicUsize,
        failing: Option<Timeframe>,
        stalled: Option<Timeframe>,
        short: Option<Timeframe>,
    }

    impl Scripted {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                failing: None,
                stalled: None,
                short: None,
            }
        }
    }

    #[async_trait]
    impl CandleSource for Scripted {
        async fn get_candles(&self, symbol: &str, timeframe: Timeframe, limit: usize) -> anyhow::Result<Vec<Candle>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            if self.failing == Some(timeframe) {
                anyhow::bail!("exchange unavailable");
            }
            if self.stalled == Some(timeframe) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            let n = if self.short == Some(timeframe) { 8 } else { limit.min(120) };
            Ok(series(symbol, timeframe, n))
        }
    }

    fn config(timeframes: Vec<Timeframe>) -> EngineConfig {
        EngineConfig {
            symbols: vec!["BTCUSDT".into()],
            timeframes,
            ..EngineConfig::default()
        }
    }

    // ---- single-flight ----

    #[tokio::test(start_paused = true)]
    async fn concurrent_analyses_fetch_once() {
        let source = Arc::new(Scripted::new());
        let engine = AnalysisEngine::builder(source.clone(), config(vec![Timeframe::OneHour, Timeframe::FourHours])).build();

        let runs = join_all((0..8).map(|_| engine.analyze("BTCUSDT"))).await;
        assert!(runs.iter().all(|r| r.timeframe_analyses.len() == 2));
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);

        let key = CandleKey::new("BTCUSDT", Timeframe::OneHour);
        assert_eq!(engine.status(&key), EntryState::Fresh);
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_triggers_refetch() {
        let source = Arc::new(Scripted::new());
        let engine = AnalysisEngine::builder(source.clone(), config(vec![Timeframe::OneHour])).build();

        engine.analyze("BTCUSDT").await;
        engine.analyze("BTCUSDT").await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(31 * 60)).await;
        engine.analyze("BTCUSDT").await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    // ---- degraded paths ----

    #[tokio::test(start_paused = true)]
    async fn failing_timeframes_are_dropped() {
        let mut scripted = Scripted::new();
        scripted.failing = Some(Timeframe::FiveMinutes);
        scripted.stalled = Some(Timeframe::FifteenMinutes);
        scripted.short = Some(Timeframe::OneDay);
        let engine = AnalysisEngine::builder(
            Arc::new(scripted),
            config(vec![
                Timeframe::FiveMinutes,
                Timeframe::FifteenMinutes,
                Timeframe::OneHour,
                Timeframe::OneDay,
            ]),
        )
        .build();

        let out = engine.analyze("BTCUSDT").await;
        assert_eq!(out.timeframe_analyses.len(), 1);
        assert_eq!(out.timeframe_analyses[0].timeframe, Timeframe::OneHour);
        assert_eq!(out.failures.len(), 3);

        let short = out.failures.iter().find(|f| f.timeframe == Timeframe::OneDay).unwrap();
        assert!(short.reason.contains("insufficient data"));
        assert!((0.0..=100.0).contains(&out.signal_confirmation.confidence));
    }

    #[tokio::test(start_paused = true)]
    async fn everything_failing_is_neutral() {
        let mut scripted = Scripted::new();
        scripted.failing = Some(Timeframe::OneHour);
        let engine = AnalysisEngine::builder(Arc::new(scripted), config(vec![Timeframe::OneHour])).build();

        let out = engine.analyze("BTCUSDT").await;
        assert!(out.is_degraded());
        assert_eq!(out.signal_confirmation.signal, Recommendation::Hold);
        assert_eq!(out.confidence, 0.0);

        let signal = engine.signal("BTCUSDT", Timeframe::OneHour).await;
        assert!(signal.is_degraded());
        assert_eq!(signal.reasoning, "market data unavailable");
    }

    // ---- store ----

    #[tokio::test(start_paused = true)]
    async fn fresh_computations_are_stored_once() {
        let store = Arc::new(InMemoryAnalysisStore::new());
        let engine = AnalysisEngine::builder(Arc::new(Scripted::new()), config(vec![Timeframe::OneHour]))
            .store(store.clone())
            .build();

        engine.analyze("BTCUSDT").await;
        engine.analyze("BTCUSDT").await;

        let key = CandleKey::new("BTCUSDT", Timeframe::OneHour);
        assert_eq!(store.signal_count(), 1);
        assert!(store.indicators(&key).is_some());

        engine.invalidate(&key);
        assert_eq!(engine.status(&key), EntryState::Stale);
        engine.analyze("BTCUSDT").await;
        assert_eq!(store.signal_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn binary_signal_from_engine() {
        let engine = AnalysisEngine::builder(Arc::new(Scripted::new()), config(vec![Timeframe::FiveMinutes])).build();
        let b = engine.binary_signal("BTCUSDT", Timeframe::FiveMinutes).await.unwrap();
        assert_eq!(b.expiry_minutes, 5);
        assert!(b.confidence <= 100);
    }
}
