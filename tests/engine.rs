use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};

use aurora_analysis::indicators::IndicatorSet;
use aurora_analysis::market_data::{Candle, CandleBuffer, CandleKey, Timeframe};
use aurora_analysis::patterns::detect_patterns;
use aurora_analysis::risk::{RiskEngine, RiskParameters};
use aurora_analysis::signals::{AdvisoryProvider, AdvisoryRecommendation, AnalysisContext, SignalSource};
use aurora_analysis::store::InMemoryAnalysisStore;
use aurora_analysis::types::{Recommendation, Sentiment};
use aurora_analysis::{AnalysisEngine, EngineConfig};

fn series(symbol: &str, timeframe: Timeframe, closes: &[f64]) -> Vec<Candle> {
    let start = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Candle {
            symbol: symbol.to_string(),
            timeframe,
            timestamp: start + Duration::minutes(timeframe.minutes() as i64 * i as i64),
            open: close - 0.3,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1_000.0 + (i % 5) as f64 * 50.0,
        })
        .collect()
}

fn wave(n: usize, drift: f64) -> Vec<f64> {
    (0..n).map(|i| 200.0 + (i as f64 * 0.3).sin() * 4.0 + drift * i as f64).collect()
}

struct Bullish {
    calls: AtomicUsize,
}

#[async_trait]
impl AdvisoryProvider for Bullish {
    async fn request_advisory(&self, context: &AnalysisContext) -> anyhow::Result<AdvisoryRecommendation> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(context.indicators.rsi.is_some());
        Ok(AdvisoryRecommendation {
            recommendation: Recommendation::Buy,
            confidence: 80.0,
            reasoning: "higher lows".into(),
            sentiment: Sentiment::Bullish,
        })
    }
}

#[test]
fn rising_series_indicators() {
    let closes: Vec<f64> = (100..120).map(f64::from).collect();
    let candles = series("BTCUSDT", Timeframe::OneHour, &closes);

    let set = IndicatorSet::calculate(&candles).unwrap();
    assert_eq!(set.rsi, Some(100.0));
    assert!((set.sma20.unwrap() - 109.5).abs() < 1e-9);
    assert!(set.sma50.is_none());
    assert!(detect_patterns(&candles).iter().all(|p| p.confidence > 60.0));
}

#[test]
fn risk_scenario() {
    let engine = RiskEngine::default();
    let params = RiskParameters {
        account_balance: 10_000.0,
        risk_percentage: 1.0,
        entry_price: 100.0,
        stop_loss: 95.0,
        take_profit: 115.0,
        leverage: None,
    };

    let metrics = engine.risk_metrics(&params, 60.0).unwrap();
    assert!((metrics.position_size - 20.0).abs() < 1e-9);
    assert!((metrics.risk_reward_ratio - 3.0).abs() < 1e-9);
    assert!(engine.validate_trade(&params, 60.0).is_valid);
}

#[tokio::test]
async fn multi_timeframe_consensus_from_buffer() {
    let buffer = Arc::new(CandleBuffer::new(500));
    buffer.extend(series("BTCUSDT", Timeframe::OneHour, &wave(220, 0.1)));
    buffer.extend(series("BTCUSDT", Timeframe::FourHours, &wave(120, 0.2)));
    buffer.extend(series("BTCUSDT", Timeframe::OneDay, &wave(5, 0.0)));

    let config = EngineConfig {
        symbols: vec!["BTCUSDT".into()],
        timeframes: vec![Timeframe::OneHour, Timeframe::FourHours, Timeframe::OneDay],
        ..EngineConfig::default()
    };
    let advisory = Arc::new(Bullish {
        calls: AtomicUsize::new(0),
    });
    let store = Arc::new(InMemoryAnalysisStore::new());
    let engine = AnalysisEngine::builder(buffer, config)
        .advisory(advisory.clone())
        .store(store.clone())
        .build();

    let report = engine.analyze("BTCUSDT").await;

    assert_eq!(report.timeframe_analyses.len(), 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].timeframe, Timeframe::OneDay);

    assert_eq!(report.signal_confirmation.signal, Recommendation::Buy);
    assert_eq!(
        report.signal_confirmation.confirmations,
        vec![Timeframe::OneHour, Timeframe::FourHours]
    );
    assert!((0.0..=100.0).contains(&report.signal_confirmation.confidence));
    assert!((0.0..=100.0).contains(&report.confidence));
    assert_eq!(report.correlations.len(), 1);
    assert!(report.correlations[0].agreement);

    for a in &report.timeframe_analyses {
        assert_eq!(a.signal.source, SignalSource::Advisory);
        assert!(a.signal.stop_loss.unwrap() < a.signal.take_profit.unwrap());
    }

    // Cached: a second run asks nobody.
    engine.analyze("BTCUSDT").await;
    assert_eq!(advisory.calls.load(Ordering::SeqCst), 2);
    assert_eq!(store.signal_count(), 2);
    assert!(store.indicators(&CandleKey::new("BTCUSDT", Timeframe::FourHours)).is_some());

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["signal_confirmation"]["signal"], "BUY");
    assert_eq!(json["timeframe_analyses"][0]["timeframe"], "1h");
}
