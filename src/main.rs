// =============================================================================
// Aurora Analysis: Main Entry Point
// =============================================================================
//
// Loads candles from a JSON file into the in-memory buffer, runs the
// multi-timeframe analysis for every configured symbol and prints the
// reports as JSON.
//
//   ENGINE_CONFIG        config path            (default engine_config.json)
//   ENGINE_CANDLES_FILE  candle JSON array      (default candles.json)
//   ENGINE_SYMBOLS       comma-separated override of the configured symbols
// =============================================================================

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use aurora_analysis::market_data::{load_candles_file, CandleBuffer};
use aurora_analysis::store::InMemoryAnalysisStore;
use aurora_analysis::{AnalysisEngine, EngineConfig};

const MAX_CANDLES_PER_SERIES: usize = 1_000;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config_path = std::env::var("ENGINE_CONFIG").unwrap_or_else(|_| "engine_config.json".to_string());
    let mut config = EngineConfig::load(&config_path).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        EngineConfig::default()
    });

    if let Ok(syms) = std::env::var("ENGINE_SYMBOLS") {
        config.symbols = syms
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
    }
    info!(symbols = ?config.symbols, timeframes = ?config.timeframes, "Configured analysis");

    // ── 2. Market data ───────────────────────────────────────────────────
    let candles_path = std::env::var("ENGINE_CANDLES_FILE").unwrap_or_else(|_| "candles.json".to_string());
    let candles = load_candles_file(&candles_path).context("cannot start without market data")?;

    let buffer = Arc::new(CandleBuffer::new(MAX_CANDLES_PER_SERIES));
    let accepted = buffer.extend(candles);
    info!(accepted, series = buffer.keys().len(), "Candle buffer primed");

    // ── 3. Analysis ──────────────────────────────────────────────────────
    let engine = AnalysisEngine::builder(buffer, config)
        .store(Arc::new(InMemoryAnalysisStore::new()))
        .build();

    for report in engine.analyze_all().await {
        info!(
            symbol = %report.symbol,
            consensus = %report.signal_confirmation.signal,
            confidence = report.confidence,
            regime = %report.market_regime.kind,
            failed_timeframes = report.failures.len(),
            "Analysis complete"
        );
        let json = serde_json::to_string_pretty(&report).context("failed to serialise report")?;
        println!("{json}");
    }

    Ok(())
}
