// =============================================================================
// Engine Configuration: JSON settings with atomic save
// =============================================================================
//
// Every tunable of the analysis engine lives here: watched symbols and
// timeframes, freshness windows, collaborator timeouts, risk limits and the
// confidence blend.
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash.  All fields carry `#[serde(default)]` so that adding new fields
// never breaks loading an older config file.
//
// =============================================================================

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::market_data::Timeframe;
use crate::risk::RiskEngine;
use crate::signals::{ConfidenceWeights, FreshnessWindows};

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_symbols() -> Vec<String> {
    vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()]
}

fn default_timeframes() -> Vec<Timeframe> {
    vec![
        Timeframe::FiveMinutes,
        Timeframe::FifteenMinutes,
        Timeframe::OneHour,
        Timeframe::FourHours,
        Timeframe::OneDay,
    ]
}

fn default_candle_limit() -> usize {
    200
}

fn default_market_data_secs() -> u64 {
    5 * 60
}

fn default_indicators_secs() -> u64 {
    15 * 60
}

fn default_analysis_secs() -> u64 {
    30 * 60
}

fn default_advisory_timeout_ms() -> u64 {
    10_000
}

fn default_candle_fetch_timeout_ms() -> u64 {
    5_000
}

fn default_entry_threshold() -> f64 {
    0.15
}

fn default_min_risk_reward() -> f64 {
    1.5
}

fn default_max_risk_pct() -> f64 {
    2.0
}

fn default_stop_atr_multiplier() -> f64 {
    2.0
}

fn default_target_atr_multiplier() -> f64 {
    3.0
}

// =============================================================================
// FreshnessParams
// =============================================================================

/// Cache freshness windows, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreshnessParams {
    #[serde(default = "default_market_data_secs")]
    pub market_data_secs: u64,

    #[serde(default = "default_indicators_secs")]
    pub indicators_secs: u64,

    #[serde(default = "default_analysis_secs")]
    pub analysis_secs: u64,
}

impl Default for FreshnessParams {
    fn default() -> Self {
        Self {
            market_data_secs: default_market_data_secs(),
            indicators_secs: default_indicators_secs(),
            analysis_secs: default_analysis_secs(),
        }
    }
}

impl FreshnessParams {
    pub fn windows(&self) -> FreshnessWindows {
        FreshnessWindows {
            market_data: Duration::from_secs(self.market_data_secs),
            indicators: Duration::from_secs(self.indicators_secs),
            analysis: Duration::from_secs(self.analysis_secs),
        }
    }
}

// =============================================================================
// RiskParams
// =============================================================================

/// Trade-validation limits and ATR multipliers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskParams {
    /// Minimum acceptable reward/risk ratio.
    #[serde(default = "default_min_risk_reward")]
    pub min_risk_reward: f64,

    /// Maximum risk per trade as a percentage of the account.
    #[serde(default = "default_max_risk_pct")]
    pub max_risk_pct: f64,

    #[serde(default = "default_stop_atr_multiplier")]
    pub stop_atr_multiplier: f64,

    #[serde(default = "default_target_atr_multiplier")]
    pub target_atr_multiplier: f64,
}

impl Default for RiskParams {
    fn default() -> Self {
        Self {
            min_risk_reward: default_min_risk_reward(),
            max_risk_pct: default_max_risk_pct(),
            stop_atr_multiplier: default_stop_atr_multiplier(),
            target_atr_multiplier: default_target_atr_multiplier(),
        }
    }
}

impl RiskParams {
    pub fn engine(&self) -> RiskEngine {
        RiskEngine::new(
            self.min_risk_reward,
            self.max_risk_pct,
            self.stop_atr_multiplier,
            self.target_atr_multiplier,
        )
    }
}

// =============================================================================
// EngineConfig
// =============================================================================

/// Top-level configuration for the analysis engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    // --- Coverage -------------------------------------------------------------

    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,

    /// Timeframes analysed for every symbol.
    #[serde(default = "default_timeframes")]
    pub timeframes: Vec<Timeframe>,

    /// Candles requested per (symbol, timeframe).
    #[serde(default = "default_candle_limit")]
    pub candle_limit: usize,

    // --- Caching & timeouts ---------------------------------------------------

    #[serde(default)]
    pub freshness: FreshnessParams,

    #[serde(default = "default_advisory_timeout_ms")]
    pub advisory_timeout_ms: u64,

    #[serde(default = "default_candle_fetch_timeout_ms")]
    pub candle_fetch_timeout_ms: u64,

    // --- Scoring & risk -------------------------------------------------------

    /// Minimum absolute weighted indicator score for a directional lean.
    #[serde(default = "default_entry_threshold")]
    pub entry_threshold: f64,

    #[serde(default)]
    pub confidence_weights: ConfidenceWeights,

    #[serde(default)]
    pub risk: RiskParams,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            symbols: default_symbols(),
            timeframes: default_timeframes(),
            candle_limit: default_candle_limit(),
            freshness: FreshnessParams::default(),
            advisory_timeout_ms: default_advisory_timeout_ms(),
            candle_fetch_timeout_ms: default_candle_fetch_timeout_ms(),
            entry_threshold: default_entry_threshold(),
            confidence_weights: ConfidenceWeights::default(),
            risk: RiskParams::default(),
        }
    }
}

impl EngineConfig {
    pub fn advisory_timeout(&self) -> Duration {
        Duration::from_millis(self.advisory_timeout_ms)
    }

    pub fn candle_fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.candle_fetch_timeout_ms)
    }

    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read engine config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse engine config from {}", path.display()))?;

        info!(
            path = %path.display(),
            symbols = ?config.symbols,
            timeframes = config.timeframes.len(),
            "engine config loaded"
        );

        Ok(config)
    }

    /// Persist the configuration to `path` using an atomic write (write to
    /// `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self).context("failed to serialise engine config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "engine config saved (atomic)");
        Ok(())
    }
}
