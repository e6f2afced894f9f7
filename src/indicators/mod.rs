// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free implementations of the technical indicators used by
// the analysis engine.  Every public function returns `Option<T>` so callers
// are forced to handle insufficient-data and numerical-edge-case scenarios.
// `IndicatorSet` bundles the latest value of each indicator for one candle
// series and is always recomputed wholesale from the window.

pub mod adx;
pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;
pub mod stochastic;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{EngineError, EngineResult};
use crate::market_data::{closes, validate_series, Candle, Timeframe};

pub use adx::AdxResult;
pub use bollinger::BollingerResult;
pub use macd::MacdResult;
pub use rsi::RsiZone;

/// Absolute minimum window for a full indicator request.
pub const MIN_CANDLES: usize = 20;

pub const RSI_PERIOD: usize = 14;
pub const BOLLINGER_PERIOD: usize = 20;
pub const BOLLINGER_STD: f64 = 2.0;
pub const STOCHASTIC_PERIOD: usize = 14;
pub const WILLIAMS_PERIOD: usize = 14;
pub const ADX_PERIOD: usize = 14;

/// Latest indicator values for one `(symbol, timeframe)` series.
///
/// Every indicator is independently optional: `None` means the window was too
/// short (or numerically degenerate) for that indicator, never zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSet {
    pub symbol: String,
    pub timeframe: Timeframe,
    /// Timestamp of the newest candle the set was computed from.
    pub as_of: DateTime<Utc>,
    pub last_close: f64,
    pub rsi: Option<f64>,
    pub macd: Option<MacdResult>,
    pub sma20: Option<f64>,
    pub sma50: Option<f64>,
    pub sma200: Option<f64>,
    pub ema20: Option<f64>,
    pub ema50: Option<f64>,
    pub bollinger: Option<BollingerResult>,
    pub stochastic: Option<f64>,
    pub williams_r: Option<f64>,
    pub adx: Option<AdxResult>,
}

impl IndicatorSet {
    /// Compute every indicator from an oldest-first candle window.
    ///
    /// Fails with `InsufficientData` below [`MIN_CANDLES`] and with
    /// `InvalidInput` when the window is not a single, time-ordered series.
    pub fn calculate(candles: &[Candle]) -> EngineResult<Self> {
        if candles.len() < MIN_CANDLES {
            return Err(EngineError::InsufficientData {
                required: MIN_CANDLES,
                available: candles.len(),
            });
        }
        validate_series(candles)?;

        let last = candles
            .last()
            .ok_or(EngineError::InsufficientData {
                required: MIN_CANDLES,
                available: 0,
            })?;
        let prices = closes(candles);

        let set = Self {
            symbol: last.symbol.clone(),
            timeframe: last.timeframe,
            as_of: last.timestamp,
            last_close: last.close,
            rsi: rsi::current_rsi(&prices, RSI_PERIOD).map(|(v, _)| v),
            macd: macd::calculate_macd(&prices),
            sma20: sma::calculate_sma(&prices, 20),
            sma50: sma::calculate_sma(&prices, 50),
            sma200: sma::calculate_sma(&prices, 200),
            ema20: ema::current_ema(&prices, 20),
            ema50: ema::current_ema(&prices, 50),
            bollinger: bollinger::calculate_bollinger(&prices, BOLLINGER_PERIOD, BOLLINGER_STD),
            stochastic: stochastic::calculate_stochastic(candles, STOCHASTIC_PERIOD),
            williams_r: stochastic::calculate_williams_r(candles, WILLIAMS_PERIOD),
            adx: adx::calculate_adx(candles, ADX_PERIOD),
        };

        trace!(
            symbol = %set.symbol,
            timeframe = %set.timeframe,
            available = set.available_count(),
            "indicator set computed"
        );
        Ok(set)
    }

    pub fn rsi_zone(&self) -> Option<RsiZone> {
        self.rsi.map(RsiZone::classify)
    }

    /// Number of indicators that produced a value.
    pub fn available_count(&self) -> usize {
        [
            self.rsi.is_some(),
            self.macd.is_some(),
            self.sma20.is_some(),
            self.sma50.is_some(),
            self.sma200.is_some(),
            self.ema20.is_some(),
            self.ema50.is_some(),
            self.bollinger.is_some(),
            self.stochastic.is_some(),
            self.williams_r.is_some(),
            self.adx.is_some(),
        ]
        .iter()
        .filter(|&&present| present)
        .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn rising(n: usize, start: f64) -> Vec<Candle> {
        (0..n)
            .map(|i| {
                let close = start + i as f64;
                Candle {
                    symbol: "BTCUSDT".into(),
                    timeframe: Timeframe::OneDay,
                    timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(i as i64),
                    open: close - 0.5,
                    high: close + 0.5,
                    low: close - 1.0,
                    close,
                    volume: 1_000.0,
                }
            })
            .collect()
    }

    #[test]
    fn rejects_short_windows() {
        let err = IndicatorSet::calculate(&rising(19, 100.0)).unwrap_err();
        assert_eq!(
            err,
            EngineError::InsufficientData {
                required: 20,
                available: 19
            }
        );
    }

    #[test]
    fn rejects_unordered_windows() {
        let mut candles = rising(25, 100.0);
        candles.swap(3, 4);
        assert!(matches!(
            IndicatorSet::calculate(&candles),
            Err(EngineError::InvalidInput { .. })
        ));
    }

    #[test]
    fn twenty_rising_closes() {
        // Closes 100..=119.
        let set = IndicatorSet::calculate(&rising(20, 100.0)).unwrap();
        assert!((set.rsi.unwrap() - 100.0).abs() < 1e-10);
        assert!((set.sma20.unwrap() - 109.5).abs() < 1e-10);
        assert_eq!(set.rsi_zone(), Some(RsiZone::Overbought));
        assert!(set.bollinger.is_some());
        assert!(set.stochastic.is_some());

        // Too short for the long look-backs: absent, never zero.
        assert!(set.sma50.is_none());
        assert!(set.sma200.is_none());
        assert!(set.macd.is_none());
        assert!(set.adx.is_none());
        assert_eq!(set.last_close, 119.0);
    }

    #[test]
    fn long_window_fills_everything() {
        let set = IndicatorSet::calculate(&rising(220, 100.0)).unwrap();
        assert_eq!(set.available_count(), 11);
        assert!(set.sma200.unwrap() < set.sma50.unwrap());
        assert!(set.macd.unwrap().macd > 0.0);
    }
}
