// =============================================================================
// Candle & Timeframe primitives
// =============================================================================

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

// ---------------------------------------------------------------------------
// Timeframe
// ---------------------------------------------------------------------------

/// Chart interval. Each timeframe carries a fixed consensus weight; longer
/// timeframes weigh more.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "4h")]
    FourHours,
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "1w")]
    OneWeek,
    #[serde(rename = "1M")]
    OneMonth,
}

impl Timeframe {
    /// All supported timeframes, shortest first.
    pub const ALL: [Timeframe; 8] = [
        Self::OneMinute,
        Self::FiveMinutes,
        Self::FifteenMinutes,
        Self::OneHour,
        Self::FourHours,
        Self::OneDay,
        Self::OneWeek,
        Self::OneMonth,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::OneMinute => "1m",
            Self::FiveMinutes => "5m",
            Self::FifteenMinutes => "15m",
            Self::OneHour => "1h",
            Self::FourHours => "4h",
            Self::OneDay => "1d",
            Self::OneWeek => "1w",
            Self::OneMonth => "1M",
        }
    }

    /// Static consensus weight.
    pub fn weight(self) -> f64 {
        match self {
            Self::OneMinute => 0.3,
            Self::FiveMinutes => 0.4,
            Self::FifteenMinutes => 0.5,
            Self::OneHour => 0.6,
            Self::FourHours => 0.7,
            Self::OneDay => 0.8,
            Self::OneWeek => 0.9,
            Self::OneMonth => 1.0,
        }
    }

    /// Nominal bar length in minutes (a month counts as 30 days).
    pub fn minutes(self) -> u64 {
        match self {
            Self::OneMinute => 1,
            Self::FiveMinutes => 5,
            Self::FifteenMinutes => 15,
            Self::OneHour => 60,
            Self::FourHours => 240,
            Self::OneDay => 1_440,
            Self::OneWeek => 10_080,
            Self::OneMonth => 43_200,
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = EngineError;

    // Case-sensitive: "1m" is a minute, "1M" is a month.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|tf| tf.as_str() == s.trim())
            .ok_or_else(|| EngineError::invalid(format!("unknown timeframe '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// Candle
// ---------------------------------------------------------------------------

/// A single OHLCV bar. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    pub fn upper_shadow(&self) -> f64 {
        self.high - self.open.max(self.close)
    }

    pub fn lower_shadow(&self) -> f64 {
        self.open.min(self.close) - self.low
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    pub fn key(&self) -> CandleKey {
        CandleKey::new(self.symbol.clone(), self.timeframe)
    }
}

/// Composite key that identifies a unique candle series.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct CandleKey {
    pub symbol: String,
    pub timeframe: Timeframe,
}

impl CandleKey {
    pub fn new(symbol: impl Into<String>, timeframe: Timeframe) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
        }
    }
}

impl std::fmt::Display for CandleKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.symbol, self.timeframe)
    }
}

/// Extract closing prices (oldest first).
pub fn closes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close).collect()
}

/// Check that a window belongs to a single series, is strictly increasing in
/// time and carries finite, internally consistent prices.
pub fn validate_series(candles: &[Candle]) -> EngineResult<()> {
    let Some(first) = candles.first() else {
        return Ok(());
    };

    for (i, c) in candles.iter().enumerate() {
        if c.symbol != first.symbol || c.timeframe != first.timeframe {
            return Err(EngineError::invalid(format!(
                "candle {i} belongs to {} but window is {}",
                c.key(),
                first.key()
            )));
        }
        let prices = [c.open, c.high, c.low, c.close, c.volume];
        if prices.iter().any(|p| !p.is_finite()) {
            return Err(EngineError::invalid(format!("candle {i} has non-finite values")));
        }
        if c.high < c.low {
            return Err(EngineError::invalid(format!("candle {i} has high below low")));
        }
        if i > 0 && c.timestamp <= candles[i - 1].timestamp {
            return Err(EngineError::invalid(format!(
                "candle {i} timestamp {} is not after {}",
                c.timestamp,
                candles[i - 1].timestamp
            )));
        }
    }
    Ok(())
}
