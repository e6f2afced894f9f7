// =============================================================================
// Binary-option signal
// =============================================================================
//
// Maps a synthesized signal onto a CALL / PUT call with an expiry derived from
// the chart timeframe.  HOLD signals fall back to the RSI bias:
//   RSI > 70  => PUT,  confidence min(80, 60 + (rsi - 70))
//   RSI < 30  => CALL, confidence min(80, 60 + (30 - rsi))
//   otherwise CALL at 50

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::indicators::rsi::{OVERBOUGHT, OVERSOLD};
use crate::market_data::Timeframe;
use crate::types::Recommendation;

use super::synthesizer::Signal;

pub const MIN_BINARY_CANDLES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BinaryDirection {
    Call,
    Put,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinarySignal {
    pub symbol: String,
    pub direction: BinaryDirection,
    pub confidence: u8,
    pub timeframe: Timeframe,
    pub expiry_minutes: u32,
    pub expires_at: DateTime<Utc>,
    pub reasoning: String,
}

/// Option expiry for a chart timeframe.  Timeframes above 4h use 5 minutes.
pub fn expiry_minutes(timeframe: Timeframe) -> u32 {
    match timeframe {
        Timeframe::OneMinute => 1,
        Timeframe::FiveMinutes => 5,
        Timeframe::FifteenMinutes => 15,
        Timeframe::OneHour => 60,
        Timeframe::FourHours => 240,
        _ => 5,
    }
}

impl BinarySignal {
    pub fn from_signal(signal: &Signal, candle_count: usize) -> EngineResult<Self> {
        if candle_count < MIN_BINARY_CANDLES {
            return Err(EngineError::InsufficientData {
                required: MIN_BINARY_CANDLES,
                available: candle_count,
            });
        }

        let (direction, confidence, reasoning) = match signal.recommendation {
            Recommendation::Buy => (BinaryDirection::Call, signal.confidence, signal.reasoning.clone()),
            Recommendation::Sell => (BinaryDirection::Put, signal.confidence, signal.reasoning.clone()),
            Recommendation::Hold => {
                let rsi = signal.indicators.as_ref().and_then(|i| i.rsi);
                match rsi {
                    Some(r) if r > OVERBOUGHT => (
                        BinaryDirection::Put,
                        (60.0 + (r - OVERBOUGHT)).min(80.0),
                        format!("RSI {r:.2} overbought"),
                    ),
                    Some(r) if r < OVERSOLD => (
                        BinaryDirection::Call,
                        (60.0 + (OVERSOLD - r)).min(80.0),
                        format!("RSI {r:.2} oversold"),
                    ),
                    _ => (BinaryDirection::Call, 50.0, "no directional bias".to_string()),
                }
            }
        };

        let expiry = expiry_minutes(signal.timeframe);
        Ok(Self {
            symbol: signal.symbol.clone(),
            direction,
            confidence: confidence.round().clamp(0.0, 100.0) as u8,
            timeframe: signal.timeframe,
            expiry_minutes: expiry,
            expires_at: signal.created_at + Duration::minutes(i64::from(expiry)),
            reasoning,
        })
    }
}
