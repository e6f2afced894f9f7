pub mod candle;
pub mod candle_buffer;

use anyhow::Result;
use async_trait::async_trait;

// Re-export the core market data types for convenient access
// (e.g. `use crate::market_data::Candle`).
pub use candle::{closes, validate_series, Candle, CandleKey, Timeframe};
pub use candle_buffer::{load_candles_file, CandleBuffer};

/// Market-data collaborator: supplies candle windows ordered oldest-first.
#[async_trait]
pub trait CandleSource: Send + Sync {
    async fn get_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>>;
}
