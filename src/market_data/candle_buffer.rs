use std::collections::{HashMap, VecDeque};
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use super::candle::{Candle, CandleKey, Timeframe};
use super::CandleSource;

// ---------------------------------------------------------------------------
// CandleBuffer -- thread-safe ring buffer per (symbol, timeframe)
// ---------------------------------------------------------------------------

/// Thread-safe ring-buffer that stores the most recent candles per
/// `(symbol, timeframe)` pair.  Candles are immutable once recorded: a candle
/// whose timestamp is not strictly after the newest stored one is rejected.
/// The ring is trimmed to `max_candles`.
pub struct CandleBuffer {
    buffers: RwLock<HashMap<CandleKey, VecDeque<Candle>>>,
    max_candles: usize,
}

impl CandleBuffer {
    /// Create a new buffer that retains at most `max_candles` candles per key.
    pub fn new(max_candles: usize) -> Self {
        Self {
            buffers: RwLock::new(HashMap::new()),
            max_candles: max_candles.max(1),
        }
    }

    /// Append a candle to its series.
    ///
    /// Returns `false` (and leaves the series untouched) when the candle is
    /// not newer than the last recorded candle for the same key.
    pub fn record(&self, candle: Candle) -> bool {
        let key = candle.key();
        let mut map = self.buffers.write();
        let ring = map
            .entry(key.clone())
            .or_insert_with(|| VecDeque::with_capacity(self.max_candles));

        if let Some(last) = ring.back() {
            if candle.timestamp <= last.timestamp {
                warn!(
                    key = %key,
                    incoming = %candle.timestamp,
                    last = %last.timestamp,
                    "rejecting out-of-order candle"
                );
                return false;
            }
        }

        ring.push_back(candle);
        // Trim oldest to stay within budget.
        while ring.len() > self.max_candles {
            ring.pop_front();
        }
        true
    }

    /// Record many candles, returning how many were accepted.
    pub fn extend(&self, candles: impl IntoIterator<Item = Candle>) -> usize {
        candles.into_iter().filter(|c| self.record(c.clone())).count()
    }

    /// Return the most recent `count` candles (oldest-first order).
    pub fn get_window(&self, key: &CandleKey, count: usize) -> Vec<Candle> {
        let map = self.buffers.read();
        match map.get(key) {
            Some(ring) => {
                let start = ring.len().saturating_sub(count);
                ring.iter().skip(start).cloned().collect()
            }
            None => Vec::new(),
        }
    }

    /// Return the most recent `count` close prices (oldest-first order).
    pub fn get_closes(&self, key: &CandleKey, count: usize) -> Vec<f64> {
        self.get_window(key, count).iter().map(|c| c.close).collect()
    }

    /// Return the close price of the most recent candle, if any.
    pub fn last_close(&self, key: &CandleKey) -> Option<f64> {
        let map = self.buffers.read();
        map.get(key).and_then(|ring| ring.back().map(|c| c.close))
    }

    /// Number of candles stored for a key.
    pub fn count(&self, key: &CandleKey) -> usize {
        let map = self.buffers.read();
        map.get(key).map_or(0, VecDeque::len)
    }

    /// All keys currently holding data.
    pub fn keys(&self) -> Vec<CandleKey> {
        self.buffers.read().keys().cloned().collect()
    }
}

#[async_trait]
impl CandleSource for CandleBuffer {
    async fn get_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>> {
        let key = CandleKey::new(symbol, timeframe);
        let window = self.get_window(&key, limit);
        debug!(key = %key, returned = window.len(), limit, "candle window served");
        Ok(window)
    }
}

// ---------------------------------------------------------------------------
// File loading
// ---------------------------------------------------------------------------

/// Load a JSON array of candles from disk.
///
/// The candles are sorted oldest-first per series before being returned so
/// the result can be fed straight into [`CandleBuffer::extend`].
pub fn load_candles_file(path: impl AsRef<Path>) -> Result<Vec<Candle>> {
    let path = path.as_ref();

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read candles from {}", path.display()))?;

    let mut candles: Vec<Candle> = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse candles from {}", path.display()))?;

    candles.sort_by(|a, b| {
        (a.symbol.as_str(), a.timeframe, a.timestamp).cmp(&(b.symbol.as_str(), b.timeframe, b.timestamp))
    });

    info!(path = %path.display(), count = candles.len(), "candles loaded");
    Ok(candles)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn sample_candle(symbol: &str, tf: Timeframe, minute: i64, close: f64) -> Candle {
        Candle {
            symbol: symbol.to_string(),
            timeframe: tf,
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap() + Duration::minutes(minute),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 100.0,
        }
    }

    #[test]
    fn ring_buffer_trimming() {
        let buf = CandleBuffer::new(3);
        let key = CandleKey::new("BTCUSDT", Timeframe::OneMinute);

        for i in 0..5 {
            buf.record(sample_candle("BTCUSDT", Timeframe::OneMinute, i, 100.0 + i as f64));
        }

        assert_eq!(buf.count(&key), 3);
        let closes = buf.get_closes(&key, 10);
        assert_eq!(closes, vec![102.0, 103.0, 104.0]);
    }

    #[test]
    fn rejects_stale_and_duplicate_timestamps() {
        let buf = CandleBuffer::new(10);
        let key = CandleKey::new("ETHUSDT", Timeframe::FiveMinutes);

        assert!(buf.record(sample_candle("ETHUSDT", Timeframe::FiveMinutes, 5, 50.0)));
        assert!(!buf.record(sample_candle("ETHUSDT", Timeframe::FiveMinutes, 5, 51.0)));
        assert!(!buf.record(sample_candle("ETHUSDT", Timeframe::FiveMinutes, 0, 49.0)));
        assert_eq!(buf.count(&key), 1);
        assert_eq!(buf.last_close(&key), Some(50.0));
    }

    #[test]
    fn series_are_isolated_per_key() {
        let buf = CandleBuffer::new(10);
        let accepted = buf.extend(vec![
            sample_candle("BTCUSDT", Timeframe::OneMinute, 0, 1.0),
            sample_candle("BTCUSDT", Timeframe::OneHour, 0, 2.0),
            sample_candle("ETHUSDT", Timeframe::OneMinute, 0, 3.0),
        ]);
        assert_eq!(accepted, 3);
        assert_eq!(buf.keys().len(), 3);
        assert_eq!(
            buf.get_closes(&CandleKey::new("BTCUSDT", Timeframe::OneHour), 5),
            vec![2.0]
        );
    }

    #[test]
    fn last_close_empty_returns_none() {
        let buf = CandleBuffer::new(10);
        let key = CandleKey::new("XYZUSDT", Timeframe::OneHour);
        assert_eq!(buf.last_close(&key), None);
    }

    #[tokio::test]
    async fn serves_as_candle_source() {
        let buf = CandleBuffer::new(50);
        for i in 0..30 {
            buf.record(sample_candle("BTCUSDT", Timeframe::OneMinute, i, i as f64));
        }
        let window = buf.get_candles("BTCUSDT", Timeframe::OneMinute, 10).await.unwrap();
        assert_eq!(window.len(), 10);
        assert_eq!(window.first().map(|c| c.close), Some(20.0));
        assert_eq!(window.last().map(|c| c.close), Some(29.0));
    }

    #[test]
    fn load_candles_file_sorts_oldest_first() {
        let dir = std::env::temp_dir().join(format!("aurora-candles-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("candles.json");
        let candles = vec![
            sample_candle("BTCUSDT", Timeframe::OneMinute, 2, 3.0),
            sample_candle("BTCUSDT", Timeframe::OneMinute, 0, 1.0),
            sample_candle("BTCUSDT", Timeframe::OneMinute, 1, 2.0),
        ];
        std::fs::write(&path, serde_json::to_string(&candles).unwrap()).unwrap();

        let loaded = load_candles_file(&path).unwrap();
        let closes: Vec<f64> = loaded.iter().map(|c| c.close).collect();
        assert_eq!(closes, vec![1.0, 2.0, 3.0]);

        std::fs::remove_dir_all(&dir).ok();
    }
}
