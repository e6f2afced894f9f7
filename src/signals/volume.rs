// =============================================================================
// Volume trend analysis
// =============================================================================
//
// Compares the mean volume of the last 5 candles with the mean of the whole
// window:
//   ratio        = recent / window
//   trend        = increasing | decreasing | neutral
//   significance = high (> 1.5x) | medium (> 1.2x) | low
//   score        = ratio * 0.7 + 0.3

use serde::{Deserialize, Serialize};

use crate::market_data::Candle;

const RECENT_CANDLES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeTrend {
    Increasing,
    Decreasing,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Significance {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeAnalysis {
    pub trend: VolumeTrend,
    pub significance: Significance,
    pub ratio: f64,
    pub score: f64,
}

impl Default for VolumeAnalysis {
    fn default() -> Self {
        Self {
            trend: VolumeTrend::Neutral,
            significance: Significance::Low,
            ratio: 1.0,
            score: 1.0,
        }
    }
}

impl VolumeAnalysis {
    pub fn analyze(candles: &[Candle]) -> Self {
        if candles.is_empty() {
            return Self::default();
        }

        let mean = |xs: &[Candle]| xs.iter().map(|c| c.volume).sum::<f64>() / xs.len() as f64;
        let window_avg = mean(candles);
        let recent_avg = mean(&candles[candles.len().saturating_sub(RECENT_CANDLES)..]);

        let trend = if recent_avg > window_avg {
            VolumeTrend::Increasing
        } else if recent_avg < window_avg {
            VolumeTrend::Decreasing
        } else {
            VolumeTrend::Neutral
        };

        let significance = if recent_avg > window_avg * 1.5 {
            Significance::High
        } else if recent_avg > window_avg * 1.2 {
            Significance::Medium
        } else {
            Significance::Low
        };

        let ratio = if window_avg > 0.0 { recent_avg / window_avg } else { 1.0 };

        Self {
            trend,
            significance,
            ratio,
            score: ratio * 0.7 + 0.3,
        }
    }

    /// Score mapped onto 0..=100 for the confidence blend: an average-volume
    /// window scores 50.
    pub fn blend_score(&self) -> f64 {
        (self.score * 50.0).clamp(0.0, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::Timeframe;
    use chrono::{Duration, TimeZone, Utc};

    fn with_volumes(volumes: &[f64]) -> Vec<Candle> {
        volumes
            .iter()
            .enumerate()
            .map(|(i, &volume)| Candle {
                symbol: "TEST".into(),
                timeframe: Timeframe::FiveMinutes,
                timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(5 * i as i64),
                open: 10.0,
                high: 11.0,
                low: 9.0,
                close: 10.0,
                volume,
            })
            .collect()
    }

    #[test]
    fn flat_volume_is_neutral() {
        let v = VolumeAnalysis::analyze(&with_volumes(&[100.0; 20]));
        assert_eq!(v.trend, VolumeTrend::Neutral);
        assert_eq!(v.significance, Significance::Low);
        assert!((v.score - 1.0).abs() < 1e-12);
        assert!((v.blend_score() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn volume_spike_is_high() {
        let mut vols = vec![100.0; 15];
        vols.extend([400.0; 5]);
        let v = VolumeAnalysis::analyze(&with_volumes(&vols));
        // window mean 175, recent 400 => ratio ~2.29
        assert_eq!(v.trend, VolumeTrend::Increasing);
        assert_eq!(v.significance, Significance::High);
    }

    #[test]
    fn moderate_rise_is_medium() {
        let mut vols = vec![100.0; 15];
        vols.extend([140.0; 5]);
        let v = VolumeAnalysis::analyze(&with_volumes(&vols));
        // window mean 110, recent 140 => ratio ~1.27
        assert_eq!(v.significance, Significance::Medium);
    }

    #[test]
    fn fading_volume_is_decreasing() {
        let mut vols = vec![100.0; 15];
        vols.extend([20.0; 5]);
        let v = VolumeAnalysis::analyze(&with_volumes(&vols));
        assert_eq!(v.trend, VolumeTrend::Decreasing);
        assert!(v.blend_score() < 50.0);
    }

    #[test]
    fn empty_window_defaults() {
        assert_eq!(VolumeAnalysis::analyze(&[]), VolumeAnalysis::default());
    }
}
