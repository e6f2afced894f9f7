// =============================================================================
// Shared types used across the Aurora analysis engine
// =============================================================================

use serde::{Deserialize, Serialize};

/// Final trade recommendation emitted by the synthesizer and the consensus.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Recommendation {
    Buy,
    Sell,
    #[default]
    Hold,
}

impl Recommendation {
    /// +1.0 for BUY, -1.0 for SELL, 0.0 for HOLD.
    pub fn direction(self) -> f64 {
        match self {
            Self::Buy => 1.0,
            Self::Sell => -1.0,
            Self::Hold => 0.0,
        }
    }

    /// Map a signed score onto a recommendation. Anything inside
    /// `[-threshold, threshold]` is a HOLD.
    pub fn from_score(score: f64, threshold: f64) -> Self {
        if score > threshold {
            Self::Buy
        } else if score < -threshold {
            Self::Sell
        } else {
            Self::Hold
        }
    }

    pub fn sentiment(self) -> Sentiment {
        match self {
            Self::Buy => Sentiment::Bullish,
            Self::Sell => Sentiment::Bearish,
            Self::Hold => Sentiment::Neutral,
        }
    }
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
            Self::Hold => write!(f, "HOLD"),
        }
    }
}

/// Directional market sentiment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Sentiment {
    Bullish,
    Bearish,
    #[default]
    Neutral,
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bullish => write!(f, "BULLISH"),
            Self::Bearish => write!(f, "BEARISH"),
            Self::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// Risk classification derived from volatility.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl RiskLevel {
    /// Volatility above 40% is HIGH, below 20% is LOW, anything else MEDIUM.
    /// Unknown volatility maps to MEDIUM.
    pub fn from_volatility(volatility: Option<f64>) -> Self {
        match volatility {
            Some(v) if v > 40.0 => Self::High,
            Some(v) if v < 20.0 => Self::Low,
            _ => Self::Medium,
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_level_thresholds() {
        assert_eq!(RiskLevel::from_volatility(Some(45.0)), RiskLevel::High);
        assert_eq!(RiskLevel::from_volatility(Some(40.0)), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_volatility(Some(20.0)), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_volatility(Some(19.9)), RiskLevel::Low);
        assert_eq!(RiskLevel::from_volatility(None), RiskLevel::Medium);
    }

    #[test]
    fn recommendation_from_score() {
        assert_eq!(Recommendation::from_score(0.3, 0.15), Recommendation::Buy);
        assert_eq!(Recommendation::from_score(-0.3, 0.15), Recommendation::Sell);
        assert_eq!(Recommendation::from_score(0.15, 0.15), Recommendation::Hold);
    }

    #[test]
    fn serialises_upper_case() {
        let json = serde_json::to_string(&Recommendation::Buy).unwrap();
        assert_eq!(json, "\"BUY\"");
        let s: Sentiment = serde_json::from_str("\"BEARISH\"").unwrap();
        assert_eq!(s, Sentiment::Bearish);
        assert_eq!(format!("{}", RiskLevel::High), "HIGH");
    }

    #[test]
    fn defaults_are_neutral() {
        assert_eq!(Recommendation::default(), Recommendation::Hold);
        assert_eq!(Sentiment::default(), Sentiment::Neutral);
        assert_eq!(RiskLevel::default(), RiskLevel::Medium);
    }
}
