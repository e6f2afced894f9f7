// =============================================================================
// Engine Errors
// =============================================================================
//
// Domain error taxonomy for the analysis engine.  Only `InvalidInput` and
// `InsufficientData` ever reach a caller directly; advisory and aggregate
// failures are recovered into degraded (neutral, low-confidence) outputs and
// exist here so they can be logged and attached to reasoning strings.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("insufficient data: need {required} candles, got {available}")]
    InsufficientData { required: usize, available: usize },

    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("advisory unavailable: {reason}")]
    AdvisoryUnavailable { reason: String },

    #[error("all {attempted} timeframe analyses failed")]
    AggregateFailure { attempted: usize },
}

impl EngineError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    pub fn advisory(reason: impl Into<String>) -> Self {
        Self::AdvisoryUnavailable {
            reason: reason.into(),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_descriptive() {
        let err = EngineError::InsufficientData {
            required: 20,
            available: 7,
        };
        assert_eq!(err.to_string(), "insufficient data: need 20 candles, got 7");

        let err = EngineError::invalid("entry price equals stop loss");
        assert_eq!(err.to_string(), "invalid input: entry price equals stop loss");
    }
}
