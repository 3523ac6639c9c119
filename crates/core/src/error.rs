//! Forecasting error model.

use thiserror::Error;

/// Result type used across the forecasting pipeline.
pub type ForecastResult<T> = Result<T, ForecastError>;

/// Pipeline-level error surfaced to callers.
///
/// Network failures against the live provider are absent: the
/// fetcher recovers from them through its fallback chain and never raises.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ForecastError {
    /// No live reading, no buffered reading and no historical row for the city.
    #[error("no data available for city: {0}")]
    DataUnavailable(String),

    /// Historical rows exist but not enough to fill a forecast window.
    #[error("insufficient history for {city}: {available} rows, {required} required")]
    InsufficientHistory {
        city: String,
        available: usize,
        required: usize,
    },

    /// A model or normalization artifact was absent at first use.
    #[error("artifact missing: {0}")]
    ArtifactMissing(String),

    /// An artifact was present but could not be decoded or failed validation.
    #[error("invalid artifact: {0}")]
    ArtifactInvalid(String),

    /// Feature count disagreement between the transform and a vector.
    #[error("transform mismatch: expected {expected} columns, got {actual}")]
    TransformMismatch { expected: usize, actual: usize },

    /// The sequence model produced an unusable output.
    #[error("inference failed: {0}")]
    InferenceFailed(String),
}

impl ForecastError {
    pub fn data_unavailable(city: impl Into<String>) -> Self {
        Self::DataUnavailable(city.into())
    }

    pub fn insufficient_history(city: impl Into<String>, available: usize, required: usize) -> Self {
        Self::InsufficientHistory {
            city: city.into(),
            available,
            required,
        }
    }

    pub fn inference(msg: impl Into<String>) -> Self {
        Self::InferenceFailed(msg.into())
    }

    /// Errors the caller can correct by choosing different input (e.g. another city).
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::DataUnavailable(_) | Self::InsufficientHistory { .. })
    }

    /// Errors that will not go away for the lifetime of the process.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ArtifactMissing(_) | Self::ArtifactInvalid(_) | Self::TransformMismatch { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_is_disjoint() {
        let errors = [
            ForecastError::data_unavailable("Delhi"),
            ForecastError::insufficient_history("Delhi", 12, 30),
            ForecastError::ArtifactMissing("models/lstm_model.json".to_string()),
            ForecastError::ArtifactInvalid("bad json".to_string()),
            ForecastError::TransformMismatch { expected: 12, actual: 9 },
            ForecastError::inference("nan"),
        ];

        for e in &errors {
            assert!(!(e.is_client_error() && e.is_fatal()), "{e} classified twice");
        }
        assert!(errors[0].is_client_error());
        assert!(errors[1].is_client_error());
        assert!(errors[2].is_fatal());
        assert!(!errors[5].is_fatal() && !errors[5].is_client_error());
    }

    #[test]
    fn insufficient_history_message_names_counts() {
        let e = ForecastError::insufficient_history("Pune", 7, 30);
        assert_eq!(e.to_string(), "insufficient history for Pune: 7 rows, 30 required");
    }
}
