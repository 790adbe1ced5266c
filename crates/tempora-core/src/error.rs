//! Error types for series storage, cleaning, statistics and forecasting.

use crate::series::Timestamp;
use thiserror::Error;

/// Result type for tempora operations.
pub type Result<T> = std::result::Result<T, TemporaError>;

/// Error types for tempora operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TemporaError {
    #[error("Out of order timestamp: {timestamp} is not after last timestamp {last}")]
    OutOfOrder { timestamp: Timestamp, last: Timestamp },

    #[error("Duplicate timestamp: {0}")]
    DuplicateTimestamp(Timestamp),

    #[error("No observation at timestamp {0}")]
    NotFound(Timestamp),

    #[error("Insufficient data: need at least {needed} observations, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("Insufficient history: need at least {needed} observations, got {got}")]
    InsufficientHistory { needed: usize, got: usize },

    #[error("Parameter search did not converge within {iterations} iterations")]
    NonConvergence { iterations: usize },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid parameter '{param}' = '{value}': {reason}")]
    InvalidParameter {
        param: String,
        value: String,
        reason: String,
    },
}

/// Broad classification of an error, used by callers to pick a recovery path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input rejected at the boundary (ordering, duplicates, values).
    Validation,
    /// Exact lookup found nothing.
    Lookup,
    /// Not enough data yet; recoverable by waiting or shrinking windows.
    Insufficiency,
    /// A numerical procedure failed; recoverable by substituting a fallback method.
    Computation,
    /// A configuration value is out of range.
    Configuration,
}

impl TemporaError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TemporaError::OutOfOrder { .. }
            | TemporaError::DuplicateTimestamp(_)
            | TemporaError::InvalidInput(_) => ErrorKind::Validation,
            TemporaError::NotFound(_) => ErrorKind::Lookup,
            TemporaError::InsufficientData { .. } | TemporaError::InsufficientHistory { .. } => {
                ErrorKind::Insufficiency
            }
            TemporaError::NonConvergence { .. } => ErrorKind::Computation,
            TemporaError::InvalidParameter { .. } => ErrorKind::Configuration,
        }
    }

    /// Whether the caller can recover by supplying more data.
    pub fn is_insufficiency(&self) -> bool {
        self.kind() == ErrorKind::Insufficiency
    }

    pub(crate) fn invalid_parameter(
        param: &str,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        TemporaError::InvalidParameter {
            param: param.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}
