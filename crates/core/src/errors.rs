use thiserror::Error;

use crate::domain::adjustment::AdjustmentStatus;

/// Caller-correctable input failures. Always reported before any mutation
/// and never retried automatically.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid timeline: {reason}")]
    InvalidTimeline { reason: String },
    #[error("expected exactly {expected} prices, got {actual}")]
    WrongPriceCount { expected: usize, actual: usize },
    #[error("invalid formula input at index {index}: {reason}")]
    InvalidFormulaInput { index: usize, reason: String },
    #[error("unknown pricing formula `{formula_id}`")]
    UnknownFormula { formula_id: String },
    #[error("invalid index entry field `{field}`: {reason}")]
    InvalidIndexEntry { field: String, reason: String },
    #[error("invalid adjustment field `{field}`: {reason}")]
    InvalidAdjustment { field: String, reason: String },
}

/// The operation is no longer valid given current state. The caller must
/// re-fetch and decide, not retry blindly.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConflictError {
    #[error("adjustment `{adjustment_id}` is {status} and can no longer change")]
    AlreadyApplied { adjustment_id: String, status: AdjustmentStatus },
    #[error("adjustment `{adjustment_id}` is stale: {reason}")]
    StaleAdjustment { adjustment_id: String, reason: String },
}

/// Umbrella error for engine operations crossing persistence.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Conflict(#[from] ConflictError),
    #[error("adjustment `{adjustment_id}` not found")]
    NotFound { adjustment_id: String },
    #[error("apply failed and was rolled back: {reason}")]
    ApplyFailed { reason: String },
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl EngineError {
    /// Mutation failures roll back fully and may be retried; validation and
    /// conflict outcomes are final for the given input.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::ApplyFailed { .. } | Self::Persistence(_))
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::adjustment::AdjustmentStatus;

    use super::{ConflictError, EngineError, ValidationError};

    #[test]
    fn validation_errors_are_not_retriable() {
        let error = EngineError::from(ValidationError::WrongPriceCount { expected: 3, actual: 2 });
        assert!(!error.is_retriable());
    }

    #[test]
    fn conflict_errors_are_not_retriable() {
        let error = EngineError::from(ConflictError::AlreadyApplied {
            adjustment_id: "adj-1".to_string(),
            status: AdjustmentStatus::Applied,
        });
        assert!(!error.is_retriable());
    }

    #[test]
    fn apply_failures_are_retriable() {
        let error = EngineError::ApplyFailed { reason: "database lock timeout".to_string() };
        assert!(error.is_retriable());
    }

    #[test]
    fn formula_input_error_names_the_offending_index() {
        let error = ValidationError::InvalidFormulaInput {
            index: 1,
            reason: "price must be positive, got -10".to_string(),
        };
        assert!(error.to_string().contains("index 1"));
    }
}
