//! Error types returned by the coordinator.

use tcc_common::{ParticipantError, Phase};
use thiserror::Error;

/// Error returned from [`Coordinator::execute`](crate::Coordinator::execute).
///
/// Always describes the first failure that aborted the transaction. Cancel
/// failures during compensation never show up here; they are delivered to
/// the configured [`CompensationObserver`](crate::CompensationObserver) and
/// in the [`CompensationReport`](crate::CompensationReport).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TccError {
    /// A participant's Try failed. The participant error is surfaced as is.
    #[error("{error}")]
    TryFailed {
        /// Position of the participant in the transaction.
        index: usize,
        error: ParticipantError,
    },

    /// A participant's Confirm failed after every Try succeeded.
    #[error("confirm phase failed, rolled back: {source}")]
    ConfirmFailed {
        /// Position of the participant in the transaction.
        index: usize,
        source: ParticipantError,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    InvalidConfig(String),
}

impl TccError {
    /// Phase in which the transaction was aborted.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            TccError::TryFailed { .. } => Some(Phase::Try),
            TccError::ConfirmFailed { .. } => Some(Phase::Confirm),
            TccError::InvalidConfig(_) => None,
        }
    }

    /// Position of the failing participant.
    pub fn participant_index(&self) -> Option<usize> {
        match self {
            TccError::TryFailed { index, .. } | TccError::ConfirmFailed { index, .. } => {
                Some(*index)
            }
            TccError::InvalidConfig(_) => None,
        }
    }

    /// The participant's own error, if the failure came from one.
    pub fn participant_error(&self) -> Option<&ParticipantError> {
        match self {
            TccError::TryFailed { error, .. } => Some(error),
            TccError::ConfirmFailed { source, .. } => Some(source),
            TccError::InvalidConfig(_) => None,
        }
    }

    /// Get error code for reports.
    pub fn error_code(&self) -> &'static str {
        match self {
            TccError::TryFailed { .. } => "TRY_FAILED",
            TccError::ConfirmFailed { .. } => "CONFIRM_FAILED",
            TccError::InvalidConfig(_) => "CONFIGURATION_ERROR",
        }
    }
}

/// Result type alias for coordinator operations.
pub type Result<T> = std::result::Result<T, TccError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_try_failure_is_unwrapped() {
        let err = TccError::TryFailed {
            index: 0,
            error: ParticipantError::failed("insufficient balance"),
        };
        assert_eq!(err.to_string(), "insufficient balance");
        assert_eq!(err.phase(), Some(Phase::Try));
        assert!(err.source().is_none());
    }

    #[test]
    fn test_confirm_failure_is_wrapped() {
        let err = TccError::ConfirmFailed {
            index: 2,
            source: ParticipantError::failed("order confirm failed"),
        };
        assert_eq!(
            err.to_string(),
            "confirm phase failed, rolled back: order confirm failed"
        );
        assert_eq!(err.participant_index(), Some(2));
        assert_eq!(
            err.source().map(|s| s.to_string()),
            Some("order confirm failed".to_string())
        );
    }

    #[test]
    fn test_config_error_has_no_phase() {
        let err = TccError::InvalidConfig("bad".into());
        assert!(err.phase().is_none());
        assert!(err.participant_error().is_none());
        assert_eq!(err.error_code(), "CONFIGURATION_ERROR");
        assert_eq!(err.to_string(), "configuration error: bad");
    }
}
