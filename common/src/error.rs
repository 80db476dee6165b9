//! Error types reported by participants.

use thiserror::Error;

use crate::ReservationState;

/// Domain error returned by a participant's Try, Confirm or Cancel step.
///
/// The coordinator never interprets these beyond phase bookkeeping; they are
/// handed back to the caller of `execute` verbatim or wrapped with the phase.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParticipantError {
    /// The account cannot cover the requested deduction.
    #[error("insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: String, available: String },

    /// Not enough stock to reserve the requested quantity.
    #[error("insufficient inventory: required {required}, available {available}")]
    InsufficientInventory { required: String, available: String },

    /// The step is not allowed from the participant's current state.
    #[error("cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: ReservationState,
    },

    /// The amount configured before Try was rejected.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// The execution context was cancelled or its deadline passed.
    #[error("context cancelled")]
    ContextCancelled,

    /// Any other domain failure, surfaced with its message unchanged.
    #[error("{0}")]
    Failed(String),
}

impl ParticipantError {
    /// Shorthand for [`ParticipantError::Failed`].
    pub fn failed(message: impl Into<String>) -> Self {
        ParticipantError::Failed(message.into())
    }

    /// Stable code for logs and reports.
    pub fn error_code(&self) -> &'static str {
        match self {
            ParticipantError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            ParticipantError::InsufficientInventory { .. } => "INSUFFICIENT_INVENTORY",
            ParticipantError::InvalidState { .. } => "INVALID_STATE",
            ParticipantError::InvalidAmount(_) => "INVALID_AMOUNT",
            ParticipantError::ContextCancelled => "CONTEXT_CANCELLED",
            ParticipantError::Failed(_) => "FAILED",
        }
    }
}

/// Result type for participant operations.
pub type ParticipantResult<T> = std::result::Result<T, ParticipantError>;
