//! Transaction outcome definitions.

use serde::Serialize;

use tcc_common::Phase;

/// How an `execute` call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    /// Every participant confirmed.
    Committed,
    /// A Try failed; every participant was compensated.
    AbortedInTry,
    /// A Confirm failed; every participant was compensated.
    AbortedInConfirm,
}

impl Outcome {
    /// Check if the transaction committed.
    pub fn is_committed(&self) -> bool {
        matches!(self, Outcome::Committed)
    }

    /// Phase whose failure aborted the transaction.
    pub fn failed_phase(&self) -> Option<Phase> {
        match self {
            Outcome::Committed => None,
            Outcome::AbortedInTry => Some(Phase::Try),
            Outcome::AbortedInConfirm => Some(Phase::Confirm),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_phase() {
        assert!(Outcome::Committed.is_committed());
        assert_eq!(Outcome::AbortedInTry.failed_phase(), Some(Phase::Try));
        assert_eq!(Outcome::AbortedInConfirm.failed_phase(), Some(Phase::Confirm));
    }
}
