//! Protocol phases and the per-participant reservation lifecycle.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{ExecutionId, ParticipantError, ParticipantResult};

/// Phase of the TCC protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    /// Provisional reservation on every participant.
    Try,
    /// Making reservations permanent.
    Confirm,
    /// Compensation after a failed Try or Confirm.
    Cancel,
}

impl Phase {
    /// Lowercase name used in log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Try => "try",
            Phase::Confirm => "confirm",
            Phase::Cancel => "cancel",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a single participant stands within one transaction.
///
/// The coordinator never reads or stores this. Participants keep it as
/// local bookkeeping so that Cancel is well defined in every state the
/// protocol can reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationState {
    /// Nothing reserved yet.
    Pending,
    /// Resources provisionally reserved (frozen).
    Tried,
    /// Reservation made permanent.
    Confirmed,
    /// Reservation reversed.
    Canceled,
}

impl ReservationState {
    /// Get valid next states from current state.
    ///
    /// `Confirmed -> Canceled` exists because the Confirm-failure path
    /// compensates participants that already confirmed. The edges back to
    /// `Pending` prepare a participant for its next transaction.
    pub fn valid_transitions(&self) -> &[ReservationState] {
        match self {
            ReservationState::Pending => &[ReservationState::Tried],
            ReservationState::Tried => {
                &[ReservationState::Confirmed, ReservationState::Canceled]
            }
            ReservationState::Confirmed => {
                &[ReservationState::Canceled, ReservationState::Pending]
            }
            ReservationState::Canceled => &[ReservationState::Pending],
        }
    }

    /// Check if transition to given state is valid.
    pub fn can_transition_to(&self, next: ReservationState) -> bool {
        self.valid_transitions().contains(&next)
    }
}

impl fmt::Display for ReservationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReservationState::Pending => "pending",
            ReservationState::Tried => "tried",
            ReservationState::Confirmed => "confirmed",
            ReservationState::Canceled => "canceled",
        };
        f.write_str(s)
    }
}

/// A participant's reservation and the execution that made it.
///
/// Every state change goes through [`ReservationState::can_transition_to`].
/// Cancel only reverses work done under the same [`ExecutionId`], so a
/// rejected Try from one execution never undoes another execution's
/// reservation or commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    state: ReservationState,
    holder: Option<ExecutionId>,
}

impl Reservation {
    /// Nothing reserved, no holder.
    pub fn new() -> Self {
        Self {
            state: ReservationState::Pending,
            holder: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ReservationState {
        self.state
    }

    /// Execution whose Try created the current reservation.
    pub fn holder(&self) -> Option<ExecutionId> {
        self.holder
    }

    /// Fail with [`ParticipantError::InvalidState`] unless `next` is
    /// reachable from the current state.
    pub fn ensure(&self, operation: &'static str, next: ReservationState) -> ParticipantResult<()> {
        if self.state.can_transition_to(next) {
            Ok(())
        } else {
            Err(ParticipantError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    /// Make the participant available for a new transaction.
    ///
    /// Rejected while a Try is still outstanding.
    pub fn reset(&mut self) -> ParticipantResult<()> {
        if self.state != ReservationState::Pending {
            self.ensure("prepare", ReservationState::Pending)?;
        }
        self.state = ReservationState::Pending;
        self.holder = None;
        Ok(())
    }

    /// Record a successful Try by `holder`.
    pub fn hold(&mut self, holder: ExecutionId) -> ParticipantResult<()> {
        self.ensure("try", ReservationState::Tried)?;
        self.state = ReservationState::Tried;
        self.holder = Some(holder);
        Ok(())
    }

    /// Make the reservation permanent.
    pub fn confirm(&mut self) -> ParticipantResult<()> {
        self.ensure("confirm", ReservationState::Confirmed)?;
        self.state = ReservationState::Confirmed;
        Ok(())
    }

    /// Check if Cancel under `id` has something to reverse.
    pub fn is_held_by(&self, id: ExecutionId) -> bool {
        self.holder == Some(id) && self.state.can_transition_to(ReservationState::Canceled)
    }

    /// Mark the reservation reversed.
    pub fn cancel(&mut self) -> ParticipantResult<()> {
        self.ensure("cancel", ReservationState::Canceled)?;
        self.state = ReservationState::Canceled;
        Ok(())
    }
}

impl Default for Reservation {
    fn default() -> Self {
        Self::new()
    }
}
