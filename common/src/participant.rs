//! The capability every resource manager exposes to the coordinator.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{ParticipantResult, TxContext};

/// A resource manager taking part in a TCC transaction.
///
/// The amount a participant reserves is configured on it before the
/// transaction starts; nothing business-specific flows through these calls.
///
/// Contract:
/// - `try_reserve` provisionally reserves the configured amount. On failure
///   committed state must be unchanged; anything partially applied is undone
///   by `cancel`. It may run even after an earlier participant's Try failed.
/// - `confirm` makes the reservation permanent. Only called after every
///   participant's Try succeeded.
/// - `cancel` restores the pre-Try state. It may run concurrently with the
///   other participants' Cancel and must be accepted in every state the
///   protocol reaches: never tried, tried, failed Try, confirmed (the
///   Confirm-failure path compensates participants that already confirmed)
///   and already canceled. Repeating it must not change anything, and it
///   must only reverse work done under the same `ctx.id()`.
///
/// Implementations take `&self` and own their internal synchronization.
#[async_trait]
pub trait Participant: Send + Sync {
    /// Try step: provisionally reserve the configured resources.
    async fn try_reserve(&self, ctx: &TxContext) -> ParticipantResult<()>;

    /// Confirm step: make the reservation permanent.
    async fn confirm(&self, ctx: &TxContext) -> ParticipantResult<()>;

    /// Cancel step: reverse the effect of Try.
    async fn cancel(&self, ctx: &TxContext) -> ParticipantResult<()>;

    /// Label used in logs and cancel-failure reports.
    fn name(&self) -> String {
        "participant".to_string()
    }
}

/// Participant handle as held by the coordinator.
pub type SharedParticipant = Arc<dyn Participant>;
