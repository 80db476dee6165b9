//! Compensation: concurrent Cancel across every participant.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::FutureExt;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument};

use tcc_common::{ParticipantError, Phase, SharedParticipant, TxContext};

/// Why a single Cancel did not complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelFailureKind {
    /// The participant returned an error.
    Error(ParticipantError),
    /// The participant did not finish within the configured bound.
    TimedOut(Duration),
    /// The participant panicked or its task was torn down.
    Panicked(String),
}

impl fmt::Display for CancelFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelFailureKind::Error(e) => write!(f, "{}", e),
            CancelFailureKind::TimedOut(limit) => {
                write!(f, "timed out after {}ms", limit.as_millis())
            }
            CancelFailureKind::Panicked(msg) => write!(f, "panicked: {}", msg),
        }
    }
}

/// A Cancel that failed during compensation.
///
/// The participant is left in whatever state the failed Cancel produced;
/// nothing retries it.
#[derive(Debug, Clone)]
pub struct CancelFailure {
    /// Position of the participant in the transaction.
    pub index: usize,
    /// Participant label.
    pub participant: String,
    /// What went wrong.
    pub kind: CancelFailureKind,
    /// When the failure was observed.
    pub failed_at: DateTime<Utc>,
}

impl fmt::Display for CancelFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cancel failed: participant {} ({}): {}",
            self.index, self.participant, self.kind
        )
    }
}

/// Outcome of one compensation round.
#[derive(Debug, Clone)]
pub struct CompensationReport {
    /// Phase whose failure triggered compensation.
    pub trigger: Phase,
    /// Number of Cancel calls issued.
    pub attempted: usize,
    /// Failed Cancel calls, ordered by participant position.
    pub failures: Vec<CancelFailure>,
    /// Wall time from fan-out to the last join.
    pub elapsed: Duration,
}

impl CompensationReport {
    /// Check if every Cancel succeeded.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of Cancel calls that succeeded.
    pub fn succeeded(&self) -> usize {
        self.attempted - self.failures.len()
    }

    /// Number of Cancel calls that hit the timeout.
    pub fn timed_out(&self) -> usize {
        self.failures
            .iter()
            .filter(|f| matches!(f.kind, CancelFailureKind::TimedOut(_)))
            .count()
    }
}

/// Run Cancel on every participant concurrently and wait for all of them.
///
/// One task per participant is spawned on a [`JoinSet`]; the set is drained
/// before returning, and dropping the returned future aborts whatever is
/// still running, so no Cancel outlives the caller. Must run inside a Tokio
/// runtime.
#[instrument(skip(participants, ctx), fields(execution_id = %ctx.id(), participants = participants.len()))]
pub async fn cancel_all(
    participants: &[SharedParticipant],
    ctx: &TxContext,
    trigger: Phase,
    timeout: Option<Duration>,
) -> CompensationReport {
    let started = Instant::now();
    info!(trigger = %trigger, "Compensating all participants");

    let mut tasks = JoinSet::new();
    for (index, participant) in participants.iter().enumerate() {
        let participant = Arc::clone(participant);
        let ctx = ctx.clone();
        tasks.spawn(async move {
            let name = participant.name();
            let kind = cancel_one(participant.as_ref(), &ctx, timeout).await.err();
            (index, name, kind)
        });
    }

    let mut reported = vec![false; participants.len()];
    let mut failures = Vec::new();

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, name, None)) => {
                reported[index] = true;
                debug!(index, participant = %name, "Participant canceled");
            }
            Ok((index, name, Some(kind))) => {
                reported[index] = true;
                failures.push(CancelFailure {
                    index,
                    participant: name,
                    kind,
                    failed_at: Utc::now(),
                });
            }
            Err(e) => {
                error!(error = %e, "Cancel task did not complete");
            }
        }
    }

    // A task that never reported was torn down before finishing.
    for (index, participant) in participants.iter().enumerate() {
        if !reported[index] {
            failures.push(CancelFailure {
                index,
                participant: participant.name(),
                kind: CancelFailureKind::Panicked("cancel task aborted".to_string()),
                failed_at: Utc::now(),
            });
        }
    }

    failures.sort_by_key(|f| f.index);

    CompensationReport {
        trigger,
        attempted: participants.len(),
        failures,
        elapsed: started.elapsed(),
    }
}

async fn cancel_one(
    participant: &dyn tcc_common::Participant,
    ctx: &TxContext,
    timeout: Option<Duration>,
) -> Result<(), CancelFailureKind> {
    let guarded = AssertUnwindSafe(participant.cancel(ctx)).catch_unwind();

    let outcome = match timeout {
        Some(limit) => match tokio::time::timeout(limit, guarded).await {
            Ok(outcome) => outcome,
            Err(_) => return Err(CancelFailureKind::TimedOut(limit)),
        },
        None => guarded.await,
    };

    match outcome {
        Ok(result) => result.map_err(CancelFailureKind::Error),
        Err(payload) => Err(CancelFailureKind::Panicked(panic_message(payload))),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
