//! Cancellable execution context passed to every participant step.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{ExecutionId, ParticipantError, ParticipantResult};

/// Execution context for one transaction.
///
/// Cancellation and the deadline are advisory. The coordinator hands the
/// context to each step and never checks it between phases; participants
/// decide whether to honor it.
#[derive(Debug, Clone)]
pub struct TxContext {
    id: ExecutionId,
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl TxContext {
    /// Create a fresh context with no deadline.
    pub fn new() -> Self {
        Self::with_token(CancellationToken::new())
    }

    /// Context that observes an externally owned token, e.g. a child of a
    /// process-wide shutdown token.
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            id: ExecutionId::new(),
            token,
            deadline: None,
        }
    }

    /// Set a deadline `timeout` from now. An earlier existing deadline wins.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        self.deadline = Some(match self.deadline {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        });
        self
    }

    /// Execution this context belongs to.
    pub fn id(&self) -> ExecutionId {
        self.id
    }

    /// Cancel this context.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Check if the context was cancelled explicitly.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Check if the deadline has passed.
    pub fn is_expired(&self) -> bool {
        self.deadline.map_or(false, |d| Instant::now() >= d)
    }

    /// Cancelled or expired.
    pub fn is_done(&self) -> bool {
        self.is_cancelled() || self.is_expired()
    }

    /// Return [`ParticipantError::ContextCancelled`] if the context is done.
    pub fn check(&self) -> ParticipantResult<()> {
        if self.is_done() {
            Err(ParticipantError::ContextCancelled)
        } else {
            Ok(())
        }
    }
}

impl Default for TxContext {
    fn default() -> Self {
        Self::new()
    }
}
