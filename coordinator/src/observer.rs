//! Delivery of compensation diagnostics to the caller.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::compensation::{CancelFailure, CompensationReport};

/// Receives the outcome of every compensation round.
///
/// Cancel failures are diagnostics only: observers cannot change the error
/// returned by `execute` and nothing is retried on their behalf.
pub trait CompensationObserver: Send + Sync {
    /// Called once per failed Cancel, in participant order.
    fn on_cancel_failure(&self, failure: &CancelFailure);

    /// Called after all Cancel calls of one round have finished.
    fn on_compensation_complete(&self, _report: &CompensationReport) {}
}

/// Default observer that logs through `tracing`.
pub struct LoggingObserver;

impl CompensationObserver for LoggingObserver {
    fn on_cancel_failure(&self, failure: &CancelFailure) {
        tracing::error!(
            index = failure.index,
            participant = %failure.participant,
            error = %failure.kind,
            "Cancel failed; participant may still hold a reservation"
        );
    }

    fn on_compensation_complete(&self, report: &CompensationReport) {
        if report.is_clean() {
            tracing::info!(
                trigger = %report.trigger,
                attempted = report.attempted,
                elapsed_ms = report.elapsed.as_millis() as u64,
                "Compensation complete"
            );
        } else {
            tracing::warn!(
                trigger = %report.trigger,
                attempted = report.attempted,
                failed = report.failures.len(),
                "Some cancellations failed"
            );
        }
    }
}

/// Observer that forwards to callback functions.
pub struct CallbackObserver {
    on_failure: Option<Box<dyn Fn(&CancelFailure) + Send + Sync>>,
    on_complete: Option<Box<dyn Fn(&CompensationReport) + Send + Sync>>,
}

impl CallbackObserver {
    /// Create a new callback observer.
    pub fn new() -> Self {
        Self {
            on_failure: None,
            on_complete: None,
        }
    }

    /// Set cancel failure callback.
    pub fn on_failure<F>(mut self, callback: F) -> Self
    where
        F: Fn(&CancelFailure) + Send + Sync + 'static,
    {
        self.on_failure = Some(Box::new(callback));
        self
    }

    /// Set compensation complete callback.
    pub fn on_complete<F>(mut self, callback: F) -> Self
    where
        F: Fn(&CompensationReport) + Send + Sync + 'static,
    {
        self.on_complete = Some(Box::new(callback));
        self
    }
}

impl Default for CallbackObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl CompensationObserver for CallbackObserver {
    fn on_cancel_failure(&self, failure: &CancelFailure) {
        if let Some(callback) = &self.on_failure {
            callback(failure);
        }
    }

    fn on_compensation_complete(&self, report: &CompensationReport) {
        if let Some(callback) = &self.on_complete {
            callback(report);
        }
    }
}

/// Observer that streams cancel failures into a channel.
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<CancelFailure>,
}

impl ChannelObserver {
    /// Create the observer together with the receiving end.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<CancelFailure>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl CompensationObserver for ChannelObserver {
    fn on_cancel_failure(&self, failure: &CancelFailure) {
        // A dropped receiver only means nobody is listening.
        let _ = self.tx.send(failure.clone());
    }
}

/// Shared observer handle.
pub type SharedObserver = Arc<dyn CompensationObserver>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compensation::CancelFailureKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tcc_common::{ParticipantError, Phase};

    fn failure(index: usize) -> CancelFailure {
        CancelFailure {
            index,
            participant: "account".to_string(),
            kind: CancelFailureKind::Error(ParticipantError::failed("refund rejected")),
            failed_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_callback_observer() {
        let failures = Arc::new(AtomicUsize::new(0));
        let counter = failures.clone();
        let observer = CallbackObserver::new().on_failure(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        observer.on_cancel_failure(&failure(0));
        observer.on_cancel_failure(&failure(1));
        observer.on_compensation_complete(&CompensationReport {
            trigger: Phase::Try,
            attempted: 2,
            failures: vec![],
            elapsed: Duration::ZERO,
        });

        assert_eq!(failures.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_channel_observer() {
        let (observer, mut rx) = ChannelObserver::new();
        observer.on_cancel_failure(&failure(3));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.index, 3);
    }

    #[test]
    fn test_channel_observer_without_receiver() {
        let (observer, rx) = ChannelObserver::new();
        drop(rx);
        observer.on_cancel_failure(&failure(0));
    }
}
