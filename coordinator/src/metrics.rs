//! Metrics collection for coordinator monitoring.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::compensation::CompensationReport;

/// Coordinator metrics.
pub struct Metrics {
    /// Total transactions executed.
    pub transactions_total: AtomicU64,
    /// Transactions that committed.
    pub transactions_committed: AtomicU64,
    /// Transactions aborted by a Try failure.
    pub transactions_aborted_try: AtomicU64,
    /// Transactions aborted by a Confirm failure.
    pub transactions_aborted_confirm: AtomicU64,
    /// Transactions currently executing.
    pub transactions_active: AtomicU64,
    /// Compensation rounds run.
    pub compensations_total: AtomicU64,
    /// Cancel calls issued.
    pub cancels_issued: AtomicU64,
    /// Cancel calls that failed, timed out or panicked.
    pub cancel_failures: AtomicU64,
    /// Cancel calls that hit the timeout.
    pub cancel_timeouts: AtomicU64,
}

impl Metrics {
    /// Create new metrics instance.
    pub fn new() -> Self {
        Self {
            transactions_total: AtomicU64::new(0),
            transactions_committed: AtomicU64::new(0),
            transactions_aborted_try: AtomicU64::new(0),
            transactions_aborted_confirm: AtomicU64::new(0),
            transactions_active: AtomicU64::new(0),
            compensations_total: AtomicU64::new(0),
            cancels_issued: AtomicU64::new(0),
            cancel_failures: AtomicU64::new(0),
            cancel_timeouts: AtomicU64::new(0),
        }
    }

    /// Increment transaction started. The transaction counts as active
    /// until the returned guard is dropped.
    #[must_use = "the transaction stops counting as active when the guard drops"]
    pub fn transaction_started(&self) -> ActiveTransaction<'_> {
        self.transactions_total.fetch_add(1, Ordering::Relaxed);
        self.transactions_active.fetch_add(1, Ordering::Relaxed);
        ActiveTransaction { metrics: self }
    }

    /// Record commit.
    pub fn transaction_committed(&self) {
        self.transactions_committed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record abort after a Try failure.
    pub fn transaction_aborted_try(&self) {
        self.transactions_aborted_try.fetch_add(1, Ordering::Relaxed);
    }

    /// Record abort after a Confirm failure.
    pub fn transaction_aborted_confirm(&self) {
        self.transactions_aborted_confirm
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Record a finished compensation round.
    pub fn compensation_finished(&self, report: &CompensationReport) {
        self.compensations_total.fetch_add(1, Ordering::Relaxed);
        self.cancels_issued
            .fetch_add(report.attempted as u64, Ordering::Relaxed);
        self.cancel_failures
            .fetch_add(report.failures.len() as u64, Ordering::Relaxed);
        self.cancel_timeouts
            .fetch_add(report.timed_out() as u64, Ordering::Relaxed);
    }

    /// Get current metrics snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            transactions_total: self.transactions_total.load(Ordering::Relaxed),
            transactions_committed: self.transactions_committed.load(Ordering::Relaxed),
            transactions_aborted_try: self.transactions_aborted_try.load(Ordering::Relaxed),
            transactions_aborted_confirm: self
                .transactions_aborted_confirm
                .load(Ordering::Relaxed),
            transactions_active: self.transactions_active.load(Ordering::Relaxed),
            compensations_total: self.compensations_total.load(Ordering::Relaxed),
            cancels_issued: self.cancels_issued.load(Ordering::Relaxed),
            cancel_failures: self.cancel_failures.load(Ordering::Relaxed),
            cancel_timeouts: self.cancel_timeouts.load(Ordering::Relaxed),
        }
    }

    /// Export metrics in Prometheus format.
    pub fn to_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        format!(
            r#"# HELP tcc_transactions_total Total number of transactions executed
# TYPE tcc_transactions_total counter
tcc_transactions_total {}

# HELP tcc_transactions_committed Transactions that committed
# TYPE tcc_transactions_committed counter
tcc_transactions_committed {}

# HELP tcc_transactions_aborted_try Transactions aborted in the Try phase
# TYPE tcc_transactions_aborted_try counter
tcc_transactions_aborted_try {}

# HELP tcc_transactions_aborted_confirm Transactions aborted in the Confirm phase
# TYPE tcc_transactions_aborted_confirm counter
tcc_transactions_aborted_confirm {}

# HELP tcc_transactions_active Transactions currently executing
# TYPE tcc_transactions_active gauge
tcc_transactions_active {}

# HELP tcc_compensations_total Compensation rounds run
# TYPE tcc_compensations_total counter
tcc_compensations_total {}

# HELP tcc_cancels_issued Cancel calls issued
# TYPE tcc_cancels_issued counter
tcc_cancels_issued {}

# HELP tcc_cancel_failures Cancel calls that did not complete
# TYPE tcc_cancel_failures counter
tcc_cancel_failures {}

# HELP tcc_cancel_timeouts Cancel calls that hit the timeout
# TYPE tcc_cancel_timeouts counter
tcc_cancel_timeouts {}
"#,
            snapshot.transactions_total,
            snapshot.transactions_committed,
            snapshot.transactions_aborted_try,
            snapshot.transactions_aborted_confirm,
            snapshot.transactions_active,
            snapshot.compensations_total,
            snapshot.cancels_issued,
            snapshot.cancel_failures,
            snapshot.cancel_timeouts,
        )
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps one transaction in `transactions_active`.
///
/// Dropping it lowers the gauge, also when the caller drops the `execute`
/// future before it completes.
pub struct ActiveTransaction<'a> {
    metrics: &'a Metrics,
}

impl Drop for ActiveTransaction<'_> {
    fn drop(&mut self) {
        self.metrics
            .transactions_active
            .fetch_sub(1, Ordering::Relaxed);
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub transactions_total: u64,
    pub transactions_committed: u64,
    pub transactions_aborted_try: u64,
    pub transactions_aborted_confirm: u64,
    pub transactions_active: u64,
    pub compensations_total: u64,
    pub cancels_issued: u64,
    pub cancel_failures: u64,
    pub cancel_timeouts: u64,
}

/// Shared metrics instance.
pub type SharedMetrics = Arc<Metrics>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compensation::{CancelFailure, CancelFailureKind};
    use std::time::Duration;
    use tcc_common::Phase;

    #[test]
    fn test_metrics_increment() {
        let metrics = Metrics::new();

        let first = metrics.transaction_started();
        let _second = metrics.transaction_started();
        metrics.transaction_committed();
        drop(first);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.transactions_total, 2);
        assert_eq!(snapshot.transactions_committed, 1);
        assert_eq!(snapshot.transactions_active, 1);
    }

    #[test]
    fn test_active_guard_lowers_gauge_without_outcome() {
        let metrics = Metrics::new();
        {
            let _active = metrics.transaction_started();
            assert_eq!(metrics.snapshot().transactions_active, 1);
        }

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.transactions_active, 0);
        assert_eq!(snapshot.transactions_total, 1);
        assert_eq!(snapshot.transactions_committed, 0);
    }

    #[test]
    fn test_compensation_counters() {
        let metrics = Metrics::new();
        let report = CompensationReport {
            trigger: Phase::Confirm,
            attempted: 3,
            failures: vec![CancelFailure {
                index: 1,
                participant: "inventory".to_string(),
                kind: CancelFailureKind::TimedOut(Duration::from_millis(10)),
                failed_at: chrono::Utc::now(),
            }],
            elapsed: Duration::from_millis(12),
        };

        metrics.compensation_finished(&report);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.compensations_total, 1);
        assert_eq!(snapshot.cancels_issued, 3);
        assert_eq!(snapshot.cancel_failures, 1);
        assert_eq!(snapshot.cancel_timeouts, 1);
    }

    #[test]
    fn test_prometheus_export() {
        let metrics = Metrics::new();
        let _active = metrics.transaction_started();

        let output = metrics.to_prometheus();
        assert!(output.contains("tcc_transactions_total 1"));
        assert!(output.contains("tcc_transactions_active 1"));
    }
}
