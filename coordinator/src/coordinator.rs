//! Core coordinator implementation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use tcc_common::{ExecutionId, Phase, SharedParticipant, TxContext};

use crate::compensation::{cancel_all, CompensationReport};
use crate::config::CoordinatorConfig;
use crate::error::{Result, TccError};
use crate::metrics::{Metrics, SharedMetrics};
use crate::observer::{LoggingObserver, SharedObserver};
use crate::state::Outcome;

/// Everything one `execute` call produced.
#[derive(Debug)]
pub struct ExecutionReport {
    /// Correlation ID taken from the context.
    pub execution_id: ExecutionId,
    /// What `execute` returns.
    pub result: Result<()>,
    /// Present when a failure triggered compensation.
    pub compensation: Option<CompensationReport>,
    /// Wall time of the whole call, compensation included.
    pub elapsed: Duration,
}

impl ExecutionReport {
    /// How the transaction ended.
    pub fn outcome(&self) -> Outcome {
        match &self.result {
            Ok(()) => Outcome::Committed,
            Err(TccError::ConfirmFailed { .. }) => Outcome::AbortedInConfirm,
            Err(_) => Outcome::AbortedInTry,
        }
    }

    /// Check if the transaction committed.
    pub fn is_committed(&self) -> bool {
        self.result.is_ok()
    }

    /// Drop the diagnostics and keep the result.
    pub fn into_result(self) -> Result<()> {
        self.result
    }
}

/// Drives an ordered set of participants through Try, Confirm and, on
/// failure, Cancel.
///
/// The participant list is fixed at construction. Nothing about a
/// transaction is kept once `execute` returns, so one coordinator can run
/// the same participants again (whether they accept that is up to them).
pub struct Coordinator {
    /// Participants in protocol order.
    participants: Vec<SharedParticipant>,
    /// Configuration.
    config: CoordinatorConfig,
    /// Receives compensation diagnostics.
    observer: SharedObserver,
    /// Optional counters.
    metrics: Option<SharedMetrics>,
}

impl Coordinator {
    /// Create a coordinator with default configuration and a logging observer.
    pub fn new(participants: Vec<SharedParticipant>) -> Self {
        Self {
            participants,
            config: CoordinatorConfig::default(),
            observer: Arc::new(LoggingObserver),
            metrics: None,
        }
    }

    /// Start building a coordinator.
    pub fn builder() -> CoordinatorBuilder {
        CoordinatorBuilder::new()
    }

    /// Participants in protocol order.
    pub fn participants(&self) -> &[SharedParticipant] {
        &self.participants
    }

    /// Number of participants.
    pub fn len(&self) -> usize {
        self.participants.len()
    }

    /// Check if there are no participants.
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Configuration in use.
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Run the transaction.
    ///
    /// Returns `Ok(())` once every participant confirmed. On error every
    /// participant has been through Cancel before this returns; the error is
    /// the first Try failure (unwrapped) or the Confirm failure (wrapped).
    pub async fn execute(&self, ctx: &TxContext) -> Result<()> {
        self.execute_detailed(ctx).await.into_result()
    }

    /// Run the transaction and return the compensation details as well.
    #[instrument(skip(self, ctx), fields(execution_id = %ctx.id(), participants = self.participants.len()))]
    pub async fn execute_detailed(&self, ctx: &TxContext) -> ExecutionReport {
        let started = Instant::now();
        let _active = self.metrics.as_deref().map(Metrics::transaction_started);

        if let Err(e) = self.try_phase(ctx).await {
            let compensation = self.compensate(ctx, Phase::Try).await;
            if let Some(metrics) = &self.metrics {
                metrics.transaction_aborted_try();
            }
            info!(error = %e, code = e.error_code(), "Transaction aborted in try phase");
            return ExecutionReport {
                execution_id: ctx.id(),
                result: Err(e),
                compensation: Some(compensation),
                elapsed: started.elapsed(),
            };
        }

        if let Err(e) = self.confirm_phase(ctx).await {
            let compensation = self.compensate(ctx, Phase::Confirm).await;
            if let Some(metrics) = &self.metrics {
                metrics.transaction_aborted_confirm();
            }
            info!(error = %e, code = e.error_code(), "Transaction aborted in confirm phase");
            return ExecutionReport {
                execution_id: ctx.id(),
                result: Err(e),
                compensation: Some(compensation),
                elapsed: started.elapsed(),
            };
        }

        if let Some(metrics) = &self.metrics {
            metrics.transaction_committed();
        }
        info!("Transaction committed");

        ExecutionReport {
            execution_id: ctx.id(),
            result: Ok(()),
            compensation: None,
            elapsed: started.elapsed(),
        }
    }

    // --- Private methods ---

    /// Try on every participant in order. Keeps going after a failure and
    /// reports the first one.
    async fn try_phase(&self, ctx: &TxContext) -> Result<()> {
        let mut first_failure = None;

        for (index, participant) in self.participants.iter().enumerate() {
            match participant.try_reserve(ctx).await {
                Ok(()) => {
                    debug!(index, participant = %participant.name(), "Try succeeded");
                }
                Err(error) => {
                    warn!(
                        index,
                        participant = %participant.name(),
                        error = %error,
                        code = error.error_code(),
                        "Try failed"
                    );
                    if first_failure.is_none() {
                        first_failure = Some(TccError::TryFailed { index, error });
                    }
                }
            }
        }

        match first_failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Confirm on every participant in order, stopping at the first failure.
    async fn confirm_phase(&self, ctx: &TxContext) -> Result<()> {
        for (index, participant) in self.participants.iter().enumerate() {
            participant.confirm(ctx).await.map_err(|source| {
                warn!(
                    index,
                    participant = %participant.name(),
                    error = %source,
                    code = source.error_code(),
                    "Confirm failed"
                );
                TccError::ConfirmFailed { index, source }
            })?;
            debug!(index, participant = %participant.name(), "Confirm succeeded");
        }
        Ok(())
    }

    async fn compensate(&self, ctx: &TxContext, trigger: Phase) -> CompensationReport {
        let report = cancel_all(&self.participants, ctx, trigger, self.config.cancel_timeout).await;

        for failure in &report.failures {
            self.observer.on_cancel_failure(failure);
        }
        self.observer.on_compensation_complete(&report);

        if let Some(metrics) = &self.metrics {
            metrics.compensation_finished(&report);
        }

        report
    }
}

/// Builder for [`Coordinator`].
pub struct CoordinatorBuilder {
    participants: Vec<SharedParticipant>,
    config: CoordinatorConfig,
    observer: Option<SharedObserver>,
    metrics: Option<SharedMetrics>,
}

impl CoordinatorBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self {
            participants: Vec::new(),
            config: CoordinatorConfig::default(),
            observer: None,
            metrics: None,
        }
    }

    /// Append a participant. Order of calls is protocol order.
    pub fn participant(mut self, participant: SharedParticipant) -> Self {
        self.participants.push(participant);
        self
    }

    /// Append several participants in order.
    pub fn participants<I>(mut self, participants: I) -> Self
    where
        I: IntoIterator<Item = SharedParticipant>,
    {
        self.participants.extend(participants);
        self
    }

    /// Set configuration.
    pub fn config(mut self, config: CoordinatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the compensation observer. Defaults to [`LoggingObserver`].
    pub fn observer(mut self, observer: SharedObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Record counters into `metrics`.
    pub fn metrics(mut self, metrics: SharedMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Validate the configuration and build.
    pub fn build(self) -> Result<Coordinator> {
        self.config.validate().map_err(TccError::InvalidConfig)?;

        Ok(Coordinator {
            participants: self.participants,
            config: self.config,
            observer: self.observer.unwrap_or_else(|| Arc::new(LoggingObserver)),
            metrics: self.metrics,
        })
    }
}

impl Default for CoordinatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use tcc_common::{Participant, ParticipantError, ParticipantResult};

    /// Participant that appends every call to a shared journal.
    struct Journaled {
        label: &'static str,
        journal: Arc<Mutex<Vec<String>>>,
        fail_try: bool,
        fail_confirm: bool,
    }

    impl Journaled {
        fn new(label: &'static str, journal: &Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                label,
                journal: journal.clone(),
                fail_try: false,
                fail_confirm: false,
            }
        }

        fn record(&self, step: &str) {
            self.journal.lock().push(format!("{}:{}", step, self.label));
        }
    }

    #[async_trait]
    impl Participant for Journaled {
        async fn try_reserve(&self, _ctx: &TxContext) -> ParticipantResult<()> {
            self.record("try");
            if self.fail_try {
                return Err(ParticipantError::failed(format!("{} try failed", self.label)));
            }
            Ok(())
        }

        async fn confirm(&self, _ctx: &TxContext) -> ParticipantResult<()> {
            self.record("confirm");
            if self.fail_confirm {
                return Err(ParticipantError::failed(format!(
                    "{} confirm failed",
                    self.label
                )));
            }
            Ok(())
        }

        async fn cancel(&self, _ctx: &TxContext) -> ParticipantResult<()> {
            self.record("cancel");
            Ok(())
        }

        fn name(&self) -> String {
            self.label.to_string()
        }
    }

    fn journal() -> Arc<Mutex<Vec<String>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    #[tokio::test]
    async fn test_commit_runs_try_then_confirm_in_order() {
        let log = journal();
        let coordinator = Coordinator::new(vec![
            Arc::new(Journaled::new("a", &log)) as SharedParticipant,
            Arc::new(Journaled::new("b", &log)),
        ]);

        coordinator.execute(&TxContext::new()).await.unwrap();

        assert_eq!(
            *log.lock(),
            vec!["try:a", "try:b", "confirm:a", "confirm:b"]
        );
    }

    #[tokio::test]
    async fn test_try_phase_does_not_short_circuit() {
        let log = journal();
        let mut a = Journaled::new("a", &log);
        a.fail_try = true;
        let mut b = Journaled::new("b", &log);
        b.fail_try = true;
        let coordinator = Coordinator::new(vec![
            Arc::new(a) as SharedParticipant,
            Arc::new(b),
            Arc::new(Journaled::new("c", &log)),
        ]);

        let err = coordinator.execute(&TxContext::new()).await.unwrap_err();

        assert_eq!(err, TccError::TryFailed {
            index: 0,
            error: ParticipantError::failed("a try failed"),
        });
        let entries = log.lock().clone();
        assert_eq!(&entries[..3], &["try:a", "try:b", "try:c"]);
        assert!(!entries.iter().any(|e| e.starts_with("confirm")));
        assert_eq!(entries.iter().filter(|e| e.starts_with("cancel")).count(), 3);
    }

    #[tokio::test]
    async fn test_confirm_phase_stops_at_first_failure() {
        let log = journal();
        let mut b = Journaled::new("b", &log);
        b.fail_confirm = true;
        let coordinator = Coordinator::new(vec![
            Arc::new(Journaled::new("a", &log)) as SharedParticipant,
            Arc::new(b),
            Arc::new(Journaled::new("c", &log)),
        ]);

        let report = coordinator.execute_detailed(&TxContext::new()).await;

        assert_eq!(report.outcome(), Outcome::AbortedInConfirm);
        let entries = log.lock().clone();
        assert!(entries.contains(&"confirm:a".to_string()));
        assert!(entries.contains(&"confirm:b".to_string()));
        assert!(!entries.contains(&"confirm:c".to_string()));
        assert_eq!(entries.iter().filter(|e| e.starts_with("cancel")).count(), 3);
        assert_eq!(report.compensation.unwrap().trigger, Phase::Confirm);
    }

    #[tokio::test]
    async fn test_empty_transaction_commits() {
        let coordinator = Coordinator::new(Vec::new());
        assert!(coordinator.is_empty());
        let report = coordinator.execute_detailed(&TxContext::new()).await;
        assert!(report.is_committed());
        assert!(report.compensation.is_none());
    }

    #[tokio::test]
    async fn test_report_carries_context_id() {
        let ctx = TxContext::new();
        let report = Coordinator::new(Vec::new()).execute_detailed(&ctx).await;
        assert_eq!(report.execution_id, ctx.id());
    }

    #[tokio::test]
    async fn test_builder_records_metrics() {
        let log = journal();
        let metrics = Arc::new(Metrics::new());
        let mut failing = Journaled::new("b", &log);
        failing.fail_try = true;

        let coordinator = Coordinator::builder()
            .participant(Arc::new(Journaled::new("a", &log)))
            .participant(Arc::new(failing))
            .metrics(metrics.clone())
            .build()
            .unwrap();

        assert_eq!(coordinator.len(), 2);
        assert!(coordinator.execute(&TxContext::new()).await.is_err());

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.transactions_total, 1);
        assert_eq!(snapshot.transactions_aborted_try, 1);
        assert_eq!(snapshot.transactions_active, 0);
        assert_eq!(snapshot.cancels_issued, 2);
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let result = Coordinator::builder()
            .config(CoordinatorConfig::default().with_cancel_timeout(Duration::ZERO))
            .build();
        assert!(matches!(result, Err(TccError::InvalidConfig(_))));
    }

    /// Try that never returns.
    struct Hanging;

    #[async_trait]
    impl Participant for Hanging {
        async fn try_reserve(&self, _ctx: &TxContext) -> ParticipantResult<()> {
            std::future::pending::<()>().await;
            Ok(())
        }

        async fn confirm(&self, _ctx: &TxContext) -> ParticipantResult<()> {
            Ok(())
        }

        async fn cancel(&self, _ctx: &TxContext) -> ParticipantResult<()> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_execution_is_not_left_active() {
        let metrics = Arc::new(Metrics::new());
        let coordinator = Coordinator::builder()
            .participant(Arc::new(Hanging))
            .metrics(metrics.clone())
            .build()
            .unwrap();

        let ctx = TxContext::new();
        let abandoned =
            tokio::time::timeout(Duration::from_millis(10), coordinator.execute(&ctx)).await;
        assert!(abandoned.is_err());

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.transactions_total, 1);
        assert_eq!(snapshot.transactions_active, 0);
        assert_eq!(snapshot.transactions_committed, 0);
    }
}
