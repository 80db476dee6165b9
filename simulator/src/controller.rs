//! Simulation controller.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use tcc_common::{ExecutionId, TxContext};
use tcc_coordinator::{Coordinator, CoordinatorConfig, Metrics, Outcome, SharedMetrics};

use crate::metrics::SimulationMetrics;
use crate::scenario::Scenario;
use crate::shop::{Checkout, CheckoutSummary};

/// Result of running one named scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioRun {
    pub scenario: String,
    pub execution_id: ExecutionId,
    pub outcome: Outcome,
    pub error: Option<String>,
    pub error_code: Option<&'static str>,
    pub cancel_failures: Vec<String>,
    pub matched_expectation: bool,
    pub state: CheckoutSummary,
}

/// Result of a random workload.
#[derive(Debug, Clone, Serialize)]
pub struct WorkloadRun {
    pub seed: u64,
    pub transactions: usize,
    pub committed: u64,
    pub aborted: u64,
    pub average_latency_us: u64,
    pub p99_latency_us: u64,
}

/// Controls the simulation.
pub struct SimulationController {
    /// Coordinator configuration shared by every transaction.
    config: CoordinatorConfig,
    /// Coordinator counters across all transactions.
    metrics: SharedMetrics,
    /// Latency and outcome tracking.
    simulation: SimulationMetrics,
    /// Parent of every transaction context; cancelling it aborts pending Tries.
    shutdown: CancellationToken,
    /// Deadline applied to each transaction context.
    deadline: Option<Duration>,
}

impl SimulationController {
    /// Create a new simulation controller.
    pub fn new(config: CoordinatorConfig) -> Self {
        Self {
            config,
            metrics: Arc::new(Metrics::new()),
            simulation: SimulationMetrics::new(),
            shutdown: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Give every transaction a deadline.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Token that aborts all transactions that have not tried yet.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Coordinator counters.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Run a named scenario.
    pub async fn run_scenario(&mut self, scenario: &Scenario) -> anyhow::Result<ScenarioRun> {
        info!(scenario = %scenario.name, "{}", scenario.description);

        let checkout = Checkout::from_scenario(scenario, 1)?;
        let coordinator = self.coordinator(&checkout)?;

        let report = coordinator.execute_detailed(&self.context()).await;
        let latency_us = report.elapsed.as_micros() as u64;
        let outcome = report.outcome();
        if outcome.is_committed() {
            self.simulation.record_commit(latency_us);
        } else {
            self.simulation.record_abort(latency_us);
        }

        if checkout.has_frozen() {
            anyhow::bail!("scenario {} left a reservation behind", scenario.name);
        }

        let matched_expectation = outcome.is_committed() == scenario.expect_commit();
        if !matched_expectation {
            warn!(scenario = %scenario.name, outcome = ?outcome, "Unexpected outcome");
        }

        Ok(ScenarioRun {
            scenario: scenario.name.clone(),
            execution_id: report.execution_id,
            outcome,
            error: report.result.as_ref().err().map(|e| e.to_string()),
            error_code: report.result.as_ref().err().map(|e| e.error_code()),
            cancel_failures: report
                .compensation
                .iter()
                .flat_map(|c| c.failures.iter().map(|f| f.to_string()))
                .collect(),
            matched_expectation,
            state: checkout.summary(),
        })
    }

    /// Run `count` independent checkouts concurrently with seeded random
    /// balances, stock and amounts.
    pub async fn run_random(&mut self, count: usize, seed: u64) -> anyhow::Result<WorkloadRun> {
        info!(count, seed, "Running random workload");

        let mut rng = StdRng::seed_from_u64(seed);
        let mut checkouts = Vec::with_capacity(count);
        for id in 0..count {
            let balance = Decimal::from(rng.gen_range(0..10_000u32));
            let amount = Decimal::from(rng.gen_range(1..5_000u32));
            let stock = rng.gen_range(0..20i64);
            let quantity = rng.gen_range(1..5i64);
            checkouts.push(Checkout::random(id, balance, amount, stock, quantity)?);
        }

        let coordinators = checkouts
            .iter()
            .map(|c| self.coordinator(c))
            .collect::<anyhow::Result<Vec<_>>>()?;

        let reports = join_all(coordinators.iter().map(|coordinator| {
            let ctx = self.context();
            async move { coordinator.execute_detailed(&ctx).await }
        }))
        .await;

        for report in &reports {
            let latency_us = report.elapsed.as_micros() as u64;
            if report.is_committed() {
                self.simulation.record_commit(latency_us);
            } else {
                self.simulation.record_abort(latency_us);
            }
        }

        let leaked = checkouts.iter().filter(|c| c.has_frozen()).count();
        if leaked > 0 {
            anyhow::bail!("{} checkouts left a reservation behind", leaked);
        }

        let committed = reports.iter().filter(|r| r.is_committed()).count() as u64;
        Ok(WorkloadRun {
            seed,
            transactions: count,
            committed,
            aborted: count as u64 - committed,
            average_latency_us: self.simulation.average_latency_us(),
            p99_latency_us: self.simulation.p99_latency_us(),
        })
    }

    /// Get simulation metrics.
    pub fn simulation_metrics(&self) -> &SimulationMetrics {
        &self.simulation
    }

    fn context(&self) -> TxContext {
        let ctx = TxContext::with_token(self.shutdown.child_token());
        match self.deadline {
            Some(deadline) => ctx.with_timeout(deadline),
            None => ctx,
        }
    }

    fn coordinator(&self, checkout: &Checkout) -> anyhow::Result<Coordinator> {
        Ok(Coordinator::builder()
            .participants(checkout.participants())
            .config(self.config.clone())
            .metrics(self.metrics.clone())
            .build()?)
    }
}
