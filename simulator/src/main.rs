//! TCC Simulator
//!
//! Runs checkout scenarios and random workloads through the coordinator.

use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tcc_coordinator::CoordinatorConfig;

mod controller;
mod metrics;
mod scenario;
mod shop;

use controller::SimulationController;
use scenario::Scenario;

/// TCC Simulator CLI
#[derive(Parser, Debug)]
#[command(name = "tcc-sim")]
#[command(about = "Run Try-Confirm-Cancel checkouts against in-memory participants")]
struct Args {
    /// Scenario to run (checkout-success, insufficient-balance,
    /// order-confirm-failure, inventory-shortage)
    #[arg(short, long)]
    scenario: Option<String>,

    /// Number of random checkouts when no scenario is given
    #[arg(short, long, default_value = "100")]
    transactions: usize,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Bound each Cancel during compensation (milliseconds)
    #[arg(long)]
    cancel_timeout_ms: Option<u64>,

    /// Deadline for each transaction (milliseconds)
    #[arg(long)]
    deadline_ms: Option<u64>,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,

    /// Dump coordinator metrics in Prometheus format
    #[arg(long)]
    metrics: bool,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = CoordinatorConfig::from_env();
    if let Some(ms) = args.cancel_timeout_ms {
        config.cancel_timeout = (ms > 0).then(|| Duration::from_millis(ms));
    }

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone()),
    );
    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(anyhow::anyhow!("Configuration error: {}", e));
    }

    info!("Starting TCC Simulator");

    let mut controller = SimulationController::new(config);
    if let Some(ms) = args.deadline_ms {
        controller = controller.with_deadline(Duration::from_millis(ms));
    }

    let shutdown = controller.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; transactions that have not tried yet will abort");
            shutdown.cancel();
        }
    });

    if let Some(name) = &args.scenario {
        let scenario = Scenario::load(name)?;
        let run = controller.run_scenario(&scenario).await?;

        if args.json {
            println!("{}", serde_json::to_string_pretty(&run)?);
        } else {
            info!(
                scenario = %run.scenario,
                execution_id = %run.execution_id,
                outcome = ?run.outcome,
                error = run.error.as_deref().unwrap_or("-"),
                code = run.error_code.unwrap_or("-"),
                balance = %run.state.account.balance,
                stock = run.state.inventory.quantity,
                order = ?run.state.order,
                "Scenario finished"
            );
            for failure in &run.cancel_failures {
                error!("{}", failure);
            }
        }

        if !run.matched_expectation {
            anyhow::bail!("scenario {} ended with unexpected outcome", run.scenario);
        }
    } else {
        let seed = args.seed.unwrap_or_else(rand::random);
        let run = controller.run_random(args.transactions, seed).await?;

        if args.json {
            println!("{}", serde_json::to_string_pretty(&run)?);
        } else {
            let metrics = controller.simulation_metrics();
            info!("Simulation complete");
            info!("Seed: {}", run.seed);
            info!("Total transactions: {}", metrics.total_transactions);
            info!("Committed: {}", metrics.committed);
            info!("Aborted: {}", metrics.aborted);
            info!("Commit rate: {:.2}", metrics.commit_rate());
            info!("Average latency: {}us", metrics.average_latency_us());
            info!("p99 latency: {}us", metrics.p99_latency_us());
        }
    }

    if args.metrics {
        print!("{}", controller.metrics().to_prometheus());
    }

    Ok(())
}
