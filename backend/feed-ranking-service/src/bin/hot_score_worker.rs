//! One-shot hot score recomputation, meant to be run from cron.
//!
//! Exits 0 for every run outcome (including lock contention and an
//! unreachable queue); only configuration or bootstrap failures exit non-zero.

use tracing::{info, warn};

use feed_ranking::bootstrap;
use feed_ranking::config::Config;
use feed_ranking::jobs::WorkerOutcome;
use feed_ranking::telemetry;

#[tokio::main]
async fn main() {
    telemetry::init_tracing();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!("Configuration loading failed: {:#}", e);
            eprintln!("ERROR: Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let worker = match bootstrap::build_worker(&config).await {
        Ok(worker) => worker,
        Err(e) => {
            tracing::error!("Hot score worker bootstrap failed: {:#}", e);
            eprintln!("ERROR: Failed to initialise hot score worker: {}", e);
            std::process::exit(1);
        }
    };

    match worker.run_once().await {
        WorkerOutcome::Completed(report) => info!(
            processed = report.processed,
            drained = report.drained,
            "Processed {} posts",
            report.processed
        ),
        WorkerOutcome::LockContention => info!("Another hot score worker is running"),
        WorkerOutcome::Unavailable { stage, error } => {
            warn!(stage, error = %error, "Hot score worker skipped this run")
        }
    }
}
