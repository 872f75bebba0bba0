use std::sync::Arc;

use anyhow::{bail, Context, Result};
use api_tester::http::{build_client, ClientOptions};
use api_tester::reporter::print_summary;
use api_tester::{Config, Dispatcher, RequestPlan, RunOutcome, StatsAggregator};
use clap::{CommandFactory, Parser};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();

    if config.uri.is_none() {
        Config::command().print_help()?;
        return Ok(());
    }

    let plan = RequestPlan::from_config(&config).context("Invalid configuration")?;
    let client = build_client(&ClientOptions::from(&config))?;

    // Print banner
    info!("════════════════════════════════════════════════════════════");
    info!("                    API LOAD TEST");
    info!("════════════════════════════════════════════════════════════");
    info!("Target: {} {}", plan.method, plan.uri);
    info!("Content-Type: {}", plan.content_type);
    info!("Body: {} bytes", plan.body.len());
    info!("Requests: {}", plan.total_requests);
    info!(
        "Concurrency: {} (effective {})",
        plan.concurrency,
        plan.effective_concurrency()
    );
    if plan.strict {
        info!("Strict mode: run stops at the first failure");
    }
    info!("════════════════════════════════════════════════════════════");

    let stats = Arc::new(StatsAggregator::new());
    let dispatcher = Dispatcher::new(plan, client, Arc::clone(&stats))
        .poll_interval(config.poll_interval())
        .report_interval(config.report_interval());

    let shutdown = CancellationToken::new();
    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received Ctrl-C, stopping");
            ctrl_c.cancel();
        }
    });

    let outcome = dispatcher.run(shutdown).await;

    print_summary(outcome.snapshot(), stats.percentiles().await, outcome.elapsed());

    match outcome {
        RunOutcome::Completed { .. } => {
            info!("════════════════════════════════════════════════════════════");
            info!("                 BENCHMARK COMPLETE");
            info!("════════════════════════════════════════════════════════════");
            Ok(())
        }
        RunOutcome::Aborted { cause, .. } => bail!("run aborted: {cause}"),
    }
}
