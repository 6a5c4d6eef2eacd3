use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use uuid::Uuid;

use stampede::cli::{Cli, Command, RunArgs, SummaryFormat};
use stampede::config::RunConfig;
use stampede::metrics::collector::MetricsCollector;
use stampede::metrics::reporter;
use stampede::metrics::thresholds;
use stampede::scheduler::ScenarioScheduler;
use stampede::transport::ReqwestTransport;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => run(args).await,
    }
}

async fn run(args: RunArgs) -> Result<()> {
    // Initialize tracing
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Load and validate the configuration; any problem here is fatal and
    // happens before a single request is sent.
    let mut config = RunConfig::load(&args.config)
        .with_context(|| format!("loading config {}", args.config.display()))?;
    if let Some(base_url) = args.base_url {
        config.base_url = base_url;
    }
    let plan = config.build_plan().context("validating config")?;

    let run_id = Uuid::new_v4();
    tracing::info!("Stampede Load Test Starting...");
    tracing::info!("Run ID: {run_id}");
    tracing::info!("Target: {}", config.base_url);
    tracing::info!("Scenarios: {}", plan.scenarios.len());
    for scenario in &plan.scenarios {
        tracing::info!(
            "  {} flow={} offset={:?} duration={:?}",
            scenario.name,
            scenario.flow.name(),
            scenario.start_offset,
            scenario.duration
        );
    }
    tracing::info!("Thresholds: {}", plan.thresholds.len());

    let transport = Arc::new(
        ReqwestTransport::new(config.base_url.clone(), &config.headers, config.request_timeout)
            .context("building HTTP transport")?,
    );

    let collector = MetricsCollector::new();

    // Live view only makes sense for the interactive text output
    let live_reporter = if args.report_interval > 0 && args.summary_format == SummaryFormat::Text {
        let collector_clone = collector.clone();
        let interval = args.report_interval;
        Some(tokio::spawn(async move {
            reporter::start_periodic_reporter(collector_clone, interval).await;
        }))
    } else {
        None
    };

    let scheduler = ScenarioScheduler::new(
        plan.scenarios,
        transport,
        collector.clone(),
        plan.options,
    );
    scheduler.run().await;

    if let Some(handle) = live_reporter {
        handle.abort();
    }

    // Threshold violations are the run's failure mechanism, not errors: every
    // comparison is reported with its observed value and bound.
    let verdict = thresholds::evaluate(&plan.thresholds, &collector);

    match args.summary_format {
        SummaryFormat::Text => reporter::print_final_report(&collector, &verdict),
        SummaryFormat::Json => {
            let summary = reporter::json_summary(&collector, &verdict);
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    if !verdict.passed {
        tracing::error!("one or more thresholds failed");
        std::process::exit(1);
    }

    tracing::info!("Load test complete");
    Ok(())
}
