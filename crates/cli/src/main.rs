mod cli;
mod workload;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use tracing::info;

use jobsys_scheduler::{Scheduler, SchedulerConfig};

use crate::cli::{CliArgs, Command, RunArgs};
use crate::workload::{setup_worker, Workload};

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();
    match args.command {
        Command::Run(run) => run_workload(run),
        Command::Config(config) => {
            let config = load_config(config.config.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

/// Load scheduler config from a file, or from defaults plus environment.
fn load_config(path: Option<&Path>) -> Result<SchedulerConfig> {
    match path {
        Some(path) => SchedulerConfig::from_file(path)
            .with_context(|| format!("failed to load config: {}", path.display())),
        None => SchedulerConfig::from_env().context("invalid scheduler config in environment"),
    }
}

fn run_workload(args: RunArgs) -> Result<()> {
    let mut config = load_config(args.config.config.as_deref())?;
    if let Some(workers) = args.workers {
        config.worker_threads = workers;
        config.validate().context("invalid --workers")?;
    }
    config.log_summary();

    let scheduler = Arc::new(
        Scheduler::builder()
            .config(config)
            .worker_setup(setup_worker)
            .build()
            .context("failed to start job scheduler")?,
    );

    let workload = Workload {
        jobs: args.jobs,
        chain: args.chain,
        fail_every: args.fail_every,
    };
    info!(
        jobs = workload.jobs,
        chain = workload.chain,
        fail_every = workload.fail_every,
        "Running synthetic workload"
    );
    let report = workload.run(&scheduler);
    let stats = scheduler.stats();

    scheduler
        .shutdown(false)
        .context("failed to shut down job scheduler")?;

    let output = json!({ "report": report, "stats": stats });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
