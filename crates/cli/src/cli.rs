use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Driver for the jobsys worker pool.
///
/// Runs a synthetic workload against a scheduler built from the same
/// configuration an embedding application would use, and reports its stats.
#[derive(Parser, Debug)]
#[command(name = "jobsys", version, about = "Parallel job scheduler driver")]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Post a synthetic workload, wait for it and print scheduler stats
    Run(RunArgs),

    /// Print the resolved scheduler configuration as JSON
    Config(ConfigArgs),
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Path to a TOML config file with a [scheduler] table
    #[arg(long, env = "JOBSYS_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Number of independent jobs to post, spread over every priority
    #[arg(long, env = "JOBSYS_JOBS", default_value_t = 1000)]
    pub jobs: usize,

    /// Number of jobs a fan-out job chains onto itself
    #[arg(long, env = "JOBSYS_CHAIN", default_value_t = 64)]
    pub chain: usize,

    /// Make every K-th job fail (0 disables failures)
    #[arg(long, env = "JOBSYS_FAIL_EVERY", default_value_t = 0)]
    pub fail_every: usize,

    /// Worker thread count override (0 = available parallelism)
    #[arg(long)]
    pub workers: Option<usize>,

    #[command(flatten)]
    pub config: ConfigArgs,
}
