use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Stampede Load Testing Tool
#[derive(Parser, Debug)]
#[command(name = "stampede")]
#[command(about = "Scenario-based load generation for HTTP services")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the scenarios declared in a config file
    Run(RunArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Path to the run configuration (JSON)
    #[arg(long, short, env = "STAMPEDE_CONFIG")]
    pub config: PathBuf,

    /// Override the target base URL from the config
    #[arg(long, env = "BASE_URL")]
    pub base_url: Option<String>,

    /// Live metrics reporting interval in seconds (0 disables the live view)
    #[arg(long, default_value = "5")]
    pub report_interval: u64,

    /// Final summary format
    #[arg(long, value_enum, default_value = "text")]
    pub summary_format: SummaryFormat,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryFormat {
    Text,
    Json,
}
