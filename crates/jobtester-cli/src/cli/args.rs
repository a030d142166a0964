use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(
    name = "jobtester",
    version,
    about = "Send test jobs to every orchestrator a gateway knows about and report the results"
)]
pub struct Cli {
    /// Log output format (stderr)
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run one full test pass over the fleet
    Run(RunArgs),
    /// Copy raw transcoding stats from one collector to another
    Transfer(TransferArgs),
    Version,
}

#[derive(Parser, Clone, Debug)]
pub struct RunArgs {
    /// JSON or YAML configuration file
    #[arg(short = 'f', long = "config", default_value = "configs/config.json")]
    pub config: PathBuf,

    /// Override the configured number of jobs in flight
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Do not start the /orchestrators callback server
    #[arg(long)]
    pub no_server: bool,

    /// Exit 1 when any job failed or hit a tester error
    #[arg(long)]
    pub fail_on_job_failure: bool,
}

#[derive(Parser, Clone, Debug)]
pub struct TransferArgs {
    /// Collector to read raw stats from
    #[arg(long)]
    pub source_api: String,

    /// Collector to post stats to
    #[arg(long)]
    pub api: String,

    /// Gateway CLI endpoint listing registered orchestrators
    #[arg(long)]
    pub gw: String,

    /// HMAC secret of the destination collector
    #[arg(long, env = "JOBTESTER_METRICS_SECRET", hide_env_values = true)]
    pub secret: String,

    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,

    /// Accept invalid TLS certificates
    #[arg(long)]
    pub insecure_tls: bool,
}
