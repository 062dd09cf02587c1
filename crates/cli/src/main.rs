// Inferload CLI
//
// Design Decision: Use clap derive with env fallbacks so runs can be driven by flags or a .env file.
// Design Decision: Report on stdout, logs on stderr, so output can be piped into other tools.
// Design Decision: Support text/json output formats for scripting.

mod args;
mod commands;
mod output;

use clap::{Parser, Subcommand};
use inferload_core::telemetry::{init_telemetry, TelemetryConfig};

#[derive(Parser)]
#[command(name = "inferload")]
#[command(about = "Inferload - Constant-rate load testing for HTTP inference endpoints")]
#[command(version)]
pub struct Cli {
    /// Output format
    #[arg(long, short, global = true, default_value = "text", value_parser = ["text", "json"])]
    pub output: String,

    /// Log filter (overrides RUST_LOG / LOG_LEVEL)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a load test, one run per rate of --rps
    Run(commands::run::RunArgs),

    /// Print synthesized request bodies as JSON lines without sending them
    Preview(commands::preview::PreviewArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before parsing so it can feed the env fallbacks
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();

    let mut telemetry_config = TelemetryConfig::from_env("inferload");
    if let Some(filter) = &cli.log_level {
        telemetry_config = telemetry_config.with_log_filter(filter);
    }
    init_telemetry(&telemetry_config);

    if let Ok(path) = dotenv {
        tracing::debug!("Loaded .env from {:?}", path);
    }

    let output_format = output::OutputFormat::from_str(&cli.output);

    match cli.command {
        Commands::Run(args) => commands::run::run(args, output_format).await,
        Commands::Preview(args) => commands::preview::run(args),
    }
}
