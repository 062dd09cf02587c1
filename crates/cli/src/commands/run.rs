// Load test command
//
// Validates every run configuration and loads the corpus before touching the
// network, optionally waits for the server, then executes one run per rate.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use inferload_core::readiness::DEFAULT_RETRIES;
use inferload_core::{Corpus, HttpExecutor, LoadRunner, MetricsRegistry, Readiness, RunReport};

use crate::args::LoadArgs;
use crate::output::OutputFormat;

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub load: LoadArgs,

    /// Poll <URL>/health until it answers 200 before starting
    #[arg(long, value_name = "URL")]
    pub wait_for: Option<String>,

    /// Number of health probes before giving up
    #[arg(long, default_value_t = DEFAULT_RETRIES)]
    pub wait_retries: u32,

    /// Delay between health probes
    #[arg(long, default_value = "10s", value_parser = humantime::parse_duration)]
    pub wait_interval: Duration,

    /// Extra delay after the server is healthy
    #[arg(long, default_value = "0s", value_parser = humantime::parse_duration)]
    pub warmup: Duration,
}

impl RunArgs {
    fn readiness(&self) -> Result<Option<Readiness>> {
        let Some(url) = &self.wait_for else {
            return Ok(None);
        };
        let readiness = Readiness::new(url)?
            .with_retries(self.wait_retries)
            .with_interval(self.wait_interval)
            .with_warmup(self.warmup);
        Ok(Some(readiness))
    }
}

pub async fn run(args: RunArgs, output: OutputFormat) -> Result<()> {
    let configs = args
        .load
        .run_configs()
        .context("Invalid load test configuration")?;
    let readiness = args.readiness()?;

    // Every config of a sweep shares prompt source and results dir
    let corpus = match configs.first() {
        Some(config) => Corpus::for_config(config).context("Failed to load prompt corpus")?,
        None => return Ok(()),
    };

    if let Some(readiness) = readiness {
        readiness
            .wait(&reqwest::Client::new())
            .await
            .context("Server did not become ready")?;
    }

    let total = configs.len();
    for (index, config) in configs.into_iter().enumerate() {
        if total > 1 {
            tracing::info!(run = index + 1, total, rate = config.rate, "Starting sweep step");
        }

        // Each sweep step aggregates into its own registry
        let metrics = Arc::new(MetricsRegistry::new());
        let executor = HttpExecutor::from_config(&config)?;
        let runner = LoadRunner::new(config.clone(), corpus.clone(), executor)?
            .with_metrics(metrics.clone());
        let stats = runner.run().await;
        let raw = metrics.finalize()?;

        let report = RunReport::new(&config, stats, &raw);
        output.print_report(&report)?;
    }

    Ok(())
}
