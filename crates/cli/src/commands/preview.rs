// Payload preview command
//
// Dry run: synthesizes request bodies exactly as `run` would and prints them
// as JSON lines without contacting the target.

use anyhow::{Context, Result};
use clap::Args;
use inferload_core::{build_payload, Corpus};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::args::LoadArgs;
use crate::output::OutputFormat;

#[derive(Args, Debug, Clone)]
pub struct PreviewArgs {
    #[command(flatten)]
    pub load: LoadArgs,

    /// Number of payloads to print
    #[arg(long, short = 'n', default_value_t = 5)]
    pub count: usize,

    /// Seed for reproducible previews
    #[arg(long)]
    pub seed: Option<u64>,
}

pub fn run(args: PreviewArgs) -> Result<()> {
    let rate = args.load.rps.rates().first().copied().unwrap_or_default();
    let config = args
        .load
        .run_config(rate)
        .context("Invalid load test configuration")?;
    let corpus = Corpus::for_config(&config).context("Failed to load prompt corpus")?;

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let url = config.target.resolve()?;
    tracing::info!(
        count = args.count,
        url = %url,
        prompt_type = %config.prompt_source,
        "Previewing payloads"
    );

    for _ in 0..args.count {
        let body = build_payload(&config, &corpus, &mut rng);
        OutputFormat::print_json_line(&body)?;
    }

    Ok(())
}
