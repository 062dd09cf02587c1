// Load test arguments shared by `run` and `preview`
//
// Every flag falls back to the environment variable of the same name, so a
// .env file or the caller's environment can drive the whole configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use inferload_core::config::DEFAULT_RESULTS_DIR;
use inferload_core::{ConfigError, Distribution, PromptSource, RateSweep, RunConfig, Target};

#[derive(Args, Debug, Clone)]
pub struct LoadArgs {
    /// Requests per second: N, start:end or start:end:step (one run per rate)
    #[arg(long, env = "RPS", default_value = "10")]
    pub rps: RateSweep,

    /// Model identifier sent in every request
    #[arg(long, env = "MODEL_NAME")]
    pub model_name: String,

    /// Mean of the output token budget
    #[arg(long, env = "MAX_TOKENS_MEAN", default_value_t = 128.0)]
    pub max_tokens_mean: f64,

    /// Standard deviation of the output token budget
    #[arg(long, env = "MAX_TOKENS_STD", default_value_t = 20.0)]
    pub max_tokens_std: f64,

    /// Mean prompt length
    #[arg(long, env = "PROMPT_LEN_MEAN", default_value_t = 100.0)]
    pub prompt_len_mean: f64,

    /// Standard deviation of the prompt length
    #[arg(long, env = "PROMPT_LEN_STD", default_value_t = 30.0)]
    pub prompt_len_std: f64,

    /// How long to keep issuing requests (e.g. "10s", "2m")
    #[arg(long, env = "DURATION", default_value = "10s", value_parser = humantime::parse_duration)]
    pub duration: Duration,

    /// Prompt source: random (filler text) or corpus (alias: code)
    #[arg(long, env = "PROMPT_TYPE", default_value = "random")]
    pub prompt_type: PromptSource,

    /// Directory holding prompts.json
    #[arg(long, env = "RESULTS_DIR", default_value = DEFAULT_RESULTS_DIR)]
    pub results_dir: PathBuf,

    /// Inference endpoint URL (direct mode)
    #[arg(long, env = "ENDPOINT_URL")]
    pub endpoint_url: Option<String>,

    /// Relay base URL (relay mode, takes precedence over --endpoint-url)
    #[arg(long, env = "RELAY_URL")]
    pub relay_url: Option<String>,

    /// Route appended to the relay URL (or to the endpoint URL in direct mode)
    #[arg(long, env = "API_ROUTE")]
    pub api_route: Option<String>,

    /// Per-request timeout (e.g. "60s")
    #[arg(long, env = "REQUEST_TIMEOUT", value_parser = humantime::parse_duration)]
    pub timeout: Duration,

    /// Characters generated per sampled prompt unit (0 disables expansion)
    #[arg(long, env = "CHARS_PER_TOKEN", default_value_t = 4)]
    pub chars_per_token: u32,

    /// Maximum number of outstanding requests; further attempts are dropped
    #[arg(long, env = "MAX_IN_FLIGHT", default_value_t = 500)]
    pub max_in_flight: usize,
}

impl LoadArgs {
    /// Resolve the request target from the URL flags
    pub fn target(&self) -> Result<Target, ConfigError> {
        match (&self.relay_url, &self.endpoint_url, &self.api_route) {
            (Some(relay), _, Some(route)) => Ok(Target::relay(relay.as_str(), route.as_str())),
            (Some(_), _, None) => Err(ConfigError::InvalidRoute(String::new())),
            (None, Some(endpoint), Some(route)) => {
                if !route.starts_with('/') {
                    return Err(ConfigError::InvalidRoute(route.clone()));
                }
                Ok(Target::direct(format!(
                    "{}{}",
                    endpoint.trim_end_matches('/'),
                    route
                )))
            }
            (None, Some(endpoint), None) => Ok(Target::direct(endpoint.as_str())),
            (None, None, _) => Err(ConfigError::MissingTarget),
        }
    }

    /// Build and validate the configuration for one run at `rate`
    pub fn run_config(&self, rate: f64) -> Result<RunConfig, ConfigError> {
        let chars_per_token = match self.chars_per_token {
            0 => None,
            n => Some(n),
        };
        let config = RunConfig::new(&self.model_name, self.target()?, self.timeout)
            .with_rate(rate)
            .with_duration(self.duration)
            .with_max_tokens(Distribution::new(self.max_tokens_mean, self.max_tokens_std))
            .with_prompt_len(Distribution::new(self.prompt_len_mean, self.prompt_len_std))
            .with_prompt_source(self.prompt_type)
            .with_chars_per_token(chars_per_token)
            .with_max_in_flight(self.max_in_flight)
            .with_results_dir(&self.results_dir);
        config.validate()?;
        Ok(config)
    }

    /// Configurations for every rate of the sweep, all validated up front
    pub fn run_configs(&self) -> Result<Vec<RunConfig>, ConfigError> {
        self.rps
            .rates()
            .iter()
            .map(|rate| self.run_config(*rate))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        load: LoadArgs,
    }

    fn parse(args: &[&str]) -> LoadArgs {
        let mut argv = vec!["inferload", "--model-name", "m", "--timeout", "60s"];
        argv.extend_from_slice(args);
        TestCli::try_parse_from(argv).unwrap().load
    }

    #[test]
    fn test_defaults() {
        let args = parse(&["--endpoint-url", "http://localhost:8000/v1/chat/completions"]);
        assert_eq!(args.rps.rates(), &[10.0]);
        assert_eq!(args.duration, Duration::from_secs(10));
        assert_eq!(args.prompt_type, PromptSource::Random);
        assert_eq!(args.chars_per_token, 4);
        assert_eq!(args.max_in_flight, 500);

        let config = args.run_config(10.0).unwrap();
        assert_eq!(config.max_tokens, Distribution::new(128.0, 20.0));
        assert_eq!(config.prompt_len, Distribution::new(100.0, 30.0));
        assert_eq!(config.chars_per_token, Some(4));
        assert_eq!(config.timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_relay_target() {
        let args = parse(&[
            "--relay-url",
            "http://localhost:9000",
            "--api-route",
            "/v1/chat/completions",
        ]);
        assert_eq!(
            args.target().unwrap(),
            Target::relay("http://localhost:9000", "/v1/chat/completions")
        );
    }

    #[test]
    fn test_direct_target_with_route() {
        let args = parse(&[
            "--endpoint-url",
            "http://localhost:8000/",
            "--api-route",
            "/v1/chat/completions",
        ]);
        assert_eq!(
            args.target().unwrap(),
            Target::direct("http://localhost:8000/v1/chat/completions")
        );
    }

    #[test]
    fn test_missing_target() {
        let args = parse(&[]);
        assert_eq!(args.target(), Err(ConfigError::MissingTarget));
        assert!(args.run_config(1.0).is_err());
    }

    #[test]
    fn test_sweep_and_expansion_flags() {
        let args = parse(&[
            "--endpoint-url",
            "http://localhost:8000/v1/chat/completions",
            "--rps",
            "2:6:2",
            "--chars-per-token",
            "0",
            "--prompt-type",
            "code",
            "--duration",
            "1m",
        ]);
        let configs = args.run_configs().unwrap();
        let rates: Vec<f64> = configs.iter().map(|c| c.rate).collect();
        assert_eq!(rates, vec![2.0, 4.0, 6.0]);
        assert!(configs.iter().all(|c| c.chars_per_token.is_none()));
        assert!(configs
            .iter()
            .all(|c| c.prompt_source == PromptSource::Corpus));
        assert_eq!(configs[0].duration, Duration::from_secs(60));
    }

    #[test]
    fn test_timeout_is_required() {
        let result = TestCli::try_parse_from(["inferload", "--model-name", "m"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_sweep_is_rejected() {
        let result = TestCli::try_parse_from([
            "inferload",
            "--model-name",
            "m",
            "--timeout",
            "5s",
            "--rps",
            "5:1",
        ]);
        assert!(result.is_err());
    }
}
