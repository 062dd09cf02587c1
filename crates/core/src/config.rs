// Run configuration
//
// RunConfig is built once at startup (usually from CLI flags and environment)
// and validated before the scheduler starts. After that it is shared
// read-only behind an Arc for the whole run.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

use crate::error::ConfigError;

/// Default arrival rate (requests per second)
pub const DEFAULT_RATE: f64 = 10.0;
/// Default run duration
pub const DEFAULT_DURATION: Duration = Duration::from_secs(10);
/// Default in-flight ceiling (pre-allocated virtual callers)
pub const DEFAULT_MAX_IN_FLIGHT: usize = 500;
/// Default directory holding `prompts.json`
pub const DEFAULT_RESULTS_DIR: &str = "./load_test_results";
/// Corpus file name inside the results directory
pub const CORPUS_FILE_NAME: &str = "prompts.json";

/// Mean and standard deviation of a normally distributed parameter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    pub mean: f64,
    pub stddev: f64,
}

impl Distribution {
    pub const fn new(mean: f64, stddev: f64) -> Self {
        Self { mean, stddev }
    }

    /// A distribution that always yields its mean
    pub const fn fixed(value: f64) -> Self {
        Self::new(value, 0.0)
    }

    fn validate(&self, name: &'static str) -> Result<(), ConfigError> {
        if self.mean.is_finite() && self.stddev.is_finite() && self.stddev >= 0.0 {
            Ok(())
        } else {
            Err(ConfigError::InvalidDistribution {
                name,
                mean: self.mean,
                stddev: self.stddev,
            })
        }
    }
}

/// Where prompt text comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptSource {
    /// Repeated filler phrase
    #[default]
    Random,
    /// Entries of a preloaded corpus
    Corpus,
}

impl FromStr for PromptSource {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "random" => Ok(PromptSource::Random),
            // "code" is the name the corpus of code prompts has always been run under
            "corpus" | "code" => Ok(PromptSource::Corpus),
            other => Err(ConfigError::UnknownPromptSource(other.to_string())),
        }
    }
}

impl fmt::Display for PromptSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromptSource::Random => write!(f, "random"),
            PromptSource::Corpus => write!(f, "corpus"),
        }
    }
}

/// Request target: the inference endpoint itself, or a relay in front of it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum Target {
    /// Send straight to the endpoint URL
    Direct { url: String },
    /// Send to `base_url + route` on a forwarding relay
    Relay { base_url: String, route: String },
}

impl Target {
    pub fn direct(url: impl Into<String>) -> Self {
        Target::Direct { url: url.into() }
    }

    pub fn relay(base_url: impl Into<String>, route: impl Into<String>) -> Self {
        Target::Relay {
            base_url: base_url.into(),
            route: route.into(),
        }
    }

    /// Resolve the URL every request is POSTed to
    pub fn resolve(&self) -> Result<Url, ConfigError> {
        let raw = match self {
            Target::Direct { url } => url.trim().to_string(),
            Target::Relay { base_url, route } => {
                if !route.starts_with('/') {
                    return Err(ConfigError::InvalidRoute(route.clone()));
                }
                format!("{}{}", base_url.trim().trim_end_matches('/'), route)
            }
        };

        if raw.is_empty() {
            return Err(ConfigError::MissingTarget);
        }

        let url = Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl {
            url: raw.clone(),
            reason: e.to_string(),
        })?;

        match url.scheme() {
            "http" | "https" => Ok(url),
            scheme => Err(ConfigError::InvalidUrl {
                url: raw,
                reason: format!("unsupported scheme '{}'", scheme),
            }),
        }
    }
}

/// Configuration for one load test run
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    /// Model identifier sent in every request body
    pub model: String,
    /// Where requests go
    pub target: Target,
    /// Target arrival rate (requests per second)
    pub rate: f64,
    /// How long new requests are scheduled for
    pub duration: Duration,
    /// Output token budget distribution
    pub max_tokens: Distribution,
    /// Prompt length distribution (in words/tokens before expansion)
    pub prompt_len: Distribution,
    /// Prompt text source
    pub prompt_source: PromptSource,
    /// Per-request timeout, enforced by the executor
    pub timeout: Duration,
    /// Characters generated per sampled prompt unit, when no tokenizer is available
    pub chars_per_token: Option<u32>,
    /// Upper bound on concurrently outstanding requests
    pub max_in_flight: usize,
    /// Directory holding the corpus file
    pub results_dir: PathBuf,
}

impl RunConfig {
    /// Create a configuration with default rate, duration and distributions.
    ///
    /// The timeout has no default on purpose: callers must pick one.
    pub fn new(model: impl Into<String>, target: Target, timeout: Duration) -> Self {
        Self {
            model: model.into(),
            target,
            rate: DEFAULT_RATE,
            duration: DEFAULT_DURATION,
            max_tokens: Distribution::new(128.0, 20.0),
            prompt_len: Distribution::new(100.0, 30.0),
            prompt_source: PromptSource::Random,
            timeout,
            chars_per_token: None,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            results_dir: PathBuf::from(DEFAULT_RESULTS_DIR),
        }
    }

    pub fn with_rate(mut self, rate: f64) -> Self {
        self.rate = rate;
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_max_tokens(mut self, distribution: Distribution) -> Self {
        self.max_tokens = distribution;
        self
    }

    pub fn with_prompt_len(mut self, distribution: Distribution) -> Self {
        self.prompt_len = distribution;
        self
    }

    pub fn with_prompt_source(mut self, source: PromptSource) -> Self {
        self.prompt_source = source;
        self
    }

    pub fn with_chars_per_token(mut self, chars_per_token: Option<u32>) -> Self {
        self.chars_per_token = chars_per_token;
        self
    }

    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight;
        self
    }

    pub fn with_results_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.results_dir = dir.into();
        self
    }

    /// Path of the corpus file (`<results_dir>/prompts.json`)
    pub fn corpus_path(&self) -> PathBuf {
        self.results_dir.join(CORPUS_FILE_NAME)
    }

    /// Interval between two scheduled attempts.
    ///
    /// Fails when the rate is not positive, or when `1 / rate` is zero or
    /// too large for a `Duration`.
    pub fn period(&self) -> Result<Duration, ConfigError> {
        if !(self.rate.is_finite() && self.rate > 0.0) {
            return Err(ConfigError::InvalidRate(self.rate));
        }
        match Duration::try_from_secs_f64(1.0 / self.rate) {
            Ok(period) if !period.is_zero() => Ok(period),
            _ => Err(ConfigError::InvalidRate(self.rate)),
        }
    }

    /// Check every invariant; the run must not start if this fails
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::MissingModel);
        }
        self.period()?;
        if self.duration.is_zero() {
            return Err(ConfigError::InvalidDuration);
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout);
        }
        if self.max_in_flight == 0 {
            return Err(ConfigError::InvalidConcurrency);
        }
        if self.chars_per_token == Some(0) {
            return Err(ConfigError::InvalidExpansion);
        }
        self.max_tokens.validate("max tokens")?;
        self.prompt_len.validate("prompt length")?;
        self.target.resolve()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> RunConfig {
        RunConfig::new(
            "meta-llama/Llama-3.1-8B-Instruct",
            Target::direct("http://localhost:8000/v1/chat/completions"),
            Duration::from_secs(60),
        )
    }

    #[test]
    fn test_defaults_validate() {
        let config = base();
        assert_eq!(config.rate, 10.0);
        assert_eq!(config.duration, Duration::from_secs(10));
        assert_eq!(config.max_tokens, Distribution::new(128.0, 20.0));
        assert_eq!(config.prompt_len, Distribution::new(100.0, 30.0));
        assert_eq!(config.max_in_flight, 500);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_non_positive_values() {
        assert_eq!(
            base().with_rate(0.0).validate(),
            Err(ConfigError::InvalidRate(0.0))
        );
        assert_eq!(
            base().with_rate(1e12).validate(),
            Err(ConfigError::InvalidRate(1e12))
        );
        assert_eq!(
            base().with_rate(1e-30).validate(),
            Err(ConfigError::InvalidRate(1e-30))
        );
        assert_eq!(
            base().with_rate(-2.0).period(),
            Err(ConfigError::InvalidRate(-2.0))
        );
        assert_eq!(
            base().with_duration(Duration::ZERO).validate(),
            Err(ConfigError::InvalidDuration)
        );
        let mut config = base();
        config.timeout = Duration::ZERO;
        assert_eq!(config.validate(), Err(ConfigError::InvalidTimeout));
        assert_eq!(
            base().with_max_in_flight(0).validate(),
            Err(ConfigError::InvalidConcurrency)
        );
    }

    #[test]
    fn test_rejects_missing_model_and_target() {
        let mut config = base();
        config.model = "  ".to_string();
        assert_eq!(config.validate(), Err(ConfigError::MissingModel));

        let mut config = base();
        config.target = Target::direct("");
        assert_eq!(config.validate(), Err(ConfigError::MissingTarget));
    }

    #[test]
    fn test_rejects_negative_stddev() {
        let err = base()
            .with_prompt_len(Distribution::new(100.0, -1.0))
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDistribution { .. }));
    }

    #[test]
    fn test_relay_target_joins_route() {
        let target = Target::relay("http://localhost:9000/", "/v1/chat/completions");
        assert_eq!(
            target.resolve().unwrap().as_str(),
            "http://localhost:9000/v1/chat/completions"
        );

        let bad = Target::relay("http://localhost:9000", "v1/chat");
        assert_eq!(
            bad.resolve(),
            Err(ConfigError::InvalidRoute("v1/chat".to_string()))
        );
    }

    #[test]
    fn test_rejects_non_http_scheme() {
        let err = Target::direct("ftp://example.com").resolve().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl { .. }));
    }

    #[test]
    fn test_prompt_source_parsing() {
        assert_eq!("random".parse::<PromptSource>(), Ok(PromptSource::Random));
        assert_eq!("corpus".parse::<PromptSource>(), Ok(PromptSource::Corpus));
        assert_eq!("code".parse::<PromptSource>(), Ok(PromptSource::Corpus));
        assert!("lorem".parse::<PromptSource>().is_err());
    }

    #[test]
    fn test_corpus_path_and_period() {
        let config = base().with_results_dir("/tmp/results").with_rate(4.0);
        assert_eq!(config.corpus_path(), PathBuf::from("/tmp/results/prompts.json"));
        assert_eq!(config.period(), Ok(Duration::from_millis(250)));
    }
}
