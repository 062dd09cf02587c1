// Error types for load generation
//
// Only startup errors are surfaced here. Per-request failures (transport,
// protocol, decode) are folded into the metrics and never become an Err.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for load generation operations
pub type Result<T> = std::result::Result<T, LoadError>;

/// Invalid run configuration, detected before any request is scheduled
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("model identifier is required")]
    MissingModel,

    #[error("a target is required: set an endpoint URL or a relay URL")]
    MissingTarget,

    #[error("request rate must be a positive number, got {0}")]
    InvalidRate(f64),

    #[error("run duration must be greater than zero")]
    InvalidDuration,

    #[error("request timeout must be greater than zero")]
    InvalidTimeout,

    #[error("in-flight ceiling must be at least 1")]
    InvalidConcurrency,

    #[error("invalid {name} distribution: mean={mean}, stddev={stddev}")]
    InvalidDistribution {
        name: &'static str,
        mean: f64,
        stddev: f64,
    },

    #[error("characters per token must be at least 1")]
    InvalidExpansion,

    #[error("invalid target URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("API route must start with '/', got '{0}'")]
    InvalidRoute(String),

    #[error("unknown prompt type '{0}' (expected 'random' or 'corpus')")]
    UnknownPromptSource(String),

    #[error("invalid rate sweep '{0}': expected N, start:end or start:end:step")]
    InvalidSweep(String),
}

/// Errors loading the prompt corpus
#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("failed to read corpus file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corpus file {path} is not a JSON array of strings: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Top-level error for a load test
#[derive(Debug, Error)]
pub enum LoadError {
    /// Configuration rejected at startup
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Corpus could not be loaded
    #[error("Corpus error: {0}")]
    Corpus(#[from] CorpusError),

    /// Target never reported healthy
    #[error("Server at {url} did not become ready after {attempts} attempts")]
    NotReady { url: String, attempts: u32 },

    /// Metrics were already finalized for this run
    #[error("Metrics already finalized")]
    AlreadyFinalized,

    /// HTTP client could not be constructed
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

impl LoadError {
    /// Create a not-ready error
    pub fn not_ready(url: impl Into<String>, attempts: u32) -> Self {
        LoadError::NotReady {
            url: url.into(),
            attempts,
        }
    }

    /// Whether this error comes from configuration validation
    pub fn is_config(&self) -> bool {
        matches!(self, LoadError::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_converts_into_load_error() {
        let err: LoadError = ConfigError::MissingModel.into();
        assert!(err.is_config());
        assert_eq!(
            err.to_string(),
            "Configuration error: model identifier is required"
        );
    }

    #[test]
    fn test_not_ready_message() {
        let err = LoadError::not_ready("http://localhost:8000", 3);
        assert!(!err.is_config());
        assert_eq!(
            err.to_string(),
            "Server at http://localhost:8000 did not become ready after 3 attempts"
        );
    }
}
