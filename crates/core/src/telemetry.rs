// Logging setup
//
// Logs go to stderr so that stdout carries only the run report.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Filter used when neither RUST_LOG nor LOG_LEVEL is set
pub const DEFAULT_LOG_FILTER: &str = "info";

// ============================================================================
// Telemetry Configuration
// ============================================================================

/// Configuration for log output
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name, attached to the startup log line
    pub service_name: String,
    /// Whether to enable console logging
    pub enable_console: bool,
    /// Log filter (e.g., "info", "debug", "inferload_core=debug")
    pub log_filter: Option<String>,
    /// Whether to print the event target with each line
    pub with_target: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "inferload".to_string(),
            enable_console: true,
            log_filter: None,
            with_target: true,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `RUST_LOG` or `LOG_LEVEL`: Log filter
    pub fn from_env(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            log_filter: std::env::var("RUST_LOG")
                .ok()
                .or_else(|| std::env::var("LOG_LEVEL").ok()),
            ..Self::default()
        }
    }

    /// Override the filter (e.g. from a `--verbose` flag)
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = Some(filter.into());
        self
    }

    /// The filter that will be installed; invalid directives fall back to the default
    pub fn env_filter(&self) -> EnvFilter {
        self.log_filter
            .as_ref()
            .and_then(|f| EnvFilter::try_new(f).ok())
            .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
    }
}

// ============================================================================
// Initialization
// ============================================================================

/// Install the global subscriber.
///
/// Calling this more than once keeps the first subscriber.
pub fn init_telemetry(config: &TelemetryConfig) {
    let console_layer = if config.enable_console {
        Some(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(config.with_target)
                .with_filter(config.env_filter()),
        )
    } else {
        None
    };

    if tracing_subscriber::registry()
        .with(console_layer)
        .try_init()
        .is_ok()
    {
        tracing::debug!(service = %config.service_name, "Logging initialized");
    }
}
