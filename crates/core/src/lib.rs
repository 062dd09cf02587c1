// Load Generation Core
//
// Drives synthetic traffic against an HTTP inference endpoint at a constant
// arrival rate and summarizes what happened.
//
// Key design decisions:
// - Requests are issued on a fixed clock, never throttled by response latency
// - Each request's prompt length and token budget are drawn from normal distributions
// - Transport is behind the RequestExecutor trait so scheduling can be tested without a network
// - Per-request failures are metrics, never errors; only startup problems return Err
// - Metrics live in an injected registry, finalized once at run end

pub mod config;
pub mod corpus;
pub mod error;
pub mod executor;
pub mod metrics;
pub mod payload;
pub mod readiness;
pub mod report;
pub mod sampler;
pub mod scheduler;
pub mod sweep;

// Logging (tracing-subscriber, stderr)
pub mod telemetry;

// Re-exports for convenience
pub use config::{Distribution, PromptSource, RunConfig, Target};
pub use corpus::Corpus;
pub use error::{ConfigError, CorpusError, LoadError, Result};
pub use executor::{HttpExecutor, RequestExecutor, RequestOutcome, ResponseBody};
pub use metrics::{MetricValue, MetricsRegistry, MetricsSnapshot};
pub use payload::{build_payload, ChatMessage, ChatRequest, SampledRequestParams};
pub use readiness::Readiness;
pub use report::{filter_metrics, RunReport};
pub use sampler::sample_normal;
pub use scheduler::{LoadRunner, RunStats};
pub use sweep::RateSweep;
