//! Run report
//!
//! Turns a finalized metrics snapshot into the end-of-run summary: the HTTP
//! layer's duration trend is exposed as `end_to_end_latency`, every
//! pass-through metric is removed, and the rest is rendered as text or JSON.

use std::fmt::Write as _;

use serde::Serialize;

use crate::config::{Distribution, RunConfig};
use crate::metrics::{names, MetricValue, MetricsSnapshot};
use crate::scheduler::RunStats;

/// Name prefixes of metrics produced by the HTTP layer
const PASS_THROUGH_PREFIXES: [&str; 3] = ["iteration", "data", "http"];

/// Whether `name` is a pass-through metric excluded from the report
pub fn is_pass_through(name: &str) -> bool {
    PASS_THROUGH_PREFIXES
        .iter()
        .any(|prefix| name.starts_with(prefix))
}

/// Rename and filter a raw snapshot.
///
/// `http_req_duration` is copied to `end_to_end_latency`, then every metric
/// whose name starts with `iteration`, `data` or `http` is dropped. Applying
/// this twice yields the same map as applying it once.
pub fn filter_metrics(snapshot: &MetricsSnapshot) -> MetricsSnapshot {
    let mut filtered: MetricsSnapshot = snapshot
        .iter()
        .filter(|(name, _)| !is_pass_through(name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();

    if let Some(duration) = snapshot.get(names::HTTP_REQ_DURATION) {
        filtered.insert(names::END_TO_END_LATENCY.to_string(), duration.clone());
    }
    filtered
}

/// Parameters of the run, echoed in the report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunParams {
    pub model: String,
    pub target: String,
    pub rate: f64,
    pub duration_secs: f64,
    pub timeout_secs: f64,
    pub max_tokens: Distribution,
    pub prompt_len: Distribution,
    pub prompt_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chars_per_token: Option<u32>,
    pub max_in_flight: usize,
}

impl From<&RunConfig> for RunParams {
    fn from(config: &RunConfig) -> Self {
        let target = match config.target.resolve() {
            Ok(url) => url.to_string(),
            Err(_) => String::new(),
        };
        Self {
            model: config.model.clone(),
            target,
            rate: config.rate,
            duration_secs: config.duration.as_secs_f64(),
            timeout_secs: config.timeout.as_secs_f64(),
            max_tokens: config.max_tokens,
            prompt_len: config.prompt_len,
            prompt_type: config.prompt_source.to_string(),
            chars_per_token: config.chars_per_token,
            max_in_flight: config.max_in_flight,
        }
    }
}

/// End-of-run report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub params: RunParams,
    pub stats: RunStats,
    pub metrics: MetricsSnapshot,
}

impl RunReport {
    /// Build a report from a raw (unfiltered) snapshot
    pub fn new(config: &RunConfig, stats: RunStats, raw: &MetricsSnapshot) -> Self {
        Self {
            params: RunParams::from(config),
            stats,
            metrics: filter_metrics(raw),
        }
    }

    /// Single-line JSON, so that sweeps print one report per line
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Text summary, one dotted line per metric
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let p = &self.params;

        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "  scenario: {:.2} req/s for {} against {}",
            p.rate,
            format_secs(p.duration_secs),
            p.target
        );
        let _ = writeln!(
            out,
            "     model: {} (prompt: {}, max_tokens ~ N({}, {}), prompt_len ~ N({}, {}))",
            p.model,
            p.prompt_type,
            p.max_tokens.mean,
            p.max_tokens.stddev,
            p.prompt_len.mean,
            p.prompt_len.stddev
        );
        let _ = writeln!(out);

        let width = self
            .metrics
            .keys()
            .map(|name| name.chars().count())
            .max()
            .unwrap_or(0)
            + 3;

        for (name, value) in &self.metrics {
            let dots = ".".repeat(width - name.chars().count());
            let _ = writeln!(out, "     {}{}: {}", name, dots, format_value(value));
        }

        let s = &self.stats;
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "  issued={} completed={} dropped={} elapsed={}",
            s.issued,
            s.completed,
            s.dropped,
            format_millis(s.elapsed.as_secs_f64() * 1000.0)
        );
        out
    }
}

fn format_value(value: &MetricValue) -> String {
    match value {
        MetricValue::Counter { count, rate } => format!("{:<8} {:.2}/s", count, rate),
        MetricValue::Rate { rate, hits, total } => {
            format!("{:.2}% {} out of {}", rate * 100.0, hits, total)
        }
        MetricValue::Trend(t) => format!(
            "avg={} min={} med={} max={} p(90)={} p(95)={}",
            format_millis(t.avg),
            format_millis(t.min),
            format_millis(t.med),
            format_millis(t.max),
            format_millis(t.p90),
            format_millis(t.p95)
        ),
    }
}

/// Human-readable duration from milliseconds
pub fn format_millis(ms: f64) -> String {
    if ms < 1.0 {
        format!("{:.2}µs", ms * 1000.0)
    } else if ms < 1000.0 {
        format!("{:.2}ms", ms)
    } else {
        format!("{:.2}s", ms / 1000.0)
    }
}

fn format_secs(secs: f64) -> String {
    if secs.fract() == 0.0 {
        format!("{}s", secs as u64)
    } else {
        format!("{:.2}s", secs)
    }
}
