//! Metrics aggregation
//!
//! A registry of named metrics shared by every in-flight attempt. Counters
//! and rates are plain atomics; trends keep raw samples behind a mutex for
//! percentile extraction. The registry is finalized exactly once at run end.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::error::{LoadError, Result};
use crate::executor::RequestOutcome;

/// Metric names
pub mod names {
    // Custom metrics (kept in the final report)
    /// Fraction of requests classified as failed
    pub const FAILED_REQUESTS: &str = "failed_requests";
    /// Request latency, renamed from the HTTP layer's duration at report time
    pub const END_TO_END_LATENCY: &str = "end_to_end_latency";
    /// Attempts skipped because the in-flight ceiling was reached
    pub const DROPPED_ITERATIONS: &str = "dropped_iterations";

    // Pass-through metrics from the HTTP layer (filtered out of the report)
    pub const HTTP_REQ_DURATION: &str = "http_req_duration";
    pub const HTTP_REQS: &str = "http_reqs";
    pub const HTTP_REQ_FAILED: &str = "http_req_failed";
    pub const DATA_SENT: &str = "data_sent";
    pub const DATA_RECEIVED: &str = "data_received";
    pub const ITERATIONS: &str = "iterations";
}

/// Histogram for latency measurements
#[derive(Debug)]
pub struct LatencyHistogram {
    /// Raw samples (for percentile calculation)
    samples: Mutex<Vec<Duration>>,
    /// Sum of all samples (for mean calculation)
    sum_micros: AtomicU64,
    /// Count of samples
    count: AtomicU64,
    /// Min latency observed
    min_micros: AtomicU64,
    /// Max latency observed
    max_micros: AtomicU64,
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}

impl LatencyHistogram {
    pub fn new() -> Self {
        Self {
            samples: Mutex::new(Vec::with_capacity(1_024)),
            sum_micros: AtomicU64::new(0),
            count: AtomicU64::new(0),
            min_micros: AtomicU64::new(u64::MAX),
            max_micros: AtomicU64::new(0),
        }
    }

    /// Record a latency sample
    pub fn record(&self, duration: Duration) {
        let micros = duration.as_micros() as u64;

        self.samples.lock().push(duration);
        self.sum_micros.fetch_add(micros, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.min_micros.fetch_min(micros, Ordering::Relaxed);
        self.max_micros.fetch_max(micros, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> Duration {
        let count = self.count.load(Ordering::Relaxed);
        if count == 0 {
            return Duration::ZERO;
        }
        let sum = self.sum_micros.load(Ordering::Relaxed);
        Duration::from_micros(sum / count)
    }

    pub fn min(&self) -> Duration {
        let min = self.min_micros.load(Ordering::Relaxed);
        if min == u64::MAX {
            Duration::ZERO
        } else {
            Duration::from_micros(min)
        }
    }

    pub fn max(&self) -> Duration {
        Duration::from_micros(self.max_micros.load(Ordering::Relaxed))
    }

    /// Calculate percentile (0.0 to 1.0), interpolating linearly between
    /// neighbouring ranks
    pub fn percentile(&self, p: f64) -> Duration {
        let mut samples = self.samples.lock();
        if samples.is_empty() {
            return Duration::ZERO;
        }

        samples.sort_unstable();
        let rank = p.clamp(0.0, 1.0) * (samples.len() - 1) as f64;
        let lower = rank.floor() as usize;
        let upper = rank.ceil() as usize;
        let lo = samples[lower].as_nanos() as f64;
        let hi = samples[upper].as_nanos() as f64;
        let nanos = lo + (hi - lo) * (rank - lower as f64);
        Duration::from_nanos(nanos.round() as u64)
    }

    pub fn summary(&self) -> LatencySummary {
        LatencySummary {
            count: self.count(),
            mean: self.mean(),
            min: self.min(),
            max: self.max(),
            p50: self.percentile(0.50),
            p90: self.percentile(0.90),
            p95: self.percentile(0.95),
        }
    }
}

/// Summary statistics for latency
#[derive(Debug, Clone, PartialEq)]
pub struct LatencySummary {
    pub count: u64,
    pub mean: Duration,
    pub min: Duration,
    pub max: Duration,
    pub p50: Duration,
    pub p90: Duration,
    pub p95: Duration,
}

/// Monotonic counter
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn add(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    pub fn total(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Fraction of boolean samples that were true
#[derive(Debug, Default)]
pub struct RateCounter {
    hits: AtomicU64,
    total: AtomicU64,
}

impl RateCounter {
    pub fn add(&self, hit: bool) {
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn rate(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            self.hits() as f64 / total as f64
        }
    }
}

/// A named accumulator
#[derive(Debug)]
pub enum Metric {
    Counter(Counter),
    Rate(RateCounter),
    Trend(LatencyHistogram),
}

/// Kind of a named metric
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Rate,
    Trend,
}

impl MetricKind {
    fn create(self) -> Metric {
        match self {
            MetricKind::Counter => Metric::Counter(Counter::default()),
            MetricKind::Rate => Metric::Rate(RateCounter::default()),
            MetricKind::Trend => Metric::Trend(LatencyHistogram::new()),
        }
    }
}

impl Metric {
    pub fn kind(&self) -> MetricKind {
        match self {
            Metric::Counter(_) => MetricKind::Counter,
            Metric::Rate(_) => MetricKind::Rate,
            Metric::Trend(_) => MetricKind::Trend,
        }
    }

    fn value(&self, elapsed: Duration) -> MetricValue {
        match self {
            Metric::Counter(counter) => {
                let count = counter.total();
                let secs = elapsed.as_secs_f64();
                MetricValue::Counter {
                    count,
                    rate: if secs > 0.0 { count as f64 / secs } else { 0.0 },
                }
            }
            Metric::Rate(rate) => MetricValue::Rate {
                rate: rate.rate(),
                hits: rate.hits(),
                total: rate.total(),
            },
            Metric::Trend(histogram) => MetricValue::Trend(TrendStats::from(histogram.summary())),
        }
    }
}

/// Trend statistics in milliseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendStats {
    pub count: u64,
    pub avg: f64,
    pub min: f64,
    pub med: f64,
    pub max: f64,
    #[serde(rename = "p(90)")]
    pub p90: f64,
    #[serde(rename = "p(95)")]
    pub p95: f64,
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

impl From<LatencySummary> for TrendStats {
    fn from(s: LatencySummary) -> Self {
        Self {
            count: s.count,
            avg: millis(s.mean),
            min: millis(s.min),
            med: millis(s.p50),
            max: millis(s.max),
            p90: millis(s.p90),
            p95: millis(s.p95),
        }
    }
}

/// Point-in-time value of one metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetricValue {
    Counter { count: u64, rate: f64 },
    Rate { rate: f64, hits: u64, total: u64 },
    Trend(TrendStats),
}

/// Raw metrics keyed by name
pub type MetricsSnapshot = BTreeMap<String, MetricValue>;

/// Registry of named metrics for one run
#[derive(Debug)]
pub struct MetricsRegistry {
    start: Instant,
    metrics: RwLock<BTreeMap<String, Arc<Metric>>>,
    finalized: AtomicBool,
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            metrics: RwLock::new(BTreeMap::new()),
            finalized: AtomicBool::new(false),
        }
    }

    /// Look up `name`, creating it as `kind` on first use.
    ///
    /// Returns None once finalized or if `name` already holds another kind.
    fn metric(&self, name: &str, kind: MetricKind) -> Option<Arc<Metric>> {
        if self.finalized.load(Ordering::Acquire) {
            tracing::debug!(metric = name, "Ignoring sample recorded after finalization");
            return None;
        }

        let existing = self.metrics.read().get(name).cloned();
        let metric = match existing {
            Some(metric) => metric,
            None => self
                .metrics
                .write()
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(kind.create()))
                .clone(),
        };

        if metric.kind() != kind {
            tracing::warn!(
                metric = name,
                existing = ?metric.kind(),
                requested = ?kind,
                "Metric kind mismatch, sample dropped"
            );
            return None;
        }
        Some(metric)
    }

    /// Add `n` to a counter
    pub fn add_counter(&self, name: &str, n: u64) {
        if let Some(metric) = self.metric(name, MetricKind::Counter) {
            if let Metric::Counter(counter) = metric.as_ref() {
                counter.add(n);
            }
        }
    }

    /// Add one boolean sample to a rate
    pub fn add_rate(&self, name: &str, hit: bool) {
        if let Some(metric) = self.metric(name, MetricKind::Rate) {
            if let Metric::Rate(rate) = metric.as_ref() {
                rate.add(hit);
            }
        }
    }

    /// Add one latency sample to a trend
    pub fn add_trend(&self, name: &str, duration: Duration) {
        if let Some(metric) = self.metric(name, MetricKind::Trend) {
            if let Metric::Trend(histogram) = metric.as_ref() {
                histogram.record(duration);
            }
        }
    }

    /// Fold one request outcome into the failure rate, the latency trend and
    /// the HTTP layer's pass-through counters
    pub fn record_outcome(&self, outcome: &RequestOutcome) {
        let failed = !outcome.is_success();
        self.add_rate(names::FAILED_REQUESTS, failed);
        self.add_trend(names::HTTP_REQ_DURATION, outcome.latency);
        self.add_rate(names::HTTP_REQ_FAILED, failed);
        self.add_counter(names::HTTP_REQS, 1);
        self.add_counter(names::DATA_SENT, outcome.bytes_sent);
        self.add_counter(names::DATA_RECEIVED, outcome.bytes_received);
    }

    /// Count one finished attempt
    pub fn record_iteration(&self) {
        self.add_counter(names::ITERATIONS, 1);
    }

    /// Count one attempt skipped at the in-flight ceiling
    pub fn record_dropped(&self) {
        self.add_counter(names::DROPPED_ITERATIONS, 1);
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized.load(Ordering::Acquire)
    }

    /// Time since the registry was created
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Current raw values of every metric
    pub fn snapshot(&self) -> MetricsSnapshot {
        let elapsed = self.elapsed();
        self.metrics
            .read()
            .iter()
            .map(|(name, metric)| (name.clone(), metric.value(elapsed)))
            .collect()
    }

    /// Freeze the registry and return its raw values. Succeeds once.
    pub fn finalize(&self) -> Result<MetricsSnapshot> {
        if self.finalized.swap(true, Ordering::AcqRel) {
            return Err(LoadError::AlreadyFinalized);
        }
        Ok(self.snapshot())
    }
}
