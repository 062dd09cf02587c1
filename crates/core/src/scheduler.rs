//! Constant-arrival-rate scheduling
//!
//! Attempts are started on a fixed clock (`1 / rate` apart) for the configured
//! duration, independently of how long earlier attempts take. A semaphore
//! caps the number of outstanding attempts; a tick that finds no free slot is
//! counted as dropped instead of delaying the schedule.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};

use crate::config::RunConfig;
use crate::corpus::Corpus;
use crate::error::Result;
use crate::executor::RequestExecutor;
use crate::metrics::MetricsRegistry;
use crate::payload::build_payload;

/// Issued attempts between two progress log lines
const PROGRESS_EVERY: u64 = 1_000;

/// Counters describing how a run went
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct RunStats {
    /// Attempts that were started
    pub issued: u64,
    /// Scheduled attempts skipped because the in-flight ceiling was reached
    pub dropped: u64,
    /// Started attempts that ran to completion
    pub completed: u64,
    /// Wall time from the first tick until the last attempt finished
    #[serde(with = "duration_millis")]
    pub elapsed: Duration,
}

mod duration_millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }
}

/// Drives one load test against a single executor
pub struct LoadRunner<E> {
    config: Arc<RunConfig>,
    period: Duration,
    corpus: Arc<Corpus>,
    executor: Arc<E>,
    metrics: Arc<MetricsRegistry>,
}

impl<E: RequestExecutor + 'static> LoadRunner<E> {
    /// Create a runner with a fresh metrics registry; fails if the
    /// configuration is invalid
    pub fn new(config: RunConfig, corpus: Corpus, executor: E) -> Result<Self> {
        config.validate()?;
        let period = config.period()?;
        Ok(Self {
            config: Arc::new(config),
            period,
            corpus: Arc::new(corpus),
            executor: Arc::new(executor),
            metrics: Arc::new(MetricsRegistry::new()),
        })
    }

    /// Record into a caller-supplied registry instead of the runner's own
    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn metrics(&self) -> Arc<MetricsRegistry> {
        self.metrics.clone()
    }

    /// Schedule attempts for the configured duration and wait for all of them.
    ///
    /// Returns once every started attempt has finished (each is bounded by
    /// the executor's timeout).
    pub async fn run(&self) -> RunStats {
        let start = Instant::now();
        let deadline = start + self.config.duration;
        let semaphore = Arc::new(Semaphore::new(self.config.max_in_flight));

        let mut ticker = tokio::time::interval_at(start, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);

        tracing::info!(
            rate = self.config.rate,
            duration_secs = self.config.duration.as_secs_f64(),
            max_in_flight = self.config.max_in_flight,
            model = %self.config.model,
            "Starting load test"
        );

        let mut attempts = JoinSet::new();
        let mut stats = RunStats::default();

        loop {
            // The next tick may lie past the deadline at low rates
            match tokio::time::timeout_at(deadline, ticker.tick()).await {
                Ok(scheduled) if scheduled < deadline => {}
                _ => break,
            }

            while let Some(joined) = attempts.try_join_next() {
                Self::reap(joined, &mut stats);
            }

            let permit = match semaphore.clone().try_acquire_owned() {
                Ok(permit) => permit,
                Err(_) => {
                    stats.dropped += 1;
                    self.metrics.record_dropped();
                    tracing::debug!(
                        dropped = stats.dropped,
                        "In-flight ceiling reached, attempt dropped"
                    );
                    continue;
                }
            };

            stats.issued += 1;
            let config = self.config.clone();
            let corpus = self.corpus.clone();
            let executor = self.executor.clone();
            let metrics = self.metrics.clone();

            attempts.spawn(async move {
                let body = {
                    let mut rng = rand::thread_rng();
                    build_payload(&config, &corpus, &mut rng)
                };
                let outcome = executor.execute(&body).await;
                metrics.record_outcome(&outcome);
                metrics.record_iteration();
                drop(permit);
            });

            if stats.issued % PROGRESS_EVERY == 0 {
                tracing::info!(
                    issued = stats.issued,
                    completed = stats.completed,
                    dropped = stats.dropped,
                    "Progress"
                );
            }
        }

        tracing::info!(
            issued = stats.issued,
            outstanding = attempts.len(),
            "Scheduling finished, waiting for in-flight requests"
        );

        while let Some(joined) = attempts.join_next().await {
            Self::reap(joined, &mut stats);
        }

        stats.elapsed = start.elapsed();
        tracing::info!(
            issued = stats.issued,
            completed = stats.completed,
            dropped = stats.dropped,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "Load test complete"
        );
        stats
    }

    fn reap(joined: std::result::Result<(), tokio::task::JoinError>, stats: &mut RunStats) {
        match joined {
            Ok(()) => stats.completed += 1,
            Err(e) => tracing::error!(error = %e, "Attempt task failed"),
        }
    }
}
