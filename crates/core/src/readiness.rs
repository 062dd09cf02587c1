// Readiness wait
//
// Polls `<base>/health` before a run until the server answers 200, then
// sleeps for an optional warmup period. Exhausting the retries is fatal.

use std::time::Duration;

use reqwest::Client;
use url::Url;

use crate::error::{ConfigError, LoadError, Result};

/// Default number of health probes
pub const DEFAULT_RETRIES: u32 = 120;
/// Default delay between probes
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);
/// Per-probe request timeout
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Health polling parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Readiness {
    pub health_url: Url,
    pub retries: u32,
    pub interval: Duration,
    pub warmup: Duration,
}

impl Readiness {
    /// Poll `<base_url>/health` with default retries and interval
    pub fn new(base_url: &str) -> std::result::Result<Self, ConfigError> {
        let raw = format!("{}/health", base_url.trim().trim_end_matches('/'));
        let health_url = Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl {
            url: raw.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            health_url,
            retries: DEFAULT_RETRIES,
            interval: DEFAULT_INTERVAL,
            warmup: Duration::ZERO,
        })
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_warmup(mut self, warmup: Duration) -> Self {
        self.warmup = warmup;
        self
    }

    /// Block until the server is healthy, then wait out the warmup.
    ///
    /// Returns the number of probes it took.
    pub async fn wait(&self, client: &Client) -> Result<u32> {
        let attempts = self.poll(client).await?;
        if !self.warmup.is_zero() {
            tracing::info!(warmup_secs = self.warmup.as_secs_f64(), "Warming up");
            tokio::time::sleep(self.warmup).await;
        }
        Ok(attempts)
    }

    async fn poll(&self, client: &Client) -> Result<u32> {
        for attempt in 1..=self.retries {
            let probe = client
                .get(self.health_url.clone())
                .timeout(PROBE_TIMEOUT)
                .send()
                .await;

            match probe {
                Ok(response) if response.status().as_u16() == 200 => {
                    tracing::info!(url = %self.health_url, attempt, "Server is ready");
                    return Ok(attempt);
                }
                Ok(response) => {
                    tracing::info!(
                        url = %self.health_url,
                        attempt,
                        status = response.status().as_u16(),
                        "Server not ready yet"
                    );
                }
                Err(e) => {
                    tracing::info!(
                        url = %self.health_url,
                        attempt,
                        error = %e,
                        "Server not reachable yet"
                    );
                }
            }

            if attempt < self.retries {
                tokio::time::sleep(self.interval).await;
            }
        }

        Err(LoadError::not_ready(self.health_url.as_str(), self.retries))
    }
}
