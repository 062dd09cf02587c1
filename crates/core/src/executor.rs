// Request execution
//
// One POST per call. Classification is driven by the status code only:
// 200 is a success, anything else (including transport errors and timeouts)
// is a failure. Response bodies are parsed as JSON for diagnostics but never
// change the classification.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::{Duration, Instant};
use url::Url;

use crate::config::RunConfig;
use crate::error::Result;
use crate::payload::ChatRequest;

/// What came back in the response body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseBody {
    /// No response, or a response without a body
    Missing,
    /// Body parsed as JSON
    Json,
    /// Body present but not valid JSON
    Unparsed,
}

/// Result of one call, folded into the metrics immediately
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOutcome {
    /// HTTP status, or None when the call failed before a full response
    pub status: Option<u16>,
    /// Issuance to full response receipt (or to the failure point)
    pub latency: Duration,
    pub body: ResponseBody,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

impl RequestOutcome {
    /// A call that failed at the transport level
    pub fn transport_failure(latency: Duration, bytes_sent: u64) -> Self {
        Self {
            status: None,
            latency,
            body: ResponseBody::Missing,
            bytes_sent,
            bytes_received: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Some(200)
    }
}

/// Sends one request body and reports how it went.
///
/// Implementations must never fail: every error is encoded in the outcome.
#[async_trait]
pub trait RequestExecutor: Send + Sync {
    async fn execute(&self, body: &ChatRequest) -> RequestOutcome;
}

/// Executor POSTing JSON over a pooled reqwest client
#[derive(Clone)]
pub struct HttpExecutor {
    client: Client,
    url: Url,
    timeout: Duration,
}

impl HttpExecutor {
    /// Create an executor for `url` with a per-request `timeout`
    pub fn new(url: Url, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url,
            timeout,
        })
    }

    /// Create an executor for the configured target
    pub fn from_config(config: &RunConfig) -> Result<Self> {
        let url = config.target.resolve()?;
        Self::new(url, config.timeout)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl std::fmt::Debug for HttpExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpExecutor")
            .field("url", &self.url.as_str())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Classify a received body without affecting success
fn inspect_body(bytes: &[u8]) -> ResponseBody {
    if bytes.is_empty() {
        tracing::warn!("Response body is empty");
        return ResponseBody::Missing;
    }
    match serde_json::from_slice::<serde_json::Value>(bytes) {
        Ok(_) => ResponseBody::Json,
        Err(e) => {
            tracing::warn!(error = %e, "Error parsing JSON response");
            ResponseBody::Unparsed
        }
    }
}

#[async_trait]
impl RequestExecutor for HttpExecutor {
    async fn execute(&self, body: &ChatRequest) -> RequestOutcome {
        let payload = match serde_json::to_vec(body) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode request body");
                return RequestOutcome::transport_failure(Duration::ZERO, 0);
            }
        };
        let bytes_sent = payload.len() as u64;

        let start = Instant::now();
        let response = self
            .client
            .post(self.url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                let latency = start.elapsed();
                tracing::debug!(
                    error = %e,
                    timeout = e.is_timeout(),
                    connect = e.is_connect(),
                    latency_ms = latency.as_millis() as u64,
                    "Request failed before a response"
                );
                return RequestOutcome::transport_failure(latency, bytes_sent);
            }
        };

        let status = response.status().as_u16();
        match response.bytes().await {
            Ok(bytes) => {
                let latency = start.elapsed();
                if status != 200 {
                    tracing::debug!(
                        status,
                        latency_ms = latency.as_millis() as u64,
                        "Non-200 response"
                    );
                }
                RequestOutcome {
                    status: Some(status),
                    latency,
                    body: inspect_body(&bytes),
                    bytes_sent,
                    bytes_received: bytes.len() as u64,
                }
            }
            Err(e) => {
                // Headers arrived but the body did not: the response was never fully received
                let latency = start.elapsed();
                tracing::debug!(error = %e, status, "Response body read failed");
                RequestOutcome::transport_failure(latency, bytes_sent)
            }
        }
    }
}
