// Forwarding relay
//
// Accepts POSTs on a single route and replays the exact body against
// ENDPOINT_URL + API_ROUTE. The upstream status, content type and body are
// handed back as-is; a failure to reach the upstream is a plain 500.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use inferload_core::Target;
use serde::Serialize;
use tower_http::trace::TraceLayer;
use url::Url;

/// Default listen address
pub const DEFAULT_RELAY_ADDR: &str = "0.0.0.0:9000";

/// Relay configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RelayConfig {
    pub listen_addr: SocketAddr,
    /// Base URL of the inference server
    pub endpoint_url: String,
    /// Route served by the relay and appended to `endpoint_url`
    pub api_route: String,
}

impl RelayConfig {
    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `RELAY_ADDR`: listen address (default: 0.0.0.0:9000)
    /// - `ENDPOINT_URL`: inference server base URL (required)
    /// - `API_ROUTE`: route to accept and forward to, starting with '/' (required)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup (the environment in production)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let listen_addr: SocketAddr = lookup("RELAY_ADDR")
            .unwrap_or_else(|| DEFAULT_RELAY_ADDR.to_string())
            .parse()
            .context("RELAY_ADDR must be a socket address like 0.0.0.0:9000")?;
        let endpoint_url =
            lookup("ENDPOINT_URL").context("ENDPOINT_URL environment variable required")?;
        let api_route = lookup("API_ROUTE").context("API_ROUTE environment variable required")?;

        let config = Self {
            listen_addr,
            endpoint_url,
            api_route,
        };
        config.upstream_url()?;
        Ok(config)
    }

    /// Where forwarded requests go
    pub fn upstream_url(&self) -> Result<Url> {
        Target::relay(&self.endpoint_url, &self.api_route)
            .resolve()
            .context("Invalid upstream URL")
    }
}

/// State shared by the relay handlers
#[derive(Clone)]
pub struct RelayState {
    client: reqwest::Client,
    upstream: Url,
}

impl RelayState {
    pub fn new(config: &RelayConfig) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::new(),
            upstream: config.upstream_url()?,
        })
    }

    pub fn upstream(&self) -> &Url {
        &self.upstream
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

fn internal_error() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
}

async fn forward(State(state): State<RelayState>, body: Bytes) -> Response {
    let sent = body.len();
    let upstream = match state
        .client
        .post(state.upstream.clone())
        .header(header::CONTENT_TYPE, "application/json")
        .body(body)
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, upstream = %state.upstream, "Error forwarding request");
            return internal_error();
        }
    };

    let status = upstream.status();
    let content_type = upstream.headers().get(header::CONTENT_TYPE).cloned();
    let bytes = match upstream.bytes().await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(
                error = %e,
                status = status.as_u16(),
                "Error reading upstream response"
            );
            return internal_error();
        }
    };

    tracing::debug!(
        status = status.as_u16(),
        sent,
        received = bytes.len(),
        "Forwarded request"
    );

    let mut response = (status, bytes).into_response();
    match content_type {
        Some(value) => {
            response.headers_mut().insert(header::CONTENT_TYPE, value);
        }
        None => {
            response.headers_mut().remove(header::CONTENT_TYPE);
        }
    }
    response
}

/// Build the relay router: the forwarding route plus `/health`
pub fn router(config: &RelayConfig, state: RelayState) -> Router {
    Router::new()
        .route(&config.api_route, post(forward))
        .route("/health", get(health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use std::collections::HashMap;
    use tower::ServiceExt;
    use wiremock::matchers::{body_json, header as header_matcher, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ROUTE: &str = "/v1/chat/completions";

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    fn config(endpoint_url: &str) -> RelayConfig {
        RelayConfig {
            listen_addr: DEFAULT_RELAY_ADDR.parse().unwrap(),
            endpoint_url: endpoint_url.to_string(),
            api_route: ROUTE.to_string(),
        }
    }

    fn app(config: &RelayConfig) -> Router {
        router(config, RelayState::new(config).unwrap())
    }

    fn post_request(body: &'static str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(ROUTE)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[test]
    fn test_config_from_lookup() {
        let config = RelayConfig::from_lookup(lookup(&[
            ("ENDPOINT_URL", "http://localhost:8000"),
            ("API_ROUTE", ROUTE),
        ]))
        .unwrap();
        assert_eq!(config.listen_addr, "0.0.0.0:9000".parse().unwrap());
        assert_eq!(
            config.upstream_url().unwrap().as_str(),
            "http://localhost:8000/v1/chat/completions"
        );
    }

    #[test]
    fn test_config_requires_endpoint_and_route() {
        assert!(RelayConfig::from_lookup(lookup(&[("API_ROUTE", ROUTE)])).is_err());
        assert!(
            RelayConfig::from_lookup(lookup(&[("ENDPOINT_URL", "http://localhost:8000")])).is_err()
        );
        assert!(RelayConfig::from_lookup(lookup(&[
            ("ENDPOINT_URL", "http://localhost:8000"),
            ("API_ROUTE", "v1/chat"),
        ]))
        .is_err());
        assert!(RelayConfig::from_lookup(lookup(&[
            ("ENDPOINT_URL", "http://localhost:8000"),
            ("API_ROUTE", ROUTE),
            ("RELAY_ADDR", "not-an-address"),
        ]))
        .is_err());
    }

    #[tokio::test]
    async fn test_health() {
        let response = app(&config("http://127.0.0.1:1"))
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], br#"{"status":"ok"}"#);
    }

    #[tokio::test]
    async fn test_forwards_body_and_returns_upstream_response() {
        let upstream = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ROUTE))
            .and(header_matcher("content-type", "application/json"))
            .and(body_json(serde_json::json!({"model": "m", "max_tokens": 3})))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(r#"{"id":"cmpl-1"}"#, "application/json"),
            )
            .expect(1)
            .mount(&upstream)
            .await;

        let response = app(&config(&upstream.uri()))
            .oneshot(post_request(r#"{"model": "m", "max_tokens": 3}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "application/json"
        );
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], br#"{"id":"cmpl-1"}"#);
    }

    #[tokio::test]
    async fn test_upstream_error_status_is_passed_through() {
        let upstream = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&upstream)
            .await;

        let response = app(&config(&upstream.uri()))
            .oneshot(post_request("{}"))
            .await
            .unwrap();

        assert_eq!(response.status(), 429);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"slow down");
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_500() {
        let response = app(&config("http://127.0.0.1:1"))
            .oneshot(post_request("{}"))
            .await
            .unwrap();

        assert_eq!(response.status(), 500);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"Internal Server Error");
    }

    #[tokio::test]
    async fn test_other_routes_are_not_forwarded() {
        let response = app(&config("http://127.0.0.1:1"))
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/completions")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), 404);
    }
}
