// Integration tests for a full load run against a mock inference server
//
// These tests drive LoadRunner with the real HttpExecutor over HTTP, then
// build the report from the finalized metrics.
//
// Run with: cargo test -p inferload-core --test load_run_test

use std::time::Duration;

use inferload_core::metrics::names;
use inferload_core::{
    Corpus, Distribution, HttpExecutor, LoadRunner, MetricValue, PromptSource, RunConfig,
    RunReport, Target,
};
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ROUTE: &str = "/v1/chat/completions";

async fn mock_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ROUTE))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "cmpl-1",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "ok"}}]
        })))
        .mount(&server)
        .await;
    server
}

fn config(target: Target) -> RunConfig {
    RunConfig::new("test-model", target, Duration::from_secs(5))
        .with_rate(5.0)
        .with_duration(Duration::from_secs(2))
        .with_max_tokens(Distribution::fixed(50.0))
        .with_prompt_len(Distribution::fixed(20.0))
}

async fn received_bodies(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|r| r.body_json::<Value>().unwrap())
        .collect()
}

#[tokio::test]
async fn test_direct_run_issues_expected_requests() {
    let server = mock_server().await;
    let config = config(Target::direct(format!("{}{}", server.uri(), ROUTE)))
        .with_chars_per_token(Some(4));

    let executor = HttpExecutor::from_config(&config).unwrap();
    let runner = LoadRunner::new(config.clone(), Corpus::empty(), executor).unwrap();
    let stats = runner.run().await;

    assert!((9..=11).contains(&stats.issued), "issued {}", stats.issued);
    assert_eq!(stats.completed, stats.issued);
    assert_eq!(stats.dropped, 0);

    let bodies = received_bodies(&server).await;
    assert_eq!(bodies.len() as u64, stats.issued);
    for body in &bodies {
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["max_tokens"], 50);
        assert_eq!(body["temperature"], 1);
        let content = body["messages"][0]["content"].as_str().unwrap();
        assert_eq!(content.chars().count(), 80);
    }

    let raw = runner.metrics().finalize().unwrap();
    let report = RunReport::new(&config, stats, &raw);
    match &report.metrics[names::FAILED_REQUESTS] {
        MetricValue::Rate { rate, total, .. } => {
            assert_eq!(*rate, 0.0);
            assert_eq!(*total, stats.issued);
        }
        other => panic!("unexpected {:?}", other),
    }
    match &report.metrics[names::END_TO_END_LATENCY] {
        MetricValue::Trend(t) => assert_eq!(t.count, stats.issued),
        other => panic!("unexpected {:?}", other),
    }
    assert!(report.metrics.keys().all(|k| !k.starts_with("http")));
}

#[tokio::test]
async fn test_relay_target_uses_route() {
    let server = mock_server().await;
    let config = config(Target::relay(server.uri(), ROUTE))
        .with_duration(Duration::from_secs(1))
        .with_prompt_source(PromptSource::Corpus);

    let corpus = Corpus::new(vec!["fn add(a: i32, b: i32) -> i32 { a + b }".to_string()]);
    let executor = HttpExecutor::from_config(&config).unwrap();
    let runner = LoadRunner::new(config, corpus, executor).unwrap();
    let stats = runner.run().await;

    let bodies = received_bodies(&server).await;
    assert!(!bodies.is_empty());
    assert_eq!(bodies.len() as u64, stats.issued);
    for body in &bodies {
        assert_eq!(body["messages"][0]["content"], "fn add(a: i32, b: i3");
    }
}

#[tokio::test]
async fn test_unreachable_target_completes_with_failures() {
    let config = RunConfig::new(
        "test-model",
        Target::direct("http://127.0.0.1:1/v1/chat/completions"),
        Duration::from_secs(1),
    )
    .with_rate(4.0)
    .with_duration(Duration::from_secs(1));

    let executor = HttpExecutor::from_config(&config).unwrap();
    let runner = LoadRunner::new(config.clone(), Corpus::empty(), executor).unwrap();
    let stats = runner.run().await;

    assert!(stats.issued > 0);
    assert_eq!(stats.completed, stats.issued);
    // Bounded by the duration plus one request timeout, with slack
    assert!(stats.elapsed < Duration::from_secs(4));

    let report = RunReport::new(&config, stats, &runner.metrics().finalize().unwrap());
    match &report.metrics[names::FAILED_REQUESTS] {
        MetricValue::Rate { rate, .. } => assert_eq!(*rate, 1.0),
        other => panic!("unexpected {:?}", other),
    }
    let text = report.render_text();
    assert!(text.contains("100.00%"));
}
