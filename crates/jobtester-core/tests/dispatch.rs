//! Integration tests for Dispatcher against a mocked broadcaster and collector.
//!
//! Covers success with and without response capture, non-2xx and transport
//! failures, multipart fixtures, unknown pipelines and collector outages.

use std::sync::Arc;
use std::time::Duration;

use jobtester_core::{
    build_http_client, Dispatcher, HttpStatsReporter, JobOutcome, JobStats, RunContext,
    SignedPayload, TestTuple, TesterConfig, CAPTURE_DISABLED_PAYLOAD,
};
use wiremock::matchers::{body_string_contains, header, header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SECRET: &str = "collector-secret";

fn config(broadcaster: &str, collector: &str, fixture: &str) -> TesterConfig {
    let json = serde_json::json!({
        "region": "eu-west",
        "metricsApiEndpoint": format!("{}/api/post_stats", collector),
        "metricsSecret": SECRET,
        "broadcasterJobEndpoint": broadcaster,
        "broadcasterCliEndpoint": broadcaster,
        "broadcasterRequestToken": "job-token",
        "pipelines": [
            {
                "name": "text-to-image",
                "uri": "text-to-image",
                "capture_response": false,
                "contentType": "application/json",
                "parameters": {"prompt": "a cat", "width": 512}
            },
            {
                "name": "llm",
                "uri": "llm",
                "capture_response": true,
                "contentType": "application/json",
                "parameters": {"prompt": "hi"}
            },
            {
                "name": "upscale",
                "uri": "upscale",
                "contentType": "multipart/form-data",
                "parameters": {"prompt": "sharper"}
            }
        ],
        "fixtures": {
            "rules": [{"uriSuffix": "upscale", "path": fixture, "field": "image"}]
        }
    });
    TesterConfig::from_json_str(&json.to_string()).expect("valid config")
}

struct Harness {
    broadcaster: MockServer,
    collector: MockServer,
    context: Arc<RunContext>,
    dispatcher: Dispatcher,
    _fixtures: tempfile::TempDir,
}

async fn harness_with(mut tweak: impl FnMut(&mut TesterConfig)) -> Harness {
    let broadcaster = MockServer::start().await;
    let collector = MockServer::start().await;

    let fixtures = tempfile::tempdir().unwrap();
    let fixture = fixtures.path().join("upscale.jpg");
    std::fs::write(&fixture, b"jpeg-bytes").unwrap();

    let mut cfg = config(
        &broadcaster.uri(),
        &collector.uri(),
        &fixture.to_string_lossy(),
    );
    tweak(&mut cfg);

    let client = build_http_client(false).unwrap();
    let reporter = Arc::new(HttpStatsReporter::new(
        client.clone(),
        cfg.metrics_api_endpoint.clone(),
        cfg.metrics_secret.clone(),
        Duration::from_secs(5),
    ));
    let context = Arc::new(RunContext::new());
    let dispatcher = Dispatcher::new(Arc::new(cfg), client, reporter, Arc::clone(&context));

    Harness {
        broadcaster,
        collector,
        context,
        dispatcher,
        _fixtures: fixtures,
    }
}

async fn harness() -> Harness {
    harness_with(|_| {}).await
}

async fn accept_stats(collector: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/post_stats"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200))
        .mount(collector)
        .await;
}

async fn posted_stats(collector: &MockServer) -> Vec<JobStats> {
    collector
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|r| serde_json::from_slice(&r.body).expect("stats body"))
        .collect()
}

fn tuple(pipeline: &str) -> TestTuple {
    TestTuple {
        orchestrator: "0xA1".into(),
        service_uri: "https://o1:8935".into(),
        pipeline: pipeline.into(),
        model: "m1".into(),
        warm: true,
    }
}

#[tokio::test]
async fn test_non_2xx_is_failure_with_status_code_entry() {
    let h = harness().await;
    accept_stats(&h.collector).await;
    Mock::given(method("POST"))
        .and(path("/text-to-image"))
        .respond_with(ResponseTemplate::new(503).set_body_string(r#"{"error":"busy"}"#))
        .mount(&h.broadcaster)
        .await;

    let outcome = h.dispatcher.dispatch(&tuple("text-to-image")).await;
    assert_eq!(outcome, JobOutcome::Failed);

    let snap = h.context.metrics().snapshot();
    assert_eq!(snap.total_jobs_failed, 1);
    assert_eq!(snap.total_jobs_passed, 0);

    let stats = posted_stats(&h.collector).await;
    assert_eq!(stats.len(), 1);
    let s = &stats[0];
    assert_eq!(s.success_rate, 0);
    assert_eq!(s.errors.len(), 1);
    assert_eq!(s.errors[0].error_code, "503");
    assert_eq!(s.errors[0].message, r#"{"error":"busy"}"#);
    assert_eq!(s.errors[0].count, 1);
    assert_eq!(s.response_payload, r#"{"error":"busy"}"#);
}

#[tokio::test]
async fn test_capture_disabled_stores_placeholder() {
    let h = harness().await;
    accept_stats(&h.collector).await;
    Mock::given(method("POST"))
        .and(path("/text-to-image"))
        .and(header("authorization", "Bearer job-token"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"ok":true}"#))
        .expect(1)
        .mount(&h.broadcaster)
        .await;

    let outcome = h.dispatcher.dispatch(&tuple("text-to-image")).await;
    assert_eq!(outcome, JobOutcome::Passed);

    let stats = posted_stats(&h.collector).await;
    let s = &stats[0];
    assert_eq!(s.success_rate, 1);
    assert_eq!(s.response_payload, CAPTURE_DISABLED_PAYLOAD);
    assert!(s.errors.is_empty());
    assert_eq!(s.region, "eu-west");
    assert!(s.model_is_warm);
    assert_eq!(
        s.input_parameters,
        r#"{"prompt":"a cat","width":512,"model_id":"m1"}"#
    );
    assert!(s.round_trip_time >= 0.0);
    assert_eq!(h.context.metrics().snapshot().total_jobs_passed, 1);
}

#[tokio::test]
async fn test_capture_enabled_keeps_body_verbatim() {
    let h = harness().await;
    accept_stats(&h.collector).await;
    Mock::given(method("POST"))
        .and(path("/llm"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"ok":true}"#))
        .mount(&h.broadcaster)
        .await;

    h.dispatcher.dispatch(&tuple("llm")).await;
    assert_eq!(posted_stats(&h.collector).await[0].response_payload, r#"{"ok":true}"#);
}

#[tokio::test]
async fn test_collector_recomputes_signature_over_received_bytes() {
    let h = harness().await;
    accept_stats(&h.collector).await;
    Mock::given(method("POST"))
        .and(path("/text-to-image"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&h.broadcaster)
        .await;

    h.dispatcher.dispatch(&tuple("text-to-image")).await;

    let requests = h.collector.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let req = &requests[0];
    let signature = req
        .headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .expect("authorization header");

    assert_eq!(signature.len(), 64);
    assert!(SignedPayload::verify(&req.body, signature, SECRET.as_bytes()));
    assert_eq!(
        jobtester_core::sign_payload(SECRET.as_bytes(), &req.body).unwrap(),
        signature
    );
}

#[tokio::test]
async fn test_multipart_pipeline_uploads_fixture() {
    let h = harness().await;
    accept_stats(&h.collector).await;
    Mock::given(method("POST"))
        .and(path("/upscale"))
        .and(header("authorization", "Bearer job-token"))
        .and(header_regex("content-type", "^multipart/form-data; boundary="))
        .and(body_string_contains(r#"name="image"; filename="upscale.jpg""#))
        .and(body_string_contains("jpeg-bytes"))
        .and(body_string_contains(r#"name="model_id""#))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&h.broadcaster)
        .await;

    let outcome = h.dispatcher.dispatch(&tuple("upscale")).await;
    assert_eq!(outcome, JobOutcome::Passed);
}

#[tokio::test]
async fn test_missing_fixture_never_reaches_broadcaster() {
    let h = harness_with(|cfg| {
        cfg.fixtures.rules[0].path = "/no/such/fixture.jpg".into();
    })
    .await;
    accept_stats(&h.collector).await;
    Mock::given(method("POST"))
        .and(path("/upscale"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&h.broadcaster)
        .await;

    let outcome = h.dispatcher.dispatch(&tuple("upscale")).await;
    assert_eq!(outcome, JobOutcome::TesterError);
    assert_eq!(h.context.metrics().snapshot().total_jobs_tester_error, 1);
}

#[tokio::test]
async fn test_unconfigured_pipeline_sends_no_job_request() {
    let h = harness().await;
    accept_stats(&h.collector).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&h.broadcaster)
        .await;

    let outcome = h.dispatcher.dispatch(&tuple("image-to-video")).await;
    assert_eq!(outcome, JobOutcome::TesterError);

    let snap = h.context.metrics().snapshot();
    assert_eq!(snap.total_jobs, 1);
    assert_eq!(snap.total_jobs_tester_error, 1);
    assert!(snap.is_balanced());
}

#[tokio::test]
async fn test_transport_error_records_round_trip_and_description() {
    let h = harness_with(|cfg| {
        // Nothing listens on port 9 (discard) in the test environment.
        cfg.broadcaster_job_endpoint = "http://127.0.0.1:9".into();
    })
    .await;
    accept_stats(&h.collector).await;

    let outcome = h.dispatcher.dispatch(&tuple("text-to-image")).await;
    assert_eq!(outcome, JobOutcome::Failed);

    let stats = posted_stats(&h.collector).await;
    let s = &stats[0];
    assert_eq!(s.success_rate, 0);
    assert_eq!(s.errors[0].message, "failed to process the job");
    assert!(!s.errors[0].error_code.is_empty());
    assert!(s.round_trip_time >= 0.0);
    assert!(s.response_payload.is_empty());
    assert_eq!(h.context.metrics().snapshot().total_jobs_failed, 1);
}

#[tokio::test]
async fn test_collector_outage_does_not_change_job_outcome() {
    let h = harness().await;
    Mock::given(method("POST"))
        .and(path("/api/post_stats"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&h.collector)
        .await;
    Mock::given(method("POST"))
        .and(path("/text-to-image"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&h.broadcaster)
        .await;

    let outcome = h.dispatcher.dispatch(&tuple("text-to-image")).await;
    assert_eq!(outcome, JobOutcome::Passed);

    let snap = h.context.metrics().snapshot();
    assert_eq!(snap.total_jobs_passed, 1);
    assert_eq!(snap.total_jobs_failed, 0);
    assert_eq!(snap.total_stats_delivery_failed, 1);
}
