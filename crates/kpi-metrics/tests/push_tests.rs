//! Pushgateway delivery against a mocked gateway.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use kpi_metrics::KpiError;
use kpi_test_utils::*;
use std::time::Duration;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_push_sends_live_series() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/metrics/job/test_job"))
        .and(body_string_contains(
            "testns_registration_success_rate_single_slice{NetworkSlice=\"test_slice\"} 95.5",
        ))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&mock_server)
        .await;

    let ctx = TestContextBuilder::new().build();
    ctx.set(REGISTRATION_RATE, 95.5, &slice_labels()).unwrap();
    ctx.push(&mock_server.uri(), "test_job").await.unwrap();
}

#[tokio::test]
async fn test_push_with_defaults_includes_default_series() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/metrics/job/amf"))
        .and(body_string_contains("NetworkSlice=\"default_NetworkSlice\""))
        .and(body_string_contains("testns_mean_registered_subscribers_amf"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let ctx = TestContextBuilder::new().build();
    ctx.push_with_defaults(&mock_server.uri(), "amf").await.unwrap();
}

#[tokio::test]
async fn test_push_failure_is_non_fatal() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let ctx = TestContextBuilder::new()
        .push_timeout(Duration::from_secs(2))
        .build();
    ctx.increment(AMF_SUBSCRIBERS, &amf_labels()).unwrap();

    let err = ctx.push(&mock_server.uri(), "test_job").await.unwrap_err();
    assert!(matches!(err, KpiError::Push(_)));

    // The context keeps working after a failed push
    ctx.increment(AMF_SUBSCRIBERS, &amf_labels()).unwrap();
    assert_eq!(
        ctx.value(AMF_SUBSCRIBERS, &amf_labels()).unwrap(),
        Some(2.0)
    );
}

#[tokio::test]
async fn test_push_empty_job_rejected() {
    let ctx = TestContextBuilder::new().build();
    assert!(matches!(
        ctx.push("http://127.0.0.1:9091", "").await,
        Err(KpiError::Push(_))
    ));
}
