//! A slow Pushgateway must not stall the rest of the C ABI.
//!
//! Runs in its own test binary because the façade state is process-wide.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use kpi_metrics::ffi::*;
use kpi_metrics::KpiError;
use kpi_test_utils::*;
use std::ffi::CString;
use std::thread;
use std::time::{Duration, Instant};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

const GATEWAY_DELAY: Duration = Duration::from_secs(2);

fn c(s: &str) -> CString {
    CString::new(s).unwrap()
}

#[test]
fn test_slow_push_does_not_block_shutdown_or_updates() {
    // The mock server needs its own runtime, separate from the façade's
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mock_server = rt.block_on(async {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(GATEWAY_DELAY))
            .mount(&server)
            .await;
        server
    });

    let catalog = write_catalog(SCENARIO_KPIS);
    let path = c(catalog.path().to_str().unwrap());
    let amf = c(AMF_SUBSCRIBERS);
    let labels = [c("Network"), c("n"), c("NetworkSlice"), c("s")];
    let ptrs: Vec<_> = labels.iter().map(|s| s.as_ptr()).collect();

    unsafe {
        Initialize(c("prometheus").as_ptr(), c("testns").as_ptr()).assert_ok();
        LoadKPIs(path.as_ptr()).assert_ok();
        RegisterMetrics().assert_ok();
        IncrementMetric(amf.as_ptr(), ptrs.as_ptr(), 4).assert_ok();
    }

    let endpoint = mock_server.uri();
    let pusher = thread::spawn(move || {
        let endpoint = c(&endpoint);
        let job = c("slow_job");
        unsafe { PushMetrics(endpoint.as_ptr(), job.as_ptr()) }
    });

    // Let the push reach the gateway
    thread::sleep(Duration::from_millis(200));

    let start = Instant::now();
    Shutdown().assert_ok();
    assert!(
        start.elapsed() < Duration::from_secs(1),
        "Shutdown waited {:?} on an in-flight push",
        start.elapsed()
    );

    let start = Instant::now();
    unsafe { IncrementMetric(amf.as_ptr(), ptrs.as_ptr(), 4) }
        .assert_status_of(&KpiError::NotInitialized);
    assert!(start.elapsed() < Duration::from_secs(1));

    // The in-flight push still completes against its own snapshot
    pusher.join().unwrap().assert_ok();
}
