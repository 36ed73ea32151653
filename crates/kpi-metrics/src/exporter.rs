//! Export paths: text exposition and Pushgateway delivery.
//!
//! Both paths start from `Registry::gather`, which copies every value out of
//! the backend. Push therefore never holds a store or registry lock while
//! waiting on the network.

use crate::errors::{KpiError, Result};
use crate::observability::metrics as self_metrics;
use base64::{engine::general_purpose::URL_SAFE, Engine};
use prometheus::proto::MetricFamily;
use prometheus::{Encoder, TextEncoder};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Default connection timeout for the push HTTP client.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Encode families in the Prometheus text exposition format.
///
/// # Errors
///
/// `Internal` if encoding fails.
pub fn encode_text(families: &[MetricFamily]) -> Result<String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(families, &mut buffer)
        .map_err(|e| KpiError::Internal(format!("Failed to encode metrics: {e}")))?;
    String::from_utf8(buffer)
        .map_err(|e| KpiError::Internal(format!("Encoded metrics are not UTF-8: {e}")))
}

/// Build the Pushgateway URL for a job.
///
/// Uses `/metrics/job/<job>` and switches to the base64url form
/// `/metrics/job@base64/<encoded>` when the job contains `/`.
///
/// # Errors
///
/// `InvalidArgument` for a non-HTTP endpoint, `Push` for an empty job.
pub fn push_url(endpoint: &str, job: &str) -> Result<String> {
    let endpoint = endpoint.trim().trim_end_matches('/');
    if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
        return Err(KpiError::InvalidArgument(format!(
            "push endpoint must be an http(s) URL, got '{endpoint}'"
        )));
    }
    if job.is_empty() {
        return Err(KpiError::Push("job label must not be empty".to_string()));
    }

    if job.contains('/') {
        Ok(format!(
            "{endpoint}/metrics/job@base64/{}",
            URL_SAFE.encode(job.as_bytes())
        ))
    } else {
        Ok(format!("{endpoint}/metrics/job/{job}"))
    }
}

/// HTTP client for Pushgateway delivery.
#[derive(Debug, Clone)]
pub struct PushClient {
    http_client: reqwest::Client,
}

impl PushClient {
    /// Build a client with the given request timeout.
    ///
    /// # Errors
    ///
    /// `Internal` if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT.min(timeout))
            .build()
            .map_err(|e| KpiError::Internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { http_client })
    }

    /// Deliver an already gathered snapshot under `job`.
    ///
    /// POST semantics: series in the same group with other names are kept by
    /// the gateway.
    ///
    /// # Errors
    ///
    /// `Push` on connection failure, timeout or a non-2xx response;
    /// `InvalidArgument` for a malformed endpoint.
    #[instrument(skip_all, fields(job = %job))]
    pub async fn push(&self, endpoint: &str, job: &str, families: &[MetricFamily]) -> Result<()> {
        let start = Instant::now();
        let result = self.push_inner(endpoint, job, families).await;
        let status = if result.is_ok() { "success" } else { "error" };
        self_metrics::record_push(status, start.elapsed());
        if let Err(err) = &result {
            self_metrics::record_error("push", err.error_type_label());
        }
        result
    }

    async fn push_inner(&self, endpoint: &str, job: &str, families: &[MetricFamily]) -> Result<()> {
        let url = push_url(endpoint, job)?;
        let body = encode_text(families)?;

        debug!(
            target: "kpi_metrics.export",
            url = %url,
            families = families.len(),
            bytes = body.len(),
            "Pushing metrics"
        );

        let response = self
            .http_client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, TextEncoder::new().format_type())
            .body(body)
            .send()
            .await
            .map_err(|e| {
                warn!(target: "kpi_metrics.export", error = %e, "Push request failed");
                KpiError::Push(e.to_string())
            })?;

        let status = response.status();
        if status.is_success() {
            info!(
                target: "kpi_metrics.export",
                status = %status,
                families = families.len(),
                "Metrics pushed"
            );
            Ok(())
        } else {
            warn!(
                target: "kpi_metrics.export",
                status = %status,
                "Push gateway rejected metrics"
            );
            Err(KpiError::Push(format!("Unexpected status: {status}")))
        }
    }
}
