//! Self-metrics for the KPI library.
//!
//! All metrics follow Prometheus naming conventions:
//! - `kpi_metrics_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `operation`: increment, decrement, add, set, load, register, unregister, push
//! - `status`: success, rejected, error
//! - `error_type`: bounded by `KpiError` variants

use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Record an update call.
///
/// Metric: `kpi_metrics_updates_total`
/// Labels: `operation`, `status`
pub fn record_update(operation: &str, status: &str) {
    counter!("kpi_metrics_updates_total",
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record an error by category.
///
/// Metric: `kpi_metrics_errors_total`
/// Labels: `operation`, `error_type`
pub fn record_error(operation: &str, error_type: &str) {
    counter!("kpi_metrics_errors_total",
        "operation" => operation.to_string(),
        "error_type" => error_type.to_string()
    )
    .increment(1);
}

/// Record a push attempt.
///
/// Metric: `kpi_metrics_push_total`, `kpi_metrics_push_duration_seconds`
/// Labels: `status`
pub fn record_push(status: &str, duration: Duration) {
    histogram!("kpi_metrics_push_duration_seconds", "status" => status.to_string())
        .record(duration.as_secs_f64());
    counter!("kpi_metrics_push_total", "status" => status.to_string()).increment(1);
}

/// Set the number of live metric instances.
///
/// Metric: `kpi_metrics_instances_active`
pub fn set_instances_active(count: usize) {
    // usize to f64 conversion is safe for realistic instance counts
    #[allow(clippy::cast_precision_loss)]
    gauge!("kpi_metrics_instances_active").set(count as f64);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_update("increment", "success");
        record_error("set", "illegal_operation");
        record_push("error", Duration::from_millis(5));
        set_instances_active(3);
    }

    #[test]
    fn test_self_metrics_are_captured() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            record_update("increment", "success");
            record_update("increment", "success");
            record_update("decrement", "rejected");
            record_error("decrement", "illegal_operation");
            record_push("success", Duration::from_millis(12));
            set_instances_active(7);
        });

        let snapshot = snapshotter.snapshot().into_vec();

        let updates: u64 = snapshot
            .iter()
            .filter(|(key, _, _, _)| key.key().name() == "kpi_metrics_updates_total")
            .map(|(_, _, _, value)| match value {
                DebugValue::Counter(v) => *v,
                _ => 0,
            })
            .sum();
        assert_eq!(updates, 3);

        let gauge_value = snapshot
            .iter()
            .find(|(key, _, _, _)| key.key().name() == "kpi_metrics_instances_active")
            .map(|(_, _, _, value)| match value {
                DebugValue::Gauge(v) => v.into_inner(),
                _ => -1.0,
            });
        assert_eq!(gauge_value, Some(7.0));

        assert!(snapshot
            .iter()
            .any(|(key, _, _, _)| key.key().name() == "kpi_metrics_push_duration_seconds"));
    }
}
