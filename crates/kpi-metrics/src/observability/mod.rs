//! Observability for the KPI library itself.
//!
//! The library reports its own operation counts through the `metrics`
//! facade. Nothing is recorded unless the host process installs a recorder.
//!
//! | Metric | Type | Labels | Purpose |
//! |--------|------|--------|---------|
//! | `kpi_metrics_updates_total` | Counter | `operation`, `status` | Update calls by outcome |
//! | `kpi_metrics_errors_total` | Counter | `operation`, `error_type` | Failures by error variant |
//! | `kpi_metrics_push_total` | Counter | `status` | Pushgateway deliveries |
//! | `kpi_metrics_push_duration_seconds` | Histogram | `status` | Push latency |
//! | `kpi_metrics_instances_active` | Gauge | none | Live metric instances |

pub mod metrics;
