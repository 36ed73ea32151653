//! KPI catalog fixtures.
//!
//! The scenario catalog mirrors a small AMF deployment: one counter with two
//! labels and one gauge with a single label.

use std::io::Write;
use tempfile::NamedTempFile;

/// Display name of the scenario counter.
pub const AMF_SUBSCRIBERS: &str = "Mean Registered Subscribers AMF";

/// Normalized name of the scenario counter.
pub const AMF_SUBSCRIBERS_NAME: &str = "mean_registered_subscribers_amf";

/// Display name of the scenario gauge.
pub const REGISTRATION_RATE: &str = "Registration success rate (single slice)";

/// Normalized name of the scenario gauge.
pub const REGISTRATION_RATE_NAME: &str = "registration_success_rate_single_slice";

/// Two-KPI catalog used by the end-to-end scenario.
pub const SCENARIO_KPIS: &str = r#"[
  {
    "name": "MeanRegSubsAMF",
    "displayName": "Mean Registered Subscribers AMF",
    "description": "Mean number of subscribers registered at the AMF",
    "formula": "sum(RM.RegisteredSubNbrMean)",
    "unit": "subscribers",
    "type": "MEAN",
    "object": ["Network", "NetworkSlice"],
    "prometheus_type": "Counter",
    "nf_type": "AMF",
    "increment": "on_registration",
    "decrement": ""
  },
  {
    "name": "RegSuccRateSingleSlice",
    "displayName": "Registration success rate (single slice)",
    "description": "Successful initial registrations over attempts",
    "formula": "100 * AMF.RegSucc / AMF.RegAtt",
    "unit": "%",
    "type": "RATIO",
    "object": ["NetworkSlice"],
    "prometheus_type": "Gauge",
    "nf_type": "AMF"
  }
]"#;

/// Catalog with two entries that normalize to the same name.
pub const DUPLICATE_KPIS: &str = r#"[
  {"displayName": "Attach Attempts", "prometheus_type": "Counter"},
  {"displayName": "attach-attempts", "prometheus_type": "Gauge"}
]"#;

/// Catalog with an unsupported kind.
pub const UNKNOWN_KIND_KPIS: &str = r#"[
  {"displayName": "Attach Latency", "prometheus_type": "Histogram"}
]"#;

/// Write `contents` to a temporary `.json` file that lives as long as the
/// returned handle.
pub fn write_catalog(contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .prefix("kpi-")
        .suffix(".json")
        .tempfile()
        .expect("Failed to create temporary catalog file");
    file.write_all(contents.as_bytes())
        .expect("Failed to write temporary catalog file");
    file.flush().expect("Failed to flush temporary catalog file");
    file
}

/// Labels for the scenario counter.
pub fn amf_labels() -> kpi_metrics::LabelSet {
    kpi_metrics::LabelSet::new()
        .with("Network", "test_network")
        .with("NetworkSlice", "test_slice")
}

/// Labels for the scenario gauge.
pub fn slice_labels() -> kpi_metrics::LabelSet {
    kpi_metrics::LabelSet::new().with("NetworkSlice", "test_slice")
}
