//! Data models: metric kinds, update operations, KPI specifications.

use std::collections::BTreeSet;
use std::fmt;

/// Kind of a KPI metric. Fixed for the lifetime of the catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    /// Monotonically non-decreasing.
    Counter,
    /// Arbitrarily settable.
    Gauge,
}

impl MetricKind {
    /// Parse a kind from a KPI source string (case-insensitive).
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "counter" => Some(MetricKind::Counter),
            "gauge" => Some(MetricKind::Gauge),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::Counter => "Counter",
            MetricKind::Gauge => "Gauge",
        }
    }

    /// Legality rule table. Total over `(kind, operation)`.
    ///
    /// | Operation | Counter      | Gauge |
    /// |-----------|--------------|-------|
    /// | Increment | yes          | yes   |
    /// | Decrement | no           | yes   |
    /// | Add(v)    | only `v >= 0`| yes   |
    /// | Set(v)    | no           | yes   |
    pub fn permits(self, op: Operation) -> bool {
        match (self, op) {
            (MetricKind::Gauge, _) | (MetricKind::Counter, Operation::Increment) => true,
            (MetricKind::Counter, Operation::Add(value)) => value >= 0.0,
            (MetricKind::Counter, Operation::Decrement | Operation::Set(_)) => false,
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single update requested by a caller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operation {
    Increment,
    Decrement,
    Add(f64),
    Set(f64),
}

impl Operation {
    /// Bounded operation name, used in errors, logs and metric labels.
    pub fn name(self) -> &'static str {
        match self {
            Operation::Increment => "increment",
            Operation::Decrement => "decrement",
            Operation::Add(_) => "add",
            Operation::Set(_) => "set",
        }
    }
}

/// Immutable KPI specification, owned by the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct KpiSpec {
    /// Normalized metric name used for lookup and export.
    pub name: String,
    /// Human-readable name as written in the KPI source.
    pub display_name: String,
    pub kind: MetricKind,
    /// Declared label keys; iteration order is the export label order.
    pub label_keys: BTreeSet<String>,
    pub description: String,
    pub unit: Option<String>,
}

impl KpiSpec {
    /// Help text for the exported family. Prometheus rejects empty help.
    pub fn help(&self) -> String {
        if self.description.trim().is_empty() {
            self.display_name.clone()
        } else {
            self.description.clone()
        }
    }
}
