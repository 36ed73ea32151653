//! KPI catalog loading.
//!
//! A KPI source is a JSON array of KPI objects:
//!
//! ```json
//! [
//!   {
//!     "name": "MeanRegSubsAMF",
//!     "displayName": "Mean Registered Subscribers AMF",
//!     "description": "Mean number of registered subscribers",
//!     "prometheus_type": "Counter",
//!     "object": ["Network", "NetworkSlice"]
//!   }
//! ]
//! ```
//!
//! Loading is all-or-nothing: any malformed entry, duplicate name or unknown
//! kind fails the whole load and no catalog is produced.

use crate::errors::{KpiError, Result};
use crate::models::{KpiSpec, MetricKind};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Raw KPI entry as it appears in the source. Unknown fields are ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawKpi {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    unit: Option<String>,
    #[serde(rename = "prometheus_type", alias = "kind")]
    prometheus_type: String,
    #[serde(default, rename = "object", alias = "labels")]
    object: Vec<String>,
}

/// Mapping from metric name to KPI specification.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    specs: BTreeMap<String, Arc<KpiSpec>>,
}

impl Catalog {
    /// Load a catalog from a JSON file.
    ///
    /// # Errors
    ///
    /// `Io` if the file cannot be read, otherwise see [`Catalog::from_json`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| KpiError::Io(format!("{}: {e}", path.display())))?;
        let catalog = Self::from_json(&contents)?;
        info!(
            target: "kpi_metrics.catalog",
            path = %path.display(),
            kpis = catalog.len(),
            "KPI catalog loaded"
        );
        Ok(catalog)
    }

    /// Parse a catalog from JSON text.
    ///
    /// # Errors
    ///
    /// - `Parse` on malformed JSON, a missing identifier, an invalid metric
    ///   name or label key, or a repeated label key
    /// - `UnknownKind` on a kind other than Counter/Gauge
    /// - `DuplicateName` when two entries normalize to the same name
    pub fn from_json(source: &str) -> Result<Self> {
        let raw: Vec<RawKpi> =
            serde_json::from_str(source).map_err(|e| KpiError::Parse(e.to_string()))?;

        let mut specs = BTreeMap::new();
        for (index, entry) in raw.into_iter().enumerate() {
            let spec = build_spec(index, entry)?;
            if specs.contains_key(&spec.name) {
                return Err(KpiError::DuplicateName(spec.name));
            }
            debug!(
                target: "kpi_metrics.catalog",
                metric = %spec.name,
                kind = %spec.kind,
                labels = spec.label_keys.len(),
                "KPI parsed"
            );
            specs.insert(spec.name.clone(), Arc::new(spec));
        }

        Ok(Self { specs })
    }

    /// Build a catalog from already-validated specifications.
    ///
    /// # Errors
    ///
    /// `DuplicateName` if two specs share a name.
    pub fn from_specs(specs: impl IntoIterator<Item = KpiSpec>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for spec in specs {
            if map.contains_key(&spec.name) {
                return Err(KpiError::DuplicateName(spec.name));
            }
            map.insert(spec.name.clone(), Arc::new(spec));
        }
        Ok(Self { specs: map })
    }

    /// Look up a specification by already-normalized name.
    pub fn get(&self, name: &str) -> Option<&Arc<KpiSpec>> {
        self.specs.get(name)
    }

    /// Specifications in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<KpiSpec>> {
        self.specs.values()
    }

    pub fn names(&self) -> Vec<String> {
        self.specs.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

fn build_spec(index: usize, entry: RawKpi) -> Result<KpiSpec> {
    let display_name = entry
        .display_name
        .filter(|s| !s.trim().is_empty())
        .or(entry.name.filter(|s| !s.trim().is_empty()))
        .ok_or_else(|| {
            KpiError::Parse(format!("KPI entry {index} has neither displayName nor name"))
        })?;

    let name = normalize_metric_name(&display_name);
    if !is_valid_metric_name(&name) {
        return Err(KpiError::Parse(format!(
            "KPI entry {index}: '{display_name}' does not normalize to a valid metric name"
        )));
    }

    let kind = MetricKind::parse(&entry.prometheus_type).ok_or_else(|| KpiError::UnknownKind {
        metric: name.clone(),
        kind: entry.prometheus_type.clone(),
    })?;

    let mut label_keys = BTreeSet::new();
    for key in entry.object {
        if !is_valid_label_key(&key) {
            return Err(KpiError::Parse(format!(
                "KPI {name}: invalid label key '{key}'"
            )));
        }
        if !label_keys.insert(key.clone()) {
            return Err(KpiError::Parse(format!(
                "KPI {name}: label key '{key}' declared twice"
            )));
        }
    }

    Ok(KpiSpec {
        name,
        display_name,
        kind,
        label_keys,
        description: entry.description,
        unit: entry.unit.filter(|u| !u.trim().is_empty()),
    })
}

/// Normalize a KPI display name into a metric name.
///
/// Lowercases, maps spaces and `-` to `_`, drops parentheses and prefixes a
/// leading digit with `g`.
pub fn normalize_metric_name(display_name: &str) -> String {
    let mut name: String = display_name
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| *c != '(' && *c != ')')
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect();
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, 'g');
    }
    name
}

/// `[a-zA-Z_:][a-zA-Z0-9_:]*`
fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

/// `[a-zA-Z_][a-zA-Z0-9_]*`, excluding the reserved `__` prefix.
fn is_valid_label_key(key: &str) -> bool {
    if key.starts_with("__") {
        return false;
    }
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
