//! Label sets and their canonical form.
//!
//! A [`LabelSet`] is backed by a `BTreeMap`, so two label sets with the same
//! pairs compare and hash equal regardless of insertion order. The store uses
//! it directly as part of the instance key.

use crate::errors::{KpiError, Result};
use crate::models::KpiSpec;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// How strictly a label set must match the KPI's declared keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LabelPolicy {
    /// The supplied keys must equal the declared keys.
    #[default]
    Exact,
    /// The supplied keys may be any subset of the declared keys. Missing keys
    /// are exported with an empty value.
    Subset,
}

impl FromStr for LabelPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact" => Ok(LabelPolicy::Exact),
            "subset" => Ok(LabelPolicy::Subset),
            other => Err(format!("expected 'exact' or 'subset', got '{other}'")),
        }
    }
}

/// Canonical, order-independent set of label pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LabelSet(BTreeMap<String, String>);

impl LabelSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a label set from pairs, rejecting a key that appears twice.
    ///
    /// # Errors
    ///
    /// `InvalidLabels` naming the repeated key. `metric` is only used for the
    /// error message.
    pub fn from_pairs<K, V>(metric: &str, pairs: impl IntoIterator<Item = (K, V)>) -> Result<Self>
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut map = BTreeMap::new();
        for (key, value) in pairs {
            let key = key.into();
            if map.contains_key(&key) {
                return Err(KpiError::InvalidLabels {
                    metric: metric.to_string(),
                    reason: format!("label '{key}' supplied twice"),
                });
            }
            map.insert(key, value.into());
        }
        Ok(Self(map))
    }

    /// Decode the flat boundary encoding: `key0, value0, key1, value1, ...`.
    ///
    /// # Errors
    ///
    /// `InvalidLabels` on an odd number of entries or a repeated key.
    pub fn from_flat(metric: &str, flat: &[String]) -> Result<Self> {
        if flat.len() % 2 != 0 {
            return Err(KpiError::InvalidLabels {
                metric: metric.to_string(),
                reason: format!("odd label array length {}", flat.len()),
            });
        }
        let pairs = flat
            .chunks_exact(2)
            .filter_map(|pair| match pair {
                [key, value] => Some((key.clone(), value.clone())),
                _ => None,
            });
        Self::from_pairs(metric, pairs)
    }

    /// Add or replace a pair.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Validate against a KPI's schema and return the canonical set that
    /// identifies the instance.
    ///
    /// Under `Subset`, declared-but-missing keys are filled with `""` so that
    /// `{}` and `{k: ""}` resolve to the same instance.
    ///
    /// # Errors
    ///
    /// `InvalidLabels` on an undeclared key, or a missing key under `Exact`.
    pub fn canonicalize(&self, spec: &KpiSpec, policy: LabelPolicy) -> Result<LabelSet> {
        if let Some(unknown) = self.0.keys().find(|k| !spec.label_keys.contains(*k)) {
            return Err(KpiError::InvalidLabels {
                metric: spec.name.clone(),
                reason: format!("undeclared label '{unknown}'"),
            });
        }

        let mut canonical = BTreeMap::new();
        for key in &spec.label_keys {
            match (self.0.get(key), policy) {
                (Some(value), _) => {
                    canonical.insert(key.clone(), value.clone());
                }
                (None, LabelPolicy::Subset) => {
                    canonical.insert(key.clone(), String::new());
                }
                (None, LabelPolicy::Exact) => {
                    return Err(KpiError::InvalidLabels {
                        metric: spec.name.clone(),
                        reason: format!("missing label '{key}'"),
                    });
                }
            }
        }
        Ok(LabelSet(canonical))
    }

    /// Values in key order, matching the export family's label order.
    pub(crate) fn values(&self) -> Vec<&str> {
        self.0.values().map(String::as_str).collect()
    }
}

impl fmt::Display for LabelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (k, v)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{k}=\"{v}\"")?;
        }
        f.write_str("}")
    }
}
