//! Update dispatcher: validates an update and applies it to the store.
//!
//! Steps, in order:
//! 1. resolve the registered family (`NotRegistered` if the catalog knows
//!    the name, `UnknownMetric` otherwise)
//! 2. validate the label set against the registered schema (`InvalidLabels`)
//! 3. check the kind rule table (`IllegalOperation`)
//! 4. resolve or lazily create the instance
//! 5. apply the change atomically
//!
//! The spec a family was registered with is authoritative: reloading the
//! catalog does not change how an already bound metric is validated until it
//! is unregistered and registered again. A rejected update never creates an
//! instance.

use crate::catalog::{normalize_metric_name, Catalog};
use crate::errors::{KpiError, Result};
use crate::labels::{LabelPolicy, LabelSet};
use crate::models::Operation;
use crate::observability::metrics as self_metrics;
use crate::registry::{Family, Registry};
use crate::store::{Instance, InstanceKey, InstanceStore};
use std::sync::Arc;
use tracing::{debug, trace};

/// Borrowed view over the state an update touches.
pub struct Dispatcher<'a> {
    pub catalog: &'a Catalog,
    pub registry: &'a Registry,
    pub store: &'a InstanceStore,
    pub policy: LabelPolicy,
}

impl Dispatcher<'_> {
    /// Resolve a metric and label set to the instance key it identifies,
    /// without checking the operation. Unregistered metrics are validated
    /// against the catalog.
    ///
    /// # Errors
    ///
    /// `UnknownMetric` or `InvalidLabels`.
    pub fn resolve(&self, metric: &str, labels: &LabelSet) -> Result<InstanceKey> {
        let name = normalize_metric_name(metric);
        let canonical = self.registry.with_family(&name, |family| {
            let spec = match family {
                Some(family) => family.spec(),
                None => self
                    .catalog
                    .get(&name)
                    .ok_or_else(|| KpiError::UnknownMetric(metric.to_string()))?,
            };
            labels.canonicalize(spec, self.policy)
        })?;
        Ok(InstanceKey::new(name, canonical))
    }

    /// Validate and apply one update. Returns the updated instance.
    ///
    /// # Errors
    ///
    /// `UnknownMetric`, `NotRegistered`, `InvalidLabels` or
    /// `IllegalOperation`; the store is unchanged on any error.
    pub fn apply(&self, metric: &str, labels: &LabelSet, op: Operation) -> Result<Arc<Instance>> {
        let result = self.apply_inner(metric, labels, op);
        match &result {
            Ok(_) => self_metrics::record_update(op.name(), "success"),
            Err(err) => {
                self_metrics::record_update(op.name(), "rejected");
                self_metrics::record_error(op.name(), err.error_type_label());
            }
        }
        result
    }

    fn apply_inner(&self, metric: &str, labels: &LabelSet, op: Operation) -> Result<Arc<Instance>> {
        let name = normalize_metric_name(metric);
        let lookup = name.clone();
        self.registry.with_family(&lookup, move |family| match family {
            Some(family) => self.apply_to_family(family, name, labels, op),
            None if self.catalog.get(&name).is_some() => Err(KpiError::NotRegistered(name)),
            None => Err(KpiError::UnknownMetric(metric.to_string())),
        })
    }

    fn apply_to_family(
        &self,
        family: &Family,
        name: String,
        labels: &LabelSet,
        op: Operation,
    ) -> Result<Arc<Instance>> {
        let spec = family.spec();
        let canonical = labels.canonicalize(spec, self.policy)?;

        if !spec.kind.permits(op) {
            debug!(
                target: "kpi_metrics.dispatch",
                metric = %name,
                kind = %spec.kind,
                operation = op.name(),
                "Operation rejected for metric kind"
            );
            return Err(KpiError::IllegalOperation {
                metric: name,
                kind: spec.kind.as_str(),
                operation: op.name(),
            });
        }

        let key = InstanceKey::new(name, canonical);
        let instance = self.store.get_or_create(&key, || {
            let handle = family.child(&key.labels)?;
            trace!(
                target: "kpi_metrics.dispatch",
                metric = %key.metric,
                labels = %key.labels,
                "Created metric instance"
            );
            Ok(Instance::new(handle))
        })?;

        instance.apply(&key.metric, op)?;
        Ok(instance)
    }
}
