//! Metric registry: binds catalog entries into export families.
//!
//! Each KPI becomes one `prometheus` `CounterVec` or `GaugeVec` registered in
//! a private backend registry, exported as `<namespace>_<name>`. Callers keep
//! addressing metrics by their catalog name.

use crate::catalog::Catalog;
use crate::errors::{poisoned, KpiError, Result};
use crate::labels::LabelSet;
use crate::models::{KpiSpec, MetricKind};
use crate::store::{InstanceHandle, InstanceStore};
use prometheus::core::Collector;
use prometheus::proto::MetricFamily;
use prometheus::{CounterVec, GaugeVec, Opts};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

/// Backend vector for one family. Closed over the two metric kinds.
#[derive(Clone)]
enum FamilyVec {
    Counter(CounterVec),
    Gauge(GaugeVec),
}

/// A registered, exportable metric family.
#[derive(Clone)]
pub struct Family {
    spec: Arc<KpiSpec>,
    vec: FamilyVec,
}

impl Family {
    fn new(spec: Arc<KpiSpec>, namespace: &str) -> Result<Self> {
        let opts = Opts::new(spec.name.clone(), spec.help()).namespace(namespace.to_string());
        let label_names: Vec<&str> = spec.label_keys.iter().map(String::as_str).collect();

        let vec = match spec.kind {
            MetricKind::Counter => FamilyVec::Counter(CounterVec::new(opts, &label_names)?),
            MetricKind::Gauge => FamilyVec::Gauge(GaugeVec::new(opts, &label_names)?),
        };
        Ok(Self { spec, vec })
    }

    pub fn spec(&self) -> &Arc<KpiSpec> {
        &self.spec
    }

    fn collector(&self) -> Box<dyn Collector> {
        match &self.vec {
            FamilyVec::Counter(v) => Box::new(v.clone()),
            FamilyVec::Gauge(v) => Box::new(v.clone()),
        }
    }

    /// Create (or fetch) the backend child for a canonical label set.
    ///
    /// `labels` must already be canonicalized against this family's spec so
    /// its values line up with the declared label order.
    pub(crate) fn child(&self, labels: &LabelSet) -> Result<InstanceHandle> {
        let values = labels.values();
        let handle = match &self.vec {
            FamilyVec::Counter(v) => {
                InstanceHandle::Counter(v.get_metric_with_label_values(&values)?)
            }
            FamilyVec::Gauge(v) => InstanceHandle::Gauge(v.get_metric_with_label_values(&values)?),
        };
        Ok(handle)
    }
}

/// Registry of exportable families backed by a `prometheus::Registry`.
pub struct Registry {
    backend: prometheus::Registry,
    namespace: String,
    families: RwLock<BTreeMap<String, Arc<Family>>>,
}

impl Registry {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            backend: prometheus::Registry::new(),
            namespace: namespace.into(),
            families: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Bind every catalog entry into the backend.
    ///
    /// Holds the write lock for the whole call, so concurrent `register`
    /// calls serialize and `list` never sees a partial result. If any name is
    /// already registered nothing is bound.
    ///
    /// # Errors
    ///
    /// `AlreadyRegistered` naming the first clashing metric, or `Internal` if
    /// the backend rejects a family (already bound families from this call
    /// are unregistered again).
    pub fn register(&self, catalog: &Catalog) -> Result<Vec<String>> {
        let mut families = self.families.write().map_err(poisoned)?;

        if let Some(existing) = catalog.iter().find(|spec| families.contains_key(&spec.name)) {
            return Err(KpiError::AlreadyRegistered(existing.name.clone()));
        }

        let mut bound: Vec<Family> = Vec::with_capacity(catalog.len());
        for spec in catalog.iter() {
            let result = Family::new(Arc::clone(spec), &self.namespace).and_then(|family| {
                self.backend.register(family.collector())?;
                Ok(family)
            });

            match result {
                Ok(family) => bound.push(family),
                Err(err) => {
                    self.rollback(&bound);
                    let err = match err {
                        KpiError::AlreadyRegistered(_) => {
                            KpiError::AlreadyRegistered(spec.name.clone())
                        }
                        other => other,
                    };
                    warn!(
                        target: "kpi_metrics.registry",
                        metric = %spec.name,
                        error = %err,
                        "Family registration failed, rolled back"
                    );
                    return Err(err);
                }
            }
        }

        let mut names = Vec::with_capacity(bound.len());
        for family in bound {
            debug!(
                target: "kpi_metrics.registry",
                metric = %family.spec.name,
                kind = %family.spec.kind,
                "Registered metric family"
            );
            names.push(family.spec.name.clone());
            families.insert(family.spec.name.clone(), Arc::new(family));
        }

        info!(
            target: "kpi_metrics.registry",
            registered = names.len(),
            namespace = %self.namespace,
            "Metrics registered"
        );
        Ok(names)
    }

    fn rollback(&self, bound: &[Family]) {
        for family in bound {
            if let Err(e) = self.backend.unregister(family.collector()) {
                warn!(
                    target: "kpi_metrics.registry",
                    metric = %family.spec.name,
                    error = %e,
                    "Failed to roll back family registration"
                );
            }
        }
    }

    /// Run `f` against the registered family for `name` while holding the
    /// registry read lock. `reset` and `unregister` take the write lock, so
    /// an instance created inside `f` can never outlive its family.
    pub(crate) fn with_family<R, F>(&self, name: &str, f: F) -> Result<R>
    where
        F: FnOnce(Option<&Family>) -> Result<R>,
    {
        let families = self.families.read().map_err(poisoned)?;
        f(families.get(name).map(Arc::as_ref))
    }

    /// Registered metric names in sorted order.
    pub fn list(&self) -> Result<Vec<String>> {
        let families = self.families.read().map_err(poisoned)?;
        Ok(families.keys().cloned().collect())
    }

    /// All registered families in name order.
    pub fn families(&self) -> Result<Vec<Arc<Family>>> {
        let families = self.families.read().map_err(poisoned)?;
        Ok(families.values().cloned().collect())
    }

    /// Snapshot of the backend. Values are copied, no lock is held afterwards.
    pub fn gather(&self) -> Vec<MetricFamily> {
        self.backend.gather()
    }

    /// Unregister one family and drop its instances from `store`.
    ///
    /// # Errors
    ///
    /// `NotRegistered` if `name` is not bound.
    pub fn unregister(&self, name: &str, store: &InstanceStore) -> Result<()> {
        let mut families = self.families.write().map_err(poisoned)?;
        let family = families
            .remove(name)
            .ok_or_else(|| KpiError::NotRegistered(name.to_string()))?;
        self.unbind(&family, "unregister");
        let dropped = store.remove_metric(name)?;
        info!(
            target: "kpi_metrics.registry",
            metric = %name,
            instances = dropped,
            "Metric unregistered"
        );
        Ok(())
    }

    /// Unregister every family and drop every instance from `store`.
    pub fn reset(&self, store: &InstanceStore) -> Result<()> {
        let mut families = self.families.write().map_err(poisoned)?;
        for family in families.values() {
            self.unbind(family, "reset");
        }
        families.clear();
        store.clear()
    }

    fn unbind(&self, family: &Family, operation: &str) {
        if let Err(e) = self.backend.unregister(family.collector()) {
            warn!(
                target: "kpi_metrics.registry",
                metric = %family.spec.name,
                operation,
                error = %e,
                "Failed to unregister family from backend"
            );
        }
    }
}
