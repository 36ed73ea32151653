//! Metric instance store.
//!
//! Maps `(metric name, canonical label set)` to a live instance. Lookups take
//! the read lock; creation re-checks under the write lock so concurrent first
//! updates on one key produce exactly one instance. Value changes go through
//! the backend's atomic f64 and never need the map lock.

use crate::errors::{poisoned, KpiError, Result};
use crate::labels::LabelSet;
use crate::models::{MetricKind, Operation};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

/// Backend child for one time series.
#[derive(Debug, Clone)]
pub(crate) enum InstanceHandle {
    Counter(prometheus::Counter),
    Gauge(prometheus::Gauge),
}

/// Identity of an instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceKey {
    pub metric: String,
    pub labels: LabelSet,
}

impl InstanceKey {
    pub fn new(metric: impl Into<String>, labels: LabelSet) -> Self {
        Self {
            metric: metric.into(),
            labels,
        }
    }
}

/// A live metric instance. Its kind is inherited from the KPI spec and
/// never changes.
#[derive(Debug)]
pub struct Instance {
    handle: InstanceHandle,
}

impl Instance {
    pub(crate) fn new(handle: InstanceHandle) -> Self {
        Self { handle }
    }

    pub fn value(&self) -> f64 {
        match &self.handle {
            InstanceHandle::Counter(c) => c.get(),
            InstanceHandle::Gauge(g) => g.get(),
        }
    }

    /// Apply one atomic update.
    ///
    /// The dispatcher checks legality first; the counter arms here still
    /// refuse illegal operations so a counter can never move backwards.
    pub(crate) fn apply(&self, metric: &str, op: Operation) -> Result<()> {
        match (&self.handle, op) {
            (InstanceHandle::Counter(c), Operation::Increment) => c.inc(),
            (InstanceHandle::Counter(c), Operation::Add(v)) if v >= 0.0 => c.inc_by(v),
            (InstanceHandle::Counter(_), op) => {
                return Err(KpiError::IllegalOperation {
                    metric: metric.to_string(),
                    kind: MetricKind::Counter.as_str(),
                    operation: op.name(),
                })
            }
            (InstanceHandle::Gauge(g), Operation::Increment) => g.inc(),
            (InstanceHandle::Gauge(g), Operation::Decrement) => g.dec(),
            (InstanceHandle::Gauge(g), Operation::Add(v)) => g.add(v),
            (InstanceHandle::Gauge(g), Operation::Set(v)) => g.set(v),
        }
        Ok(())
    }
}

/// Instance store keyed by canonical label set.
#[derive(Default)]
pub struct InstanceStore {
    instances: RwLock<HashMap<InstanceKey, Arc<Instance>>>,
}

impl InstanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &InstanceKey) -> Result<Option<Arc<Instance>>> {
        let instances = self.instances.read().map_err(poisoned)?;
        Ok(instances.get(key).cloned())
    }

    /// Return the instance for `key`, creating it with `create` if absent.
    ///
    /// `create` runs under the write lock and at most once per key.
    pub(crate) fn get_or_create<F>(&self, key: &InstanceKey, create: F) -> Result<Arc<Instance>>
    where
        F: FnOnce() -> Result<Instance>,
    {
        if let Some(existing) = self.get(key)? {
            return Ok(existing);
        }

        let mut instances = self.instances.write().map_err(poisoned)?;
        if let Some(existing) = instances.get(key) {
            return Ok(Arc::clone(existing));
        }
        let instance = Arc::new(create()?);
        instances.insert(key.clone(), Arc::clone(&instance));
        Ok(instance)
    }

    /// Sorted names of metrics with at least one instance.
    pub fn instantiated_names(&self) -> Result<Vec<String>> {
        let instances = self.instances.read().map_err(poisoned)?;
        let names: BTreeSet<&String> = instances.keys().map(|k| &k.metric).collect();
        Ok(names.into_iter().cloned().collect())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.instances.read().map_err(poisoned)?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Drop every instance. Only used on registry reset.
    pub fn clear(&self) -> Result<()> {
        self.instances.write().map_err(poisoned)?.clear();
        Ok(())
    }

    /// Drop every instance of one metric. Returns how many were removed.
    pub fn remove_metric(&self, metric: &str) -> Result<usize> {
        let mut instances = self.instances.write().map_err(poisoned)?;
        let before = instances.len();
        instances.retain(|key, _| key.metric != metric);
        Ok(before - instances.len())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn gauge() -> Instance {
        Instance::new(InstanceHandle::Gauge(
            prometheus::Gauge::new("g", "help").unwrap(),
        ))
    }

    fn counter() -> Instance {
        Instance::new(InstanceHandle::Counter(
            prometheus::Counter::new("c", "help").unwrap(),
        ))
    }

    #[test]
    fn test_counter_apply() {
        let c = counter();
        c.apply("c", Operation::Increment).unwrap();
        c.apply("c", Operation::Add(5.5)).unwrap();
        assert!((c.value() - 6.5).abs() < f64::EPSILON);

        assert!(c.apply("c", Operation::Decrement).is_err());
        assert!(c.apply("c", Operation::Set(1.0)).is_err());
        assert!(c.apply("c", Operation::Add(-1.0)).is_err());
        assert!((c.value() - 6.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_gauge_apply() {
        let g = gauge();
        g.apply("g", Operation::Set(95.5)).unwrap();
        assert_eq!(g.value(), 95.5);
        g.apply("g", Operation::Decrement).unwrap();
        g.apply("g", Operation::Add(-10.0)).unwrap();
        g.apply("g", Operation::Increment).unwrap();
        assert_eq!(g.value(), 85.5);
    }

    #[test]
    fn test_get_or_create_creates_once() {
        let store = InstanceStore::new();
        let key = InstanceKey::new("g", LabelSet::new().with("a", "1"));
        let calls = AtomicUsize::new(0);

        let first = store
            .get_or_create(&key, || {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(gauge())
            })
            .unwrap();
        let second = store
            .get_or_create(&key, || {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(gauge())
            })
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_create_leaves_store_empty() {
        let store = InstanceStore::new();
        let key = InstanceKey::new("g", LabelSet::new());
        let result = store.get_or_create(&key, || Err(KpiError::Internal("boom".to_string())));
        assert!(result.is_err());
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_instantiated_names_sorted_and_unique() {
        let store = InstanceStore::new();
        for (metric, value) in [("b", "1"), ("a", "1"), ("b", "2")] {
            let key = InstanceKey::new(metric, LabelSet::new().with("k", value));
            store.get_or_create(&key, || Ok(gauge())).unwrap();
        }
        assert_eq!(store.instantiated_names().unwrap(), vec!["a", "b"]);
        assert_eq!(store.len().unwrap(), 3);

        assert_eq!(store.remove_metric("b").unwrap(), 2);
        assert_eq!(store.instantiated_names().unwrap(), vec!["a"]);
        assert_eq!(store.remove_metric("b").unwrap(), 0);

        store.clear().unwrap();
        assert!(store.instantiated_names().unwrap().is_empty());
    }
}
