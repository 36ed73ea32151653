//! The metrics context: one explicit object owning all library state.
//!
//! # Lifecycle
//!
//! A context is created once with a backend and namespace, loads a KPI
//! catalog, registers it, and then serves updates and exports until it is
//! dropped or [`MetricsContext::reset`]. The C façade keeps exactly one
//! context per process; Rust callers may create as many as they like.

use crate::catalog::{normalize_metric_name, Catalog};
use crate::config::{BackendKind, Config};
use crate::dispatcher::Dispatcher;
use crate::errors::{poisoned, KpiError, Result};
use crate::exporter::{encode_text, PushClient};
use crate::labels::LabelSet;
use crate::models::{KpiSpec, MetricKind, Operation};
use crate::observability::metrics as self_metrics;
use crate::registry::Registry;
use crate::store::InstanceStore;
use std::path::Path;
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

/// Owner of catalog, registry, instance store and push client.
pub struct MetricsContext {
    config: Config,
    catalog: RwLock<Arc<Catalog>>,
    registry: Registry,
    store: InstanceStore,
    push_client: PushClient,
}

impl MetricsContext {
    /// Create a context.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `namespace` is not a valid metric-name prefix,
    /// `Internal` if the push client cannot be built.
    pub fn new(backend: BackendKind, namespace: &str, config: Config) -> Result<Self> {
        validate_namespace(namespace)?;
        let push_client = PushClient::new(config.push_timeout)?;

        info!(
            target: "kpi_metrics.context",
            backend = ?backend,
            namespace = %namespace,
            label_policy = ?config.label_policy,
            "Metrics context created"
        );

        Ok(Self {
            config,
            catalog: RwLock::new(Arc::new(Catalog::default())),
            registry: Registry::new(namespace),
            store: InstanceStore::new(),
            push_client,
        })
    }

    pub fn namespace(&self) -> &str {
        self.registry.namespace()
    }

    /// Current catalog snapshot.
    pub fn catalog(&self) -> Result<Arc<Catalog>> {
        Ok(Arc::clone(&*self.catalog.read().map_err(poisoned)?))
    }

    /// Load a KPI file and replace the catalog. On failure the previous
    /// catalog stays in place. Returns the number of KPIs loaded.
    ///
    /// # Errors
    ///
    /// See [`Catalog::load`].
    pub fn load_kpis(&self, path: impl AsRef<Path>) -> Result<usize> {
        let catalog = Catalog::load(path).inspect_err(|e| record_failure("load", e))?;
        self.install_catalog(catalog)
    }

    /// Replace the catalog with one built elsewhere.
    ///
    /// # Errors
    ///
    /// `Internal` on a poisoned lock.
    pub fn install_catalog(&self, catalog: Catalog) -> Result<usize> {
        let count = catalog.len();
        *self.catalog.write().map_err(poisoned)? = Arc::new(catalog);
        Ok(count)
    }

    /// Bind the current catalog into the export backend.
    ///
    /// # Errors
    ///
    /// `AlreadyRegistered` if any catalog name is already bound.
    pub fn register_metrics(&self) -> Result<Vec<String>> {
        let catalog = self.catalog()?;
        self.registry
            .register(&catalog)
            .inspect_err(|e| record_failure("register", e))
    }

    /// Unregister one metric and drop all of its instances. The catalog is
    /// kept, so the metric can be registered again.
    ///
    /// # Errors
    ///
    /// `NotRegistered` if the metric is not bound.
    pub fn unregister_metric(&self, metric: &str) -> Result<()> {
        let name = normalize_metric_name(metric);
        self.registry
            .unregister(&name, &self.store)
            .inspect_err(|e| record_failure("unregister", e))?;
        self_metrics::set_instances_active(self.store.len()?);
        Ok(())
    }

    /// Names bound in the registry, sorted.
    pub fn registered_metrics(&self) -> Result<Vec<String>> {
        self.registry.list()
    }

    /// Specs of the bound metrics, in name order. These are the specs
    /// updates are validated against.
    pub fn registered_specs(&self) -> Result<Vec<Arc<KpiSpec>>> {
        Ok(self
            .registry
            .families()?
            .iter()
            .map(|family| Arc::clone(family.spec()))
            .collect())
    }

    /// Validate and apply one update.
    ///
    /// # Errors
    ///
    /// `UnknownMetric`, `NotRegistered`, `InvalidLabels` or
    /// `IllegalOperation`.
    pub fn apply(&self, metric: &str, labels: &LabelSet, op: Operation) -> Result<()> {
        let catalog = self.catalog()?;
        let dispatcher = Dispatcher {
            catalog: &catalog,
            registry: &self.registry,
            store: &self.store,
            policy: self.config.label_policy,
        };
        dispatcher.apply(metric, labels, op)?;
        self_metrics::set_instances_active(self.store.len()?);
        Ok(())
    }

    pub fn increment(&self, metric: &str, labels: &LabelSet) -> Result<()> {
        self.apply(metric, labels, Operation::Increment)
    }

    pub fn decrement(&self, metric: &str, labels: &LabelSet) -> Result<()> {
        self.apply(metric, labels, Operation::Decrement)
    }

    pub fn add(&self, metric: &str, value: f64, labels: &LabelSet) -> Result<()> {
        self.apply(metric, labels, Operation::Add(value))
    }

    pub fn set(&self, metric: &str, value: f64, labels: &LabelSet) -> Result<()> {
        self.apply(metric, labels, Operation::Set(value))
    }

    /// Current value of one instance, `None` if it was never updated.
    ///
    /// # Errors
    ///
    /// `UnknownMetric` or `InvalidLabels`.
    pub fn value(&self, metric: &str, labels: &LabelSet) -> Result<Option<f64>> {
        let catalog = self.catalog()?;
        let dispatcher = Dispatcher {
            catalog: &catalog,
            registry: &self.registry,
            store: &self.store,
            policy: self.config.label_policy,
        };
        let key = dispatcher.resolve(metric, labels)?;
        Ok(self.store.get(&key)?.map(|instance| instance.value()))
    }

    /// Sorted names of metrics that have at least one live instance.
    /// Declared metrics that were never updated are not listed.
    pub fn list_metrics(&self) -> Result<Vec<String>> {
        self.store.instantiated_names()
    }

    /// Prometheus text exposition of every live instance.
    pub fn render_text(&self) -> Result<String> {
        encode_text(&self.registry.gather())
    }

    /// Push the current snapshot to a Pushgateway under `job`.
    ///
    /// # Errors
    ///
    /// `Push` on delivery failure. The caller may ignore it and continue.
    pub async fn push(&self, endpoint: &str, job: &str) -> Result<()> {
        let families = self.registry.gather();
        self.push_client.push(endpoint, job, &families).await
    }

    /// Create a zero-valued instance for every registered metric with labels
    /// `<key> = "default_<key>"`, so the series exist before real traffic.
    /// Returns the number of metrics initialized.
    ///
    /// # Errors
    ///
    /// The first dispatch error encountered.
    pub fn initialize_defaults(&self) -> Result<usize> {
        let families = self.registry.families()?;
        for family in &families {
            let spec = family.spec();
            let labels = spec
                .label_keys
                .iter()
                .fold(LabelSet::new(), |acc, key| acc.with(key, format!("default_{key}")));
            let op = match spec.kind {
                MetricKind::Counter => Operation::Add(0.0),
                MetricKind::Gauge => Operation::Set(0.0),
            };
            self.apply(&spec.name, &labels, op)?;
        }
        Ok(families.len())
    }

    /// Initialize defaults, then push.
    ///
    /// # Errors
    ///
    /// Dispatch errors from [`Self::initialize_defaults`] or `Push`.
    pub async fn push_with_defaults(&self, endpoint: &str, job: &str) -> Result<()> {
        self.initialize_defaults()?;
        self.push(endpoint, job).await
    }

    /// Unregister every family and drop every instance. The catalog is kept.
    ///
    /// # Errors
    ///
    /// `Internal` on a poisoned lock.
    pub fn reset(&self) -> Result<()> {
        self.registry.reset(&self.store)?;
        self_metrics::set_instances_active(0);
        warn!(target: "kpi_metrics.context", "Registry reset, all instances cleared");
        Ok(())
    }
}

fn record_failure(operation: &'static str, err: &KpiError) {
    self_metrics::record_error(operation, err.error_type_label());
}

/// Empty, or `[a-zA-Z_:][a-zA-Z0-9_:]*`.
fn validate_namespace(namespace: &str) -> Result<()> {
    let mut chars = namespace.chars();
    let valid = match chars.next() {
        None => true,
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
        }
        Some(_) => false,
    };
    if valid {
        Ok(())
    } else {
        Err(KpiError::InvalidArgument(format!(
            "invalid metric namespace '{namespace}'"
        )))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const SOURCE: &str = r#"[
        {"displayName": "Attach Requests", "prometheus_type": "Counter", "object": ["cell"]},
        {"displayName": "Active Sessions", "prometheus_type": "Gauge", "object": ["cell", "slice"]}
    ]"#;

    fn context() -> MetricsContext {
        let ctx = MetricsContext::new(BackendKind::Prometheus, "testns", Config::default()).unwrap();
        ctx.install_catalog(Catalog::from_json(SOURCE).unwrap())
            .unwrap();
        ctx.register_metrics().unwrap();
        ctx
    }

    #[test]
    fn test_invalid_namespace_rejected() {
        for ns in ["9ns", "name space", "ns-1"] {
            assert!(matches!(
                MetricsContext::new(BackendKind::Prometheus, ns, Config::default()),
                Err(KpiError::InvalidArgument(_))
            ));
        }
        assert!(MetricsContext::new(BackendKind::Prometheus, "", Config::default()).is_ok());
    }

    #[test]
    fn test_list_only_instantiated() {
        let ctx = context();
        assert!(ctx.list_metrics().unwrap().is_empty());
        assert_eq!(
            ctx.registered_metrics().unwrap(),
            vec!["active_sessions", "attach_requests"]
        );

        ctx.increment("attach_requests", &LabelSet::new().with("cell", "c1"))
            .unwrap();
        assert_eq!(ctx.list_metrics().unwrap(), vec!["attach_requests"]);
    }

    #[test]
    fn test_rejected_update_not_listed() {
        let ctx = context();
        let labels = LabelSet::new().with("cell", "c1");
        assert!(ctx.decrement("attach_requests", &labels).is_err());
        assert!(ctx.list_metrics().unwrap().is_empty());
        assert_eq!(ctx.value("attach_requests", &labels).unwrap(), None);
    }

    #[test]
    fn test_value_reads_back() {
        let ctx = context();
        let labels = LabelSet::new().with("slice", "s1").with("cell", "c1");
        ctx.set("active_sessions", 12.25, &labels).unwrap();
        ctx.add("active_sessions", -0.25, &labels).unwrap();
        assert_eq!(ctx.value("active_sessions", &labels).unwrap(), Some(12.0));
    }

    #[test]
    fn test_render_text_contains_namespaced_series() {
        let ctx = context();
        ctx.increment("attach_requests", &LabelSet::new().with("cell", "c1"))
            .unwrap();
        let text = ctx.render_text().unwrap();
        assert!(text.contains("# TYPE testns_attach_requests counter"));
        assert!(text.contains("testns_attach_requests{cell=\"c1\"} 1"));
        assert!(!text.contains("testns_active_sessions{"));
    }

    #[test]
    fn test_initialize_defaults() {
        let ctx = context();
        assert_eq!(ctx.initialize_defaults().unwrap(), 2);
        assert_eq!(
            ctx.list_metrics().unwrap(),
            vec!["active_sessions", "attach_requests"]
        );
        let labels = LabelSet::new()
            .with("cell", "default_cell")
            .with("slice", "default_slice");
        assert_eq!(ctx.value("active_sessions", &labels).unwrap(), Some(0.0));
    }

    #[test]
    fn test_failed_load_keeps_previous_catalog() {
        let ctx = context();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kpi.json");
        std::fs::write(
            &path,
            r#"[{"displayName": "A", "prometheus_type": "Gauge"},
                {"displayName": "a", "prometheus_type": "Gauge"}]"#,
        )
        .unwrap();

        assert!(matches!(
            ctx.load_kpis(&path),
            Err(KpiError::DuplicateName(_))
        ));
        assert_eq!(
            ctx.catalog().unwrap().names(),
            vec!["active_sessions", "attach_requests"]
        );
    }

    #[test]
    fn test_reset_clears_instances_and_registry() {
        let ctx = context();
        ctx.increment("attach_requests", &LabelSet::new().with("cell", "c1"))
            .unwrap();
        ctx.reset().unwrap();
        assert!(ctx.list_metrics().unwrap().is_empty());
        assert!(ctx.registered_metrics().unwrap().is_empty());
        assert!(matches!(
            ctx.increment("attach_requests", &LabelSet::new().with("cell", "c1")),
            Err(KpiError::NotRegistered(_))
        ));
        ctx.register_metrics().unwrap();
    }

    #[test]
    fn test_unregister_metric_drops_instances() {
        let ctx = context();
        let cell = LabelSet::new().with("cell", "c1");
        ctx.increment("attach_requests", &cell).unwrap();
        ctx.set(
            "active_sessions",
            3.0,
            &LabelSet::new().with("cell", "c1").with("slice", "s1"),
        )
        .unwrap();

        ctx.unregister_metric("Attach Requests").unwrap();
        assert_eq!(ctx.registered_metrics().unwrap(), vec!["active_sessions"]);
        assert_eq!(ctx.list_metrics().unwrap(), vec!["active_sessions"]);
        assert!(!ctx.render_text().unwrap().contains("testns_attach_requests"));
        assert!(matches!(
            ctx.increment("attach_requests", &cell),
            Err(KpiError::NotRegistered(_))
        ));
        assert!(matches!(
            ctx.unregister_metric("attach_requests"),
            Err(KpiError::NotRegistered(_))
        ));
    }

    #[test]
    fn test_reload_with_new_kind_needs_reregistration() {
        let ctx = context();
        ctx.install_catalog(
            Catalog::from_json(
                r#"[{"displayName": "Attach Requests", "prometheus_type": "Gauge", "object": ["cell"]}]"#,
            )
            .unwrap(),
        )
        .unwrap();
        let cell = LabelSet::new().with("cell", "c1");

        // Still bound as a counter
        assert!(matches!(
            ctx.set("attach_requests", 5.0, &cell),
            Err(KpiError::IllegalOperation { .. })
        ));
        assert!(ctx.list_metrics().unwrap().is_empty());
        assert_eq!(ctx.value("attach_requests", &cell).unwrap(), None);

        ctx.unregister_metric("attach_requests").unwrap();
        ctx.register_metrics().unwrap();
        ctx.set("attach_requests", 5.0, &cell).unwrap();
        assert_eq!(ctx.value("attach_requests", &cell).unwrap(), Some(5.0));
    }

    #[test]
    fn test_reload_with_new_label_keys_rejects_widened_labels() {
        let ctx = context();
        ctx.install_catalog(
            Catalog::from_json(
                r#"[{"displayName": "Attach Requests", "prometheus_type": "Counter",
                     "object": ["cell", "slice"]}]"#,
            )
            .unwrap(),
        )
        .unwrap();

        let widened = LabelSet::new().with("cell", "c1").with("slice", "s1");
        assert!(matches!(
            ctx.increment("attach_requests", &widened),
            Err(KpiError::InvalidLabels { .. })
        ));
        assert!(ctx.list_metrics().unwrap().is_empty());

        ctx.increment("attach_requests", &LabelSet::new().with("cell", "c1"))
            .unwrap();
        assert_eq!(ctx.list_metrics().unwrap(), vec!["attach_requests"]);
    }

    #[test]
    fn test_reset_racing_updates_leaves_no_orphans() {
        let ctx = std::sync::Arc::new(context());
        let writer = {
            let ctx = std::sync::Arc::clone(&ctx);
            std::thread::spawn(move || {
                let cell = LabelSet::new().with("cell", "c1");
                for i in 0..2_000 {
                    let _ = ctx.increment("attach_requests", &LabelSet::new().with("cell", format!("c{i}")));
                    let _ = ctx.increment("attach_requests", &cell);
                }
            })
        };
        for _ in 0..50 {
            ctx.reset().unwrap();
            ctx.register_metrics().unwrap();
        }
        writer.join().unwrap();
        ctx.reset().unwrap();

        // Every instance belongs to a registered family
        assert!(ctx.list_metrics().unwrap().is_empty());
        assert!(ctx.render_text().unwrap().is_empty());
    }

    #[test]
    fn test_lifecycle_failures_are_counted_by_operation() {
        use metrics_util::debugging::DebuggingRecorder;

        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        let ctx = context();

        metrics::with_local_recorder(&recorder, || {
            assert!(ctx.load_kpis("/nonexistent/kpi.json").is_err());
            assert!(ctx.register_metrics().is_err());
            assert!(ctx.unregister_metric("missing").is_err());
        });

        let operations: Vec<String> = snapshotter
            .snapshot()
            .into_vec()
            .iter()
            .filter(|(key, _, _, _)| key.key().name() == "kpi_metrics_errors_total")
            .filter_map(|(key, _, _, _)| {
                key.key()
                    .labels()
                    .find(|label| label.key() == "operation")
                    .map(|label| label.value().to_string())
            })
            .collect();
        for operation in ["load", "register", "unregister"] {
            assert!(operations.iter().any(|o| o == operation), "{operations:?}");
        }
    }
}
