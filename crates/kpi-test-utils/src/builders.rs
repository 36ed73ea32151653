//! Test context builder.

use crate::fixtures::SCENARIO_KPIS;
use kpi_metrics::{BackendKind, Catalog, Config, LabelPolicy, MetricsContext};
use std::time::Duration;

/// Builds a [`MetricsContext`] with a catalog installed and registered.
///
/// # Example
/// ```rust,ignore
/// let ctx = TestContextBuilder::new()
///     .namespace("testns")
///     .label_policy(LabelPolicy::Subset)
///     .build();
/// ```
pub struct TestContextBuilder {
    namespace: String,
    catalog: String,
    config: Config,
    register: bool,
}

impl TestContextBuilder {
    pub fn new() -> Self {
        Self {
            namespace: "testns".to_string(),
            catalog: SCENARIO_KPIS.to_string(),
            config: Config::default(),
            register: true,
        }
    }

    pub fn namespace(mut self, namespace: &str) -> Self {
        self.namespace = namespace.to_string();
        self
    }

    /// Use a different JSON catalog source.
    pub fn catalog(mut self, source: &str) -> Self {
        self.catalog = source.to_string();
        self
    }

    pub fn label_policy(mut self, policy: LabelPolicy) -> Self {
        self.config = self.config.with_label_policy(policy);
        self
    }

    pub fn push_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.with_push_timeout(timeout);
        self
    }

    /// Install the catalog but leave it unregistered.
    pub fn unregistered(mut self) -> Self {
        self.register = false;
        self
    }

    pub fn build(self) -> MetricsContext {
        let ctx = MetricsContext::new(BackendKind::Prometheus, &self.namespace, self.config)
            .expect("Failed to create test context");
        let catalog = Catalog::from_json(&self.catalog).expect("Test catalog should parse");
        ctx.install_catalog(catalog)
            .expect("Failed to install test catalog");
        if self.register {
            ctx.register_metrics()
                .expect("Failed to register test catalog");
        }
        ctx
    }
}

impl Default for TestContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}
