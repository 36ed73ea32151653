//! KPI metrics library.
//!
//! Turns a declarative KPI catalog into named, typed, labeled metrics, enforces
//! per-kind update rules, and exports values in the Prometheus exposition
//! format either as text or by pushing to a Pushgateway.
//!
//! # Architecture
//!
//! - [`catalog`]: KPI source parsing and name normalization
//! - [`registry`]: binds catalog entries into the export backend
//! - [`dispatcher`]: validates updates and applies them to the
//!   [`store`] of live instances
//! - [`exporter`]: text exposition and Pushgateway delivery
//! - [`context`]: [`MetricsContext`], the owner of all of the above
//! - [`ffi`]: C ABI over one process-wide context
//!
//! # Example
//!
//! ```no_run
//! use kpi_metrics::{BackendKind, Config, LabelSet, MetricsContext};
//!
//! # fn main() -> kpi_metrics::Result<()> {
//! let ctx = MetricsContext::new(BackendKind::Prometheus, "amf", Config::from_env()?)?;
//! ctx.load_kpis("kpis.json")?;
//! ctx.register_metrics()?;
//! ctx.increment(
//!     "Mean Registered Subscribers AMF",
//!     &LabelSet::new().with("Network", "net1").with("NetworkSlice", "s1"),
//! )?;
//! println!("{}", ctx.render_text()?);
//! # Ok(())
//! # }
//! ```

#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod catalog;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod errors;
pub mod exporter;
pub mod ffi;
pub mod labels;
pub mod models;
pub mod observability;
pub mod registry;
pub mod store;

pub use catalog::{normalize_metric_name, Catalog};
pub use config::{BackendKind, Config, ConfigError};
pub use context::MetricsContext;
pub use errors::{KpiError, Result};
pub use labels::{LabelPolicy, LabelSet};
pub use models::{KpiSpec, MetricKind, Operation};
