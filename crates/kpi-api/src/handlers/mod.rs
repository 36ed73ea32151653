//! HTTP request handlers for the KPI API.

pub mod health;
pub mod metrics;

pub use health::health_check;
pub use metrics::{
    add_to_metric, debug_metrics, decrement_metric, exposition, increment_metric, list_metrics,
    push_metrics, register_metrics, set_metric,
};
