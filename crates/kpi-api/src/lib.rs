//! KPI API service library.
//!
//! HTTP front end over a [`kpi_metrics::MetricsContext`], for callers that
//! cannot load the C library. Handlers are thin: they decode the request,
//! call the context and map [`kpi_metrics::KpiError`] to a status code.
//!
//! ```text
//! routes.rs -> handlers/*.rs -> kpi_metrics::MetricsContext
//! ```

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
