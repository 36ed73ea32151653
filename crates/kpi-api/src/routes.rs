//! HTTP routes for the KPI API.
//!
//! Defines the Axum router and application state.

use crate::errors::error_body;
use crate::handlers;
use axum::http::StatusCode;
use axum::response::Response;
use axum::{
    routing::{get, post},
    Router,
};
use kpi_metrics::MetricsContext;
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{catch_panic::CatchPanicLayer, timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The metrics context every handler operates on.
    pub ctx: Arc<MetricsContext>,
}

/// Build the application routes.
///
/// - `GET  /v1/health`
/// - `GET  /v1/metrics` (live metric names)
/// - `GET  /v1/metrics/debug`
/// - `POST /v1/metrics/register`
/// - `POST /v1/metrics/{increment,decrement,add,set}`
/// - `POST /v1/metrics/push`
/// - `GET  /metrics` (text exposition)
pub fn build_routes(state: Arc<AppState>) -> Router {
    let routes = Router::new()
        .route("/v1/health", get(handlers::health_check))
        .route("/v1/metrics", get(handlers::list_metrics))
        .route("/v1/metrics/debug", get(handlers::debug_metrics))
        .route("/v1/metrics/register", post(handlers::register_metrics))
        .route("/v1/metrics/increment", post(handlers::increment_metric))
        .route("/v1/metrics/decrement", post(handlers::decrement_metric))
        .route("/v1/metrics/add", post(handlers::add_to_metric))
        .route("/v1/metrics/set", post(handlers::set_metric))
        .route("/v1/metrics/push", post(handlers::push_metrics))
        .route("/metrics", get(handlers::exposition))
        .with_state(state);

    with_middleware(routes)
}

/// Apply the global middleware stack.
///
/// Layer order (bottom-to-top execution):
/// 1. CatchPanicLayer - Turn a handler panic into a 500 (innermost)
/// 2. TraceLayer - Log request details
/// 3. TimeoutLayer - 30 second request timeout
pub fn with_middleware(router: Router) -> Router {
    router
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic payload".to_string()
    };
    tracing::error!(target: "kpi_api.routes", panic = %detail, "Handler panicked");
    error_body(
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "Internal server error".to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }
}
