//! Health check handler.

use crate::errors::ApiError;
use crate::models::HealthResponse;
use crate::routes::AppState;
use axum::extract::State;
use axum::Json;
use std::sync::Arc;
use tracing::instrument;

/// Reports the service as healthy along with the number of registered
/// metrics. A service with nothing registered is still healthy.
#[instrument(skip_all, name = "kpi_api.health.check")]
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> Result<Json<HealthResponse>, ApiError> {
    let registered = state.ctx.registered_metrics()?.len();
    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        registered,
    }))
}
