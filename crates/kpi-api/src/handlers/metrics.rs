//! Metric handlers: registration, updates, listing and export.
//!
//! Update endpoints accept a [`MetricRequest`] body. The metric name may be
//! given as a display name; it is normalized before lookup.

use crate::errors::ApiError;
use crate::models::{
    ListResponse, MetricDetail, MetricRequest, PushRequest, StatusResponse,
};
use crate::routes::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use kpi_metrics::{KpiError, LabelSet, Operation};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Prometheus text exposition content type.
const TEXT_FORMAT: &str = "text/plain; version=0.0.4; charset=utf-8";

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

fn apply_update<F>(
    state: &AppState,
    payload: Result<Json<MetricRequest>, JsonRejection>,
    operation: F,
) -> Result<Json<StatusResponse>, ApiError>
where
    F: FnOnce(f64) -> Operation,
{
    let request = body(payload)?;
    let op = operation(request.value);
    let labels = LabelSet::from_pairs(&request.name, request.labels)?;
    state.ctx.apply(&request.name, &labels, op)?;
    debug!(
        target: "kpi_api.handlers",
        metric = %request.name,
        operation = op.name(),
        "Metric updated"
    );
    Ok(Json(StatusResponse::success()))
}

/// Unregister every bound metric, then register the current catalog again.
/// All live instances are dropped.
#[instrument(skip_all, name = "kpi_api.metrics.register")]
pub async fn register_metrics(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatusResponse>, ApiError> {
    for name in state.ctx.registered_metrics()? {
        if let Err(e) = state.ctx.unregister_metric(&name) {
            warn!(target: "kpi_api.handlers", metric = %name, error = %e, "Failed to unregister metric");
        }
    }
    let registered = state.ctx.register_metrics()?;
    info!(target: "kpi_api.handlers", count = registered.len(), "Metrics registered");
    Ok(Json(StatusResponse::success()))
}

#[instrument(skip_all, name = "kpi_api.metrics.increment")]
pub async fn increment_metric(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<MetricRequest>, JsonRejection>,
) -> Result<Json<StatusResponse>, ApiError> {
    apply_update(&state, payload, |_| Operation::Increment)
}

#[instrument(skip_all, name = "kpi_api.metrics.decrement")]
pub async fn decrement_metric(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<MetricRequest>, JsonRejection>,
) -> Result<Json<StatusResponse>, ApiError> {
    apply_update(&state, payload, |_| Operation::Decrement)
}

#[instrument(skip_all, name = "kpi_api.metrics.add")]
pub async fn add_to_metric(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<MetricRequest>, JsonRejection>,
) -> Result<Json<StatusResponse>, ApiError> {
    apply_update(&state, payload, Operation::Add)
}

#[instrument(skip_all, name = "kpi_api.metrics.set")]
pub async fn set_metric(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<MetricRequest>, JsonRejection>,
) -> Result<Json<StatusResponse>, ApiError> {
    apply_update(&state, payload, Operation::Set)
}

/// Push the current snapshot to a Pushgateway.
///
/// A delivery failure is not an error for the caller: the values stay
/// collected and the response is `202 Accepted`.
#[instrument(skip_all, name = "kpi_api.metrics.push")]
pub async fn push_metrics(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PushRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<StatusResponse>), ApiError> {
    let request = body(payload)?;
    match state.ctx.push(&request.gateway_url, &request.job_name).await {
        Ok(()) => Ok((StatusCode::OK, Json(StatusResponse::success()))),
        Err(KpiError::Push(reason)) => {
            warn!(target: "kpi_api.handlers", job = %request.job_name, reason = %reason, "Push to gateway failed");
            Ok((
                StatusCode::ACCEPTED,
                Json(StatusResponse {
                    status: "accepted".to_string(),
                    message: Some("Metrics collected but push failed".to_string()),
                }),
            ))
        }
        Err(e) => Err(e.into()),
    }
}

/// Names of metrics with at least one live instance.
#[instrument(skip_all, name = "kpi_api.metrics.list")]
pub async fn list_metrics(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ListResponse>, ApiError> {
    let metrics = state.ctx.list_metrics()?;
    Ok(Json(ListResponse {
        count: metrics.len(),
        metrics,
    }))
}

/// Kind and label schema of every registered metric, keyed by name.
#[instrument(skip_all, name = "kpi_api.metrics.debug")]
pub async fn debug_metrics(
    State(state): State<Arc<AppState>>,
) -> Result<Json<BTreeMap<String, MetricDetail>>, ApiError> {
    let details = state
        .ctx
        .registered_specs()?
        .iter()
        .map(|spec| {
            (
                spec.name.clone(),
                MetricDetail {
                    kind: spec.kind.to_string(),
                    status: "ok".to_string(),
                    labels: spec.label_keys.iter().cloned().collect(),
                },
            )
        })
        .collect();
    Ok(Json(details))
}

/// Handler for GET /metrics: text exposition of every live instance.
#[instrument(skip_all, name = "kpi_api.metrics.scrape")]
pub async fn exposition(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let text = state.ctx.render_text()?;
    Ok(([(header::CONTENT_TYPE, TEXT_FORMAT)], text))
}
