//! KPI API error types.
//!
//! All errors map to HTTP status codes via the `IntoResponse` impl. Library
//! failures that are not the caller's fault are logged server-side and
//! returned with a generic message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use kpi_metrics::KpiError;
use serde::Serialize;
use thiserror::Error;

/// KPI API error type.
///
/// Maps to HTTP status codes:
/// - BadRequest: 400 Bad Request
/// - Metrics: by library error, see [`ApiError::status_code`]
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Metrics(#[from] KpiError),
}

impl ApiError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Metrics(err) => match err {
                KpiError::UnknownMetric(_) | KpiError::NotRegistered(_) => StatusCode::NOT_FOUND,
                KpiError::InvalidLabels { .. }
                | KpiError::IllegalOperation { .. }
                | KpiError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
                KpiError::AlreadyRegistered(_) => StatusCode::CONFLICT,
                KpiError::Push(_) => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

pub(crate) fn error_body(status: StatusCode, code: &str, message: String) -> Response {
    let error_response = ErrorResponse {
        error: ErrorDetail {
            code: code.to_string(),
            message,
        },
    };
    (status, Json(error_response)).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let (code, message) = match &self {
            ApiError::BadRequest(reason) => ("BAD_REQUEST", reason.clone()),
            ApiError::Metrics(err) if status.is_server_error() => {
                // Log actual error server-side, return generic message to client
                tracing::error!(target: "kpi_api.errors", error = %err, "Metrics operation failed");
                ("INTERNAL_ERROR", "An internal error occurred".to_string())
            }
            ApiError::Metrics(err) => (metrics_error_code(err), err.to_string()),
        };
        error_body(status, code, message)
    }
}

fn metrics_error_code(err: &KpiError) -> &'static str {
    match err {
        KpiError::UnknownMetric(_) | KpiError::NotRegistered(_) => "METRIC_NOT_FOUND",
        KpiError::InvalidLabels { .. } => "INVALID_LABELS",
        KpiError::IllegalOperation { .. } => "ILLEGAL_OPERATION",
        KpiError::AlreadyRegistered(_) => "CONFLICT",
        KpiError::Push(_) => "PUSH_FAILED",
        _ => "BAD_REQUEST",
    }
}
