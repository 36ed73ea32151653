//! KPI metrics error types.
//!
//! Every error maps to a nonzero status code for the C boundary. The
//! boundary only sees the code; the message is logged inside the library.

use thiserror::Error;

/// KPI metrics error type.
///
/// Maps to boundary status codes:
/// - Catalog loading: `Parse` (1), `DuplicateName` (2), `UnknownKind` (3)
/// - Registration: `AlreadyRegistered` (4)
/// - Update dispatch: `UnknownMetric` (5), `NotRegistered` (6),
///   `InvalidLabels` (7), `IllegalOperation` (8)
/// - Export: `Push` (9)
/// - Lifecycle and boundary: `UnsupportedBackend` (10),
///   `NotInitialized` / `AlreadyInitialized` (11), `InvalidArgument` (12),
///   `Io` (13), `Internal` (14)
#[derive(Debug, Error, Clone, PartialEq)]
pub enum KpiError {
    /// KPI source is not valid JSON or an entry is malformed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Two KPI entries normalize to the same metric name.
    #[error("Duplicate metric name: {0}")]
    DuplicateName(String),

    /// KPI entry declares a kind other than Counter or Gauge.
    #[error("Unknown metric kind '{kind}' for {metric}")]
    UnknownKind { metric: String, kind: String },

    /// Metric family is already bound in the registry.
    #[error("Metric already registered: {0}")]
    AlreadyRegistered(String),

    /// Metric name is not in the catalog.
    #[error("Unknown metric: {0}")]
    UnknownMetric(String),

    /// Metric is in the catalog but `register` has not bound it yet.
    #[error("Metric not registered: {0}")]
    NotRegistered(String),

    /// Label set does not match the metric's label schema.
    #[error("Invalid labels for {metric}: {reason}")]
    InvalidLabels { metric: String, reason: String },

    /// Operation is not permitted for the metric's kind.
    #[error("Illegal operation {operation} on {kind} metric {metric}")]
    IllegalOperation {
        metric: String,
        kind: &'static str,
        operation: &'static str,
    },

    /// Delivery to the push gateway failed.
    #[error("Push failed: {0}")]
    Push(String),

    /// Requested export backend is not available.
    #[error("Unsupported backend: {0}")]
    UnsupportedBackend(String),

    /// Boundary call made before `Initialize`.
    #[error("Metrics framework not initialized")]
    NotInitialized,

    /// `Initialize` called twice without `Shutdown`.
    #[error("Metrics framework already initialized")]
    AlreadyInitialized,

    /// Null pointer, invalid UTF-8 or similar boundary argument problem.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Reading the KPI source failed.
    #[error("I/O error: {0}")]
    Io(String),

    /// Internal error with context.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl KpiError {
    /// Returns the nonzero boundary status code for this error.
    pub fn status_code(&self) -> i32 {
        match self {
            KpiError::Parse(_) => 1,
            KpiError::DuplicateName(_) => 2,
            KpiError::UnknownKind { .. } => 3,
            KpiError::AlreadyRegistered(_) => 4,
            KpiError::UnknownMetric(_) => 5,
            KpiError::NotRegistered(_) => 6,
            KpiError::InvalidLabels { .. } => 7,
            KpiError::IllegalOperation { .. } => 8,
            KpiError::Push(_) => 9,
            KpiError::UnsupportedBackend(_) => 10,
            KpiError::NotInitialized | KpiError::AlreadyInitialized => 11,
            KpiError::InvalidArgument(_) => 12,
            KpiError::Io(_) => 13,
            KpiError::Internal(_) => 14,
        }
    }

    /// Returns a bounded label string for the error variant (for metrics).
    ///
    /// Uses enum variant names, not error message content.
    pub fn error_type_label(&self) -> &'static str {
        match self {
            KpiError::Parse(_) => "parse",
            KpiError::DuplicateName(_) => "duplicate_name",
            KpiError::UnknownKind { .. } => "unknown_kind",
            KpiError::AlreadyRegistered(_) => "already_registered",
            KpiError::UnknownMetric(_) => "unknown_metric",
            KpiError::NotRegistered(_) => "not_registered",
            KpiError::InvalidLabels { .. } => "invalid_labels",
            KpiError::IllegalOperation { .. } => "illegal_operation",
            KpiError::Push(_) => "push",
            KpiError::UnsupportedBackend(_) => "unsupported_backend",
            KpiError::NotInitialized => "not_initialized",
            KpiError::AlreadyInitialized => "already_initialized",
            KpiError::InvalidArgument(_) => "invalid_argument",
            KpiError::Io(_) => "io",
            KpiError::Internal(_) => "internal",
        }
    }

    /// True for failures the caller may ignore and continue (push delivery).
    pub fn is_recoverable(&self) -> bool {
        matches!(self, KpiError::Push(_))
    }
}

impl From<std::io::Error> for KpiError {
    fn from(err: std::io::Error) -> Self {
        KpiError::Io(err.to_string())
    }
}

impl From<prometheus::Error> for KpiError {
    fn from(err: prometheus::Error) -> Self {
        match err {
            prometheus::Error::AlreadyReg => {
                KpiError::AlreadyRegistered("backend collector".to_string())
            }
            other => KpiError::Internal(format!("Backend error: {other}")),
        }
    }
}

/// Map a poisoned lock into an internal error instead of propagating the panic.
pub(crate) fn poisoned<T>(_: std::sync::PoisonError<T>) -> KpiError {
    KpiError::Internal("lock poisoned".to_string())
}

/// Result type alias using `KpiError`
pub type Result<T> = std::result::Result<T, KpiError>;
