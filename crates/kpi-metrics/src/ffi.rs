//! C ABI over a single process-wide [`MetricsContext`].
//!
//! Every entry point returns a `c_int` status (`0` on success, otherwise
//! [`KpiError::status_code`]) and catches panics so nothing unwinds into the
//! host. String arguments are NUL-terminated UTF-8. Labels are passed as a
//! flat array of `count` strings alternating key and value.

#![allow(non_snake_case)]

use crate::config::{BackendKind, Config};
use crate::context::MetricsContext;
use crate::errors::{poisoned, KpiError, Result};
use crate::labels::LabelSet;
use common::logging::init_tracing;
use std::ffi::{c_char, c_int, CStr, CString};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, RwLock};
use tracing::{debug, error, info, warn};

const STATUS_OK: c_int = 0;

struct FfiState {
    ctx: Arc<MetricsContext>,
    /// Drives push requests to completion on the calling thread.
    runtime: Arc<tokio::runtime::Runtime>,
}

static STATE: RwLock<Option<FfiState>> = RwLock::new(None);

/// Run one boundary call, logging and collapsing its error into a status.
fn guard<F>(operation: &'static str, f: F) -> c_int
where
    F: FnOnce() -> Result<()>,
{
    let result = catch_unwind(AssertUnwindSafe(f))
        .unwrap_or_else(|_| Err(KpiError::Internal(format!("panic in {operation}"))));
    match result {
        Ok(()) => STATUS_OK,
        Err(err) => {
            if err.is_recoverable() {
                warn!(target: "kpi_metrics.ffi", operation, error = %err, "Call failed");
            } else {
                error!(target: "kpi_metrics.ffi", operation, error = %err, "Call failed");
            }
            err.status_code()
        }
    }
}

fn context() -> Result<Arc<MetricsContext>> {
    STATE
        .read()
        .map_err(poisoned)?
        .as_ref()
        .map(|state| Arc::clone(&state.ctx))
        .ok_or(KpiError::NotInitialized)
}

/// Run a push future on the façade runtime. The state lock is released
/// before the request starts, so `Shutdown` and updates never wait on the
/// network.
fn block_on_push<F, Fut>(f: F) -> Result<()>
where
    F: FnOnce(Arc<MetricsContext>) -> Fut,
    Fut: std::future::Future<Output = Result<()>>,
{
    let (ctx, runtime) = {
        let state = STATE.read().map_err(poisoned)?;
        let state = state.as_ref().ok_or(KpiError::NotInitialized)?;
        (Arc::clone(&state.ctx), Arc::clone(&state.runtime))
    };
    runtime.block_on(f(ctx))
}

/// # Safety
///
/// `ptr` must be null or point to a NUL-terminated string valid for the call.
unsafe fn str_arg(ptr: *const c_char, what: &str) -> Result<String> {
    if ptr.is_null() {
        return Err(KpiError::InvalidArgument(format!("{what} must not be null")));
    }
    // SAFETY: non-null and NUL-terminated per the caller contract.
    let raw = unsafe { CStr::from_ptr(ptr) };
    raw.to_str()
        .map(str::to_owned)
        .map_err(|_| KpiError::InvalidArgument(format!("{what} is not valid UTF-8")))
}

/// # Safety
///
/// `labels` must be null or point to `count` readable string pointers.
unsafe fn labels_arg(metric: &str, labels: *const *const c_char, count: c_int) -> Result<LabelSet> {
    let count = usize::try_from(count)
        .map_err(|_| KpiError::InvalidArgument(format!("negative label count {count}")))?;
    if count == 0 {
        return Ok(LabelSet::new());
    }
    if labels.is_null() {
        return Err(KpiError::InvalidArgument(
            "labels must not be null when count is positive".to_string(),
        ));
    }

    // SAFETY: `labels` points to `count` pointers per the caller contract.
    let raw = unsafe { std::slice::from_raw_parts(labels, count) };
    let mut flat = Vec::with_capacity(count);
    for (position, ptr) in raw.iter().enumerate() {
        if ptr.is_null() {
            // A null sentinel ends the array early
            if position + 1 == count {
                break;
            }
            return Err(KpiError::InvalidLabels {
                metric: metric.to_string(),
                reason: format!("null label string at position {position}"),
            });
        }
        // SAFETY: non-null entries are NUL-terminated strings.
        flat.push(unsafe { str_arg(*ptr, "label") }?);
    }
    LabelSet::from_flat(metric, &flat)
}

/// Create the process-wide context.
///
/// # Safety
///
/// `backend` and `namespace` must be NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn Initialize(backend: *const c_char, namespace: *const c_char) -> c_int {
    guard("initialize", || {
        // SAFETY: forwarded caller contract.
        let backend: BackendKind = unsafe { str_arg(backend, "backend") }?.parse()?;
        // SAFETY: forwarded caller contract.
        let namespace = unsafe { str_arg(namespace, "namespace") }?;

        let mut state = STATE.write().map_err(poisoned)?;
        if state.is_some() {
            return Err(KpiError::AlreadyInitialized);
        }

        let config = Config::from_env()?;
        let installed = init_tracing(&config.observability, &["kpi_metrics"]);
        debug!(target: "kpi_metrics.ffi", installed, "Tracing subscriber setup");

        let ctx = MetricsContext::new(backend, &namespace, config)?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| KpiError::Internal(format!("Failed to build runtime: {e}")))?;

        *state = Some(FfiState {
            ctx: Arc::new(ctx),
            runtime: Arc::new(runtime),
        });
        info!(target: "kpi_metrics.ffi", namespace = %namespace, "Initialized");
        Ok(())
    })
}

/// Load a KPI catalog file.
///
/// # Safety
///
/// `path` must be a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn LoadKPIs(path: *const c_char) -> c_int {
    guard("load", || {
        // SAFETY: forwarded caller contract.
        let path = unsafe { str_arg(path, "path") }?;
        context()?.load_kpis(path).map(|_| ())
    })
}

/// Register every metric in the loaded catalog.
#[no_mangle]
pub extern "C" fn RegisterMetrics() -> c_int {
    guard("register", || context()?.register_metrics().map(|_| ()))
}

/// Unregister one metric and drop its instances.
///
/// # Safety
///
/// `name` must be a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn UnregisterMetric(name: *const c_char) -> c_int {
    guard("unregister", || {
        // SAFETY: forwarded caller contract.
        let name = unsafe { str_arg(name, "metric name") }?;
        context()?.unregister_metric(&name)
    })
}

/// # Safety
///
/// `name` must be a NUL-terminated string; `labels` must point to `count`
/// string pointers.
#[no_mangle]
pub unsafe extern "C" fn IncrementMetric(
    name: *const c_char,
    labels: *const *const c_char,
    count: c_int,
) -> c_int {
    guard("increment", || {
        // SAFETY: forwarded caller contract.
        let (name, labels) = unsafe { update_args(name, labels, count) }?;
        context()?.increment(&name, &labels)
    })
}

/// # Safety
///
/// Same contract as [`IncrementMetric`].
#[no_mangle]
pub unsafe extern "C" fn DecrementMetric(
    name: *const c_char,
    labels: *const *const c_char,
    count: c_int,
) -> c_int {
    guard("decrement", || {
        // SAFETY: forwarded caller contract.
        let (name, labels) = unsafe { update_args(name, labels, count) }?;
        context()?.decrement(&name, &labels)
    })
}

/// # Safety
///
/// Same contract as [`IncrementMetric`].
#[no_mangle]
pub unsafe extern "C" fn AddToMetric(
    name: *const c_char,
    value: f64,
    labels: *const *const c_char,
    count: c_int,
) -> c_int {
    guard("add", || {
        // SAFETY: forwarded caller contract.
        let (name, labels) = unsafe { update_args(name, labels, count) }?;
        context()?.add(&name, value, &labels)
    })
}

/// # Safety
///
/// Same contract as [`IncrementMetric`].
#[no_mangle]
pub unsafe extern "C" fn SetMetric(
    name: *const c_char,
    value: f64,
    labels: *const *const c_char,
    count: c_int,
) -> c_int {
    guard("set", || {
        // SAFETY: forwarded caller contract.
        let (name, labels) = unsafe { update_args(name, labels, count) }?;
        context()?.set(&name, value, &labels)
    })
}

/// Read one instance value into `out`.
///
/// # Safety
///
/// Same contract as [`IncrementMetric`]; `out` must be a writable `double`.
#[no_mangle]
pub unsafe extern "C" fn GetMetricValue(
    name: *const c_char,
    labels: *const *const c_char,
    count: c_int,
    out: *mut f64,
) -> c_int {
    guard("get", || {
        if out.is_null() {
            return Err(KpiError::InvalidArgument("out must not be null".to_string()));
        }
        // SAFETY: forwarded caller contract.
        let (name, labels) = unsafe { update_args(name, labels, count) }?;
        let value = context()?
            .value(&name, &labels)?
            .ok_or_else(|| KpiError::UnknownMetric(format!("{name}{labels}")))?;
        // SAFETY: `out` is non-null and writable per the caller contract.
        unsafe { out.write(value) };
        Ok(())
    })
}

unsafe fn update_args(
    name: *const c_char,
    labels: *const *const c_char,
    count: c_int,
) -> Result<(String, LabelSet)> {
    // SAFETY: forwarded caller contract.
    let name = unsafe { str_arg(name, "metric name") }?;
    // SAFETY: forwarded caller contract.
    let labels = unsafe { labels_arg(&name, labels, count) }?;
    Ok((name, labels))
}

/// Names of metrics with at least one live instance, as a null-terminated
/// array. Never returns null. Release with [`FreeStringArray`].
#[no_mangle]
pub extern "C" fn ListMetrics() -> *mut *mut c_char {
    let names = catch_unwind(|| context().and_then(|ctx| ctx.list_metrics()))
        .unwrap_or_else(|_| Err(KpiError::Internal("panic in list".to_string())))
        .unwrap_or_else(|err| {
            warn!(target: "kpi_metrics.ffi", error = %err, "ListMetrics failed, returning empty list");
            Vec::new()
        });

    let mut array: Vec<*mut c_char> = names
        .into_iter()
        .filter_map(|name| CString::new(name).ok())
        .map(CString::into_raw)
        .collect();
    array.push(std::ptr::null_mut());
    Box::into_raw(array.into_boxed_slice()).cast::<*mut c_char>()
}

/// Release an array returned by [`ListMetrics`]. `count` is the number of
/// strings, not counting the null sentinel. Null is a no-op.
///
/// # Safety
///
/// `array` must come from [`ListMetrics`] and not have been freed before.
#[no_mangle]
pub unsafe extern "C" fn FreeStringArray(array: *mut *mut c_char, count: c_int) -> c_int {
    if array.is_null() {
        return STATUS_OK;
    }
    guard("free", || {
        let mut len = 0usize;
        // SAFETY: the array is null-terminated, so the walk stops in bounds.
        unsafe {
            while !(*array.add(len)).is_null() {
                drop(CString::from_raw(*array.add(len)));
                len += 1;
            }
        }
        if usize::try_from(count).ok() != Some(len) {
            warn!(target: "kpi_metrics.ffi", count, actual = len, "FreeStringArray count mismatch");
        }
        // SAFETY: reconstructs the boxed slice of `len + 1` allocated by ListMetrics.
        unsafe {
            drop(Box::from_raw(std::ptr::slice_from_raw_parts_mut(array, len + 1)));
        }
        Ok(())
    })
}

/// Push the current snapshot to a Pushgateway.
///
/// # Safety
///
/// `endpoint` and `job` must be NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn PushMetrics(endpoint: *const c_char, job: *const c_char) -> c_int {
    guard("push", || {
        // SAFETY: forwarded caller contract.
        let endpoint = unsafe { str_arg(endpoint, "endpoint") }?;
        // SAFETY: forwarded caller contract.
        let job = unsafe { str_arg(job, "job") }?;
        block_on_push(|ctx| async move { ctx.push(&endpoint, &job).await })
    })
}

/// Initialize default series, then push.
///
/// # Safety
///
/// Same contract as [`PushMetrics`].
#[no_mangle]
pub unsafe extern "C" fn PushMetricsWithDefaults(
    endpoint: *const c_char,
    job: *const c_char,
) -> c_int {
    guard("push", || {
        // SAFETY: forwarded caller contract.
        let endpoint = unsafe { str_arg(endpoint, "endpoint") }?;
        // SAFETY: forwarded caller contract.
        let job = unsafe { str_arg(job, "job") }?;
        block_on_push(|ctx| async move { ctx.push_with_defaults(&endpoint, &job).await })
    })
}

/// Create zero-valued default series for every registered metric.
#[no_mangle]
pub extern "C" fn InitializeDefaults() -> c_int {
    guard("initialize_defaults", || {
        context()?.initialize_defaults().map(|_| ())
    })
}

/// Tear down the process-wide context. `Initialize` may be called again.
#[no_mangle]
pub extern "C" fn Shutdown() -> c_int {
    guard("shutdown", || {
        let state = STATE
            .write()
            .map_err(poisoned)?
            .take()
            .ok_or(KpiError::NotInitialized)?;
        state.ctx.reset()?;
        info!(target: "kpi_metrics.ffi", "Shut down");
        Ok(())
    })
}
