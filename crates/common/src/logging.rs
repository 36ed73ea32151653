//! Tracing subscriber installation.
//!
//! The KPI library is embedded in foreign host processes, so installing a
//! subscriber must never fail hard: if the host already installed one, ours
//! is skipped and the host's subscriber keeps receiving events.

use crate::config::ObservabilityConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence; otherwise `default_directive` is used with the
/// configured level applied to every target, e.g. `kpi_metrics=info`.
///
/// Returns `true` if this call installed the subscriber, `false` if one was
/// already present.
pub fn init_tracing(config: &ObservabilityConfig, crate_targets: &[&str]) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(config, crate_targets)));

    let registry = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .is_ok()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .is_ok()
    }
}

/// Build the fallback filter directive for a set of crate targets.
#[must_use]
pub fn default_directive(config: &ObservabilityConfig, crate_targets: &[&str]) -> String {
    crate_targets
        .iter()
        .map(|target| format!("{target}={}", config.log_level))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        let config = ObservabilityConfig {
            log_level: "warn".to_string(),
            json_logs: false,
        };
        assert_eq!(default_directive(&config, &["kpi_metrics"]), "kpi_metrics=warn");
        assert_eq!(
            default_directive(&config, &["kpi_api", "kpi_metrics", "tower_http"]),
            "kpi_api=warn,kpi_metrics=warn,tower_http=warn"
        );
    }

    #[test]
    fn test_second_init_is_tolerated() {
        let config = ObservabilityConfig::default();
        let _ = init_tracing(&config, &["kpi_metrics"]);
        // A subscriber is now installed either by us or by another test
        assert!(!init_tracing(&config, &["kpi_metrics"]));
    }
}
