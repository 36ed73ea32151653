//! KPI API service configuration.
//!
//! Configuration is loaded from environment variables. The metrics library
//! settings (`KPI_METRICS_*`) are read alongside the service settings.

use kpi_metrics::{Config as MetricsConfig, ConfigError as MetricsConfigError};
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use thiserror::Error;

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default drain period after a shutdown signal.
pub const DEFAULT_DRAIN_SECONDS: u64 = 5;

/// KPI API service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Metric namespace prefix (default: empty).
    pub namespace: String,

    /// KPI catalog loaded and registered at startup, if set.
    pub kpi_file: Option<PathBuf>,

    /// Seconds to keep serving in-flight requests after a shutdown signal.
    pub drain_seconds: u64,

    /// Metrics library settings.
    pub metrics: MetricsConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid drain period: {0}")]
    InvalidDrainSeconds(String),

    #[error(transparent)]
    Metrics(#[from] MetricsConfigError),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = vars
            .get("KPI_API_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let namespace = vars.get("KPI_API_NAMESPACE").cloned().unwrap_or_default();

        let kpi_file = vars
            .get("KPI_API_KPI_FILE")
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);

        let drain_seconds = match vars.get("KPI_API_DRAIN_SECONDS") {
            Some(value) => value.parse().map_err(|e| {
                ConfigError::InvalidDrainSeconds(format!(
                    "KPI_API_DRAIN_SECONDS must be a non-negative integer, got '{value}': {e}"
                ))
            })?,
            None => DEFAULT_DRAIN_SECONDS,
        };

        Ok(Config {
            bind_address,
            namespace,
            kpi_file,
            drain_seconds,
            metrics: MetricsConfig::from_vars(vars)?,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use kpi_metrics::LabelPolicy;

    #[test]
    fn test_from_vars_defaults() {
        let config = Config::from_vars(&HashMap::new()).expect("Config should load successfully");
        assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
        assert_eq!(config.namespace, "");
        assert_eq!(config.kpi_file, None);
        assert_eq!(config.drain_seconds, DEFAULT_DRAIN_SECONDS);
        assert_eq!(config.metrics, MetricsConfig::default());
    }

    #[test]
    fn test_from_vars_custom_values() {
        let vars = HashMap::from([
            ("KPI_API_BIND_ADDRESS".to_string(), "127.0.0.1:9000".to_string()),
            ("KPI_API_NAMESPACE".to_string(), "amf".to_string()),
            ("KPI_API_KPI_FILE".to_string(), "/etc/kpi/kpis.json".to_string()),
            ("KPI_API_DRAIN_SECONDS".to_string(), "0".to_string()),
            ("KPI_METRICS_LABEL_POLICY".to_string(), "subset".to_string()),
        ]);
        let config = Config::from_vars(&vars).unwrap();
        assert_eq!(config.bind_address, "127.0.0.1:9000");
        assert_eq!(config.namespace, "amf");
        assert_eq!(config.kpi_file, Some(PathBuf::from("/etc/kpi/kpis.json")));
        assert_eq!(config.drain_seconds, 0);
        assert_eq!(config.metrics.label_policy, LabelPolicy::Subset);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let vars = HashMap::from([("KPI_API_DRAIN_SECONDS".to_string(), "-3".to_string())]);
        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidDrainSeconds(_))
        ));

        let vars = HashMap::from([("KPI_METRICS_LABEL_POLICY".to_string(), "any".to_string())]);
        assert!(matches!(Config::from_vars(&vars), Err(ConfigError::Metrics(_))));
    }
}
