//! KPI metrics configuration.
//!
//! Configuration is loaded from environment variables. Everything has a
//! default, so an empty environment yields a usable configuration.

use crate::errors::KpiError;
use crate::labels::LabelPolicy;
use common::config::{ObservabilityConfig, ObservabilityConfigError};
use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default HTTP timeout for Pushgateway delivery.
pub const DEFAULT_PUSH_TIMEOUT_SECONDS: u64 = 5;

/// Upper bound for `KPI_METRICS_PUSH_TIMEOUT_SECONDS`.
pub const MAX_PUSH_TIMEOUT_SECONDS: u64 = 300;

/// Export backend selected at initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Pull-registry style backend with Pushgateway delivery.
    Prometheus,
}

impl FromStr for BackendKind {
    type Err = KpiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prometheus" => Ok(BackendKind::Prometheus),
            other => Err(KpiError::UnsupportedBackend(other.to_string())),
        }
    }
}

/// KPI metrics configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Label validation policy for updates (default: exact).
    pub label_policy: LabelPolicy,

    /// HTTP timeout for push requests (default: 5s).
    pub push_timeout: Duration,

    /// Logging settings.
    pub observability: ObservabilityConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            label_policy: LabelPolicy::default(),
            push_timeout: Duration::from_secs(DEFAULT_PUSH_TIMEOUT_SECONDS),
            observability: ObservabilityConfig::default(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid label policy configuration: {0}")]
    InvalidLabelPolicy(String),

    #[error("Invalid push timeout configuration: {0}")]
    InvalidPushTimeout(String),

    #[error("Invalid observability configuration: {0}")]
    Observability(#[from] ObservabilityConfigError),
}

impl From<ConfigError> for KpiError {
    fn from(err: ConfigError) -> Self {
        KpiError::InvalidArgument(err.to_string())
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let label_policy = match vars.get("KPI_METRICS_LABEL_POLICY") {
            Some(value) => value.parse().map_err(|e| {
                ConfigError::InvalidLabelPolicy(format!("KPI_METRICS_LABEL_POLICY: {e}"))
            })?,
            None => LabelPolicy::default(),
        };

        // Parse push timeout with validation
        let push_timeout_seconds = if let Some(value_str) =
            vars.get("KPI_METRICS_PUSH_TIMEOUT_SECONDS")
        {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidPushTimeout(format!(
                    "KPI_METRICS_PUSH_TIMEOUT_SECONDS must be a valid positive integer, got '{value_str}': {e}"
                ))
            })?;

            if value == 0 {
                return Err(ConfigError::InvalidPushTimeout(
                    "KPI_METRICS_PUSH_TIMEOUT_SECONDS must be greater than 0".to_string(),
                ));
            }

            if value > MAX_PUSH_TIMEOUT_SECONDS {
                return Err(ConfigError::InvalidPushTimeout(format!(
                    "KPI_METRICS_PUSH_TIMEOUT_SECONDS must not exceed {MAX_PUSH_TIMEOUT_SECONDS} seconds, got {value}"
                )));
            }

            value
        } else {
            DEFAULT_PUSH_TIMEOUT_SECONDS
        };

        let observability = ObservabilityConfig::from_vars(vars)?;

        Ok(Config {
            label_policy,
            push_timeout: Duration::from_secs(push_timeout_seconds),
            observability,
        })
    }

    #[must_use]
    pub fn with_label_policy(mut self, policy: LabelPolicy) -> Self {
        self.label_policy = policy;
        self
    }

    #[must_use]
    pub fn with_push_timeout(mut self, timeout: Duration) -> Self {
        self.push_timeout = timeout;
        self
    }
}
