//! Common configuration types for KPI metrics components.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Default log filter directive when neither `RUST_LOG` nor
/// `KPI_METRICS_LOG_LEVEL` is set.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Errors produced while reading observability settings.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ObservabilityConfigError {
    #[error("Invalid log level: {0}")]
    InvalidLogLevel(String),

    #[error("Invalid boolean for {name}: {value}")]
    InvalidBool { name: String, value: String },
}

/// Observability configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Enable JSON-formatted logs
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            json_logs: false,
        }
    }
}

impl ObservabilityConfig {
    /// Load observability settings from a variable map.
    ///
    /// Reads `KPI_METRICS_LOG_LEVEL` and `KPI_METRICS_JSON_LOGS`; both are
    /// optional.
    ///
    /// # Errors
    ///
    /// Returns an error if the log level is not one of the five tracing levels
    /// or if the JSON flag is not a recognizable boolean.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ObservabilityConfigError> {
        let log_level = match vars.get("KPI_METRICS_LOG_LEVEL") {
            Some(value) => {
                let normalized = value.trim().to_ascii_lowercase();
                if !["trace", "debug", "info", "warn", "error"].contains(&normalized.as_str()) {
                    return Err(ObservabilityConfigError::InvalidLogLevel(value.clone()));
                }
                normalized
            }
            None => DEFAULT_LOG_LEVEL.to_string(),
        };

        let json_logs = match vars.get("KPI_METRICS_JSON_LOGS") {
            Some(value) => parse_bool(value).ok_or_else(|| {
                ObservabilityConfigError::InvalidBool {
                    name: "KPI_METRICS_JSON_LOGS".to_string(),
                    value: value.clone(),
                }
            })?,
            None => false,
        };

        Ok(Self {
            log_level,
            json_logs,
        })
    }
}

/// Parse the usual spellings of a boolean environment value.
#[must_use]
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_unset() {
        let config = ObservabilityConfig::from_vars(&HashMap::new()).unwrap();
        assert_eq!(config, ObservabilityConfig::default());
    }

    #[test]
    fn test_log_level_is_normalized() {
        let vars = HashMap::from([("KPI_METRICS_LOG_LEVEL".to_string(), " DEBUG ".to_string())]);
        let config = ObservabilityConfig::from_vars(&vars).unwrap();
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        let vars = HashMap::from([("KPI_METRICS_LOG_LEVEL".to_string(), "loud".to_string())]);
        assert_eq!(
            ObservabilityConfig::from_vars(&vars),
            Err(ObservabilityConfigError::InvalidLogLevel("loud".to_string()))
        );
    }

    #[test]
    fn test_json_logs_flag() {
        let vars = HashMap::from([("KPI_METRICS_JSON_LOGS".to_string(), "yes".to_string())]);
        assert!(ObservabilityConfig::from_vars(&vars).unwrap().json_logs);

        let vars = HashMap::from([("KPI_METRICS_JSON_LOGS".to_string(), "maybe".to_string())]);
        assert!(matches!(
            ObservabilityConfig::from_vars(&vars),
            Err(ObservabilityConfigError::InvalidBool { .. })
        ));
    }

    #[test]
    fn test_config_serde_roundtrip_shape() {
        let json = serde_json::to_value(ObservabilityConfig::default()).unwrap();
        assert_eq!(json["log_level"], "info");
        assert_eq!(json["json_logs"], false);
    }
}
