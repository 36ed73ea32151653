//! Request and response bodies.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Body of the update endpoints. `value` is ignored by increment and
/// decrement.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricRequest {
    pub name: String,
    #[serde(default)]
    pub value: f64,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PushRequest {
    pub gateway_url: String,
    pub job_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StatusResponse {
    pub fn success() -> Self {
        Self {
            status: "success".to_string(),
            message: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListResponse {
    pub metrics: Vec<String>,
    pub count: usize,
}

/// One registered metric in the debug listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDetail {
    #[serde(rename = "type")]
    pub kind: String,
    pub status: String,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub registered: usize,
}
