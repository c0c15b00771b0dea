//! RPC Request/Response Types
//!
//! Defines the JSON-RPC method parameters and results for the three
//! scaler operations.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Scale target reference shared by all three methods: the workload's
/// name/namespace plus the untyped scaler configuration map.
#[derive(Debug, Deserialize)]
pub struct ScaledTargetParams {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// scaler.is_active.v1
#[derive(Debug, Clone, Serialize)]
pub struct IsActiveResponse {
    pub active: bool,
}

/// scaler.metric_spec.v1
#[derive(Debug, Clone, Serialize)]
pub struct MetricSpecResponse {
    pub metric_name: String,
    pub target_size: u64,
}

/// scaler.metric_value.v1
#[derive(Debug, Clone, Serialize)]
pub struct MetricValueResponse {
    pub metric_name: String,
    pub metric_value: u64,
}
