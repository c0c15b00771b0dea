//! RPC Method Handlers
//!
//! Bridges the JSON-RPC surface to the scaler decision service.

use std::sync::Arc;

use jsonrpsee::types::ErrorObjectOwned;
use tracing::debug;

use durascaler_core::application::{ScaleTarget, ScalerService};

use crate::error::to_rpc_error;
use crate::types::{
    IsActiveResponse, MetricSpecResponse, MetricValueResponse, ScaledTargetParams,
};

/// RPC handler with the injected decision service
pub struct RpcHandler {
    service: Arc<ScalerService>,
}

impl RpcHandler {
    pub fn new(service: Arc<ScalerService>) -> Self {
        Self { service }
    }

    /// scaler.is_active.v1
    pub async fn is_active(
        &self,
        params: ScaledTargetParams,
    ) -> Result<IsActiveResponse, ErrorObjectOwned> {
        let target = to_target(params);
        let active = self
            .service
            .is_active(&target)
            .await
            .map_err(to_rpc_error)?;

        debug!(scale_target = %target.name, active, "is_active evaluated");
        Ok(IsActiveResponse { active })
    }

    /// scaler.metric_spec.v1
    pub async fn metric_spec(
        &self,
        params: ScaledTargetParams,
    ) -> Result<MetricSpecResponse, ErrorObjectOwned> {
        let target = to_target(params);
        let spec = self.service.metric_spec(&target).map_err(to_rpc_error)?;

        Ok(MetricSpecResponse {
            metric_name: spec.metric_name,
            target_size: spec.target_size,
        })
    }

    /// scaler.metric_value.v1
    pub async fn metric_value(
        &self,
        params: ScaledTargetParams,
    ) -> Result<MetricValueResponse, ErrorObjectOwned> {
        let target = to_target(params);
        let value = self
            .service
            .metric_value(&target)
            .await
            .map_err(to_rpc_error)?;

        debug!(scale_target = %target.name, metric_value = value.metric_value, "metric value served");
        Ok(MetricValueResponse {
            metric_name: value.metric_name,
            metric_value: value.metric_value,
        })
    }
}

fn to_target(params: ScaledTargetParams) -> ScaleTarget {
    ScaleTarget {
        name: params.name,
        namespace: params.namespace,
        metadata: params.metadata,
    }
}
