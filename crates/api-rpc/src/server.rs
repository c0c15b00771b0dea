//! JSON-RPC Server
//!
//! Serves the three scaler operations over JSON-RPC 2.0 on localhost TCP.
//! The autoscaling controller is expected to run as a sidecar or on the
//! same host, so no external binding is offered.

use std::sync::Arc;

use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::RpcModule;
use tracing::info;

use durascaler_core::application::ScalerService;

use crate::handler::RpcHandler;
use crate::types::ScaledTargetParams;

const DEFAULT_RPC_HOST: &str = "127.0.0.1";
const DEFAULT_RPC_PORT: u16 = 9740;

/// RPC Server Configuration
pub struct RpcServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RPC_HOST.to_string(),
            port: DEFAULT_RPC_PORT,
        }
    }
}

/// RPC Server
pub struct RpcServer {
    config: RpcServerConfig,
    handler: Arc<RpcHandler>,
}

impl RpcServer {
    pub fn new(config: RpcServerConfig, service: Arc<ScalerService>) -> Self {
        Self {
            config,
            handler: Arc::new(RpcHandler::new(service)),
        }
    }

    /// Start the JSON-RPC server.
    ///
    /// Dropping a connection mid-call drops the in-flight handler future,
    /// which is how caller cancellation propagates into discovery and
    /// usage reads.
    pub async fn start(self) -> Result<ServerHandle, String> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        info!(
            host = %self.config.host,
            port = %self.config.port,
            "Starting JSON-RPC server"
        );

        let server = Server::builder()
            .build(&addr)
            .await
            .map_err(|e| format!("Failed to build server on {}: {}", addr, e))?;

        let mut module = RpcModule::new(());

        let handler = self.handler.clone();
        module
            .register_async_method("scaler.is_active.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: ScaledTargetParams = params.parse()?;
                    handler.is_active(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("scaler.metric_spec.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: ScaledTargetParams = params.parse()?;
                    handler.metric_spec(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("scaler.metric_value.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: ScaledTargetParams = params.parse()?;
                    handler.metric_value(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        info!("JSON-RPC server started successfully");

        let handle = server.start(module);
        Ok(handle)
    }
}
