//! Durascaler - Main Entry Point
//!
//! External autoscaler for durable task hubs on Azure Storage: serves the
//! activity/metric protocol over JSON-RPC for an autoscaling controller.

mod telemetry;

use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use durascaler_api_rpc::{RpcServer, RpcServerConfig};
use durascaler_core::application::{ScalerService, TaskHubDiscoveryClient};
use durascaler_core::port::task_hub_store::TaskHubStore;
use durascaler_core::port::EnvAccountResolver;
use durascaler_infra_azure::AzureTaskHubStore;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize logging (JSON format for production)
    let log_format =
        std::env::var("DURASCALER_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("durascaler=info"))
        .expect("Failed to create env filter");

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty())
                .init();
        }
    }

    info!("Durascaler v{} starting...", VERSION);

    // 1.1. Initialize OpenTelemetry (optional)
    if let Err(e) = telemetry::init_telemetry() {
        tracing::warn!(error = ?e, "Failed to initialize OpenTelemetry (continuing without it)");
    }

    // 2. Load configuration
    let rpc_host =
        std::env::var("DURASCALER_RPC_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let rpc_port: u16 = std::env::var("DURASCALER_RPC_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(9740);

    // 3. Setup dependencies (DI wiring)
    let store: Arc<dyn TaskHubStore> = Arc::new(
        AzureTaskHubStore::new()
            .map_err(|e| anyhow::anyhow!("storage client init failed: {e}"))?,
    );
    let discovery = Arc::new(TaskHubDiscoveryClient::new(store));
    let service = Arc::new(ScalerService::new(
        Arc::new(EnvAccountResolver),
        discovery,
    ));

    // 4. Start JSON-RPC server
    info!("Starting JSON-RPC server...");
    let rpc_config = RpcServerConfig {
        host: rpc_host,
        port: rpc_port,
    };
    let rpc_handle = RpcServer::new(rpc_config, service)
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("RPC server start failed: {}", e))?;

    info!("Ready. Serving scaler requests.");
    info!("Press Ctrl+C to shutdown");

    // 5. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received. Exiting gracefully...");

    rpc_handle
        .stop()
        .map_err(|e| anyhow::anyhow!("RPC server stop failed: {}", e))?;
    rpc_handle.stopped().await;

    info!("Shutdown complete.");

    Ok(())
}
