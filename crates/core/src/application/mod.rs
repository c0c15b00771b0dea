// Application Layer - Discovery, Measurement, and Scaling Decisions

pub mod discovery;
pub mod monitor;
pub mod scaler;

// Re-exports
pub use discovery::{HubResolution, MonitorResolution, TaskHubDiscoveryClient};
pub use monitor::QueueUsageMonitor;
pub use scaler::{MetricSpec, MetricValue, ScaleTarget, ScalerService, METRIC_NAME};
