// Scaler Decision Service - the three protocol operations

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::application::discovery::{MonitorResolution, TaskHubDiscoveryClient};
use crate::domain::{required_workers, ScalerMetadata};
use crate::error::Result;
use crate::port::AccountResolver;

/// Fixed metric identifier shared by the spec and value responses; the
/// protocol requires the two to match. The unit is "pending activities",
/// with orchestration demand converted into it via the allocator.
pub const METRIC_NAME: &str = "pending-activity-backlog";

/// One scale target as referenced by the autoscaling controller: a
/// name/namespace pair plus the untyped configuration map.
#[derive(Debug, Clone, Default)]
pub struct ScaleTarget {
    pub name: String,
    pub namespace: String,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSpec {
    pub metric_name: String,
    pub target_size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricValue {
    pub metric_name: String,
    pub metric_value: u64,
}

/// Implements the scaler protocol: activity check, metric specification,
/// and metric value. Owns metadata validation and unit conversion; all
/// storage work happens behind the discovery client.
///
/// Validation always runs first and short-circuits every downstream step.
/// An unprovisioned hub is uniformly reported as "no load" rather than an
/// error; storage faults always propagate so an outage is never mistaken
/// for an idle hub.
pub struct ScalerService {
    accounts: Arc<dyn AccountResolver>,
    discovery: Arc<TaskHubDiscoveryClient>,
}

impl ScalerService {
    pub fn new(accounts: Arc<dyn AccountResolver>, discovery: Arc<TaskHubDiscoveryClient>) -> Self {
        Self {
            accounts,
            discovery,
        }
    }

    /// True iff the target's hub has any orchestration or activity backlog.
    pub async fn is_active(&self, target: &ScaleTarget) -> Result<bool> {
        let metadata = ScalerMetadata::from_map(&target.metadata)?;
        let account = self.accounts.resolve(&metadata)?;

        let monitor = match self.discovery.monitor(&account, &metadata.task_hub_name).await? {
            MonitorResolution::Ready(monitor) => monitor,
            MonitorResolution::HubNotFound => {
                debug!(scale_target = %target.name, task_hub = %metadata.task_hub_name,
                    "hub not provisioned; reporting inactive");
                return Ok(false);
            }
        };

        let usage = monitor.usage().await?;
        Ok(usage.has_pending_work())
    }

    /// The scaling unit: activities per worker. The controller compares
    /// each reported metric value against this target size.
    pub fn metric_spec(&self, target: &ScaleTarget) -> Result<MetricSpec> {
        let metadata = ScalerMetadata::from_map(&target.metadata)?;
        Ok(MetricSpec {
            metric_name: METRIC_NAME.to_string(),
            target_size: u64::from(metadata.max_activities_per_worker),
        })
    }

    /// Current load in activity units.
    ///
    /// Orchestration-partition demand cannot be expressed directly in
    /// activity units, so it is first converted to a worker-count
    /// requirement; each required worker is then assumed to need a full
    /// activity share to keep orchestration processing unblocked. That
    /// converted demand plus the literal activity backlog is the one
    /// scalar the controller compares against the target size.
    pub async fn metric_value(&self, target: &ScaleTarget) -> Result<MetricValue> {
        let metadata = ScalerMetadata::from_map(&target.metadata)?;
        let account = self.accounts.resolve(&metadata)?;

        let monitor = match self.discovery.monitor(&account, &metadata.task_hub_name).await? {
            MonitorResolution::Ready(monitor) => monitor,
            MonitorResolution::HubNotFound => {
                debug!(scale_target = %target.name, task_hub = %metadata.task_hub_name,
                    "hub not provisioned; reporting zero load");
                return Ok(MetricValue {
                    metric_name: METRIC_NAME.to_string(),
                    metric_value: 0,
                });
            }
        };

        let usage = monitor.usage().await?;
        let workers = required_workers(
            &usage.partition_backlogs,
            metadata.max_orchestrations_per_worker,
        );
        let metric_value = usage.activity_backlog
            + u64::from(workers) * u64::from(metadata.max_activities_per_worker);

        debug!(
            scale_target = %target.name,
            task_hub = %metadata.task_hub_name,
            activity_backlog = usage.activity_backlog,
            required_workers = workers,
            metric_value,
            "computed metric value"
        );
        Ok(MetricValue {
            metric_name: METRIC_NAME.to_string(),
            metric_value,
        })
    }
}
