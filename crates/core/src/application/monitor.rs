// Queue Usage Monitor - per-hub backlog measurement

use std::sync::Arc;

use futures::future::try_join_all;
use tracing::debug;

use crate::domain::{AccountInfo, QueueUsageSnapshot, TaskHubInfo, TaskHubNames};
use crate::port::task_hub_store::{StorageError, TaskHubStore};

/// A reusable handle that measures one resolved task hub's backlog.
///
/// Cached per `(account, task hub)` and shared by every concurrent request
/// for that scale target; safe for unlimited concurrent `usage` calls since
/// each call only reads. Dropping the returned future mid-flight abandons
/// the underlying storage reads and produces no partial snapshot.
pub struct QueueUsageMonitor {
    store: Arc<dyn TaskHubStore>,
    account: AccountInfo,
    names: TaskHubNames,
    info: TaskHubInfo,
}

impl QueueUsageMonitor {
    pub fn new(
        store: Arc<dyn TaskHubStore>,
        account: AccountInfo,
        names: TaskHubNames,
        info: TaskHubInfo,
    ) -> Self {
        Self {
            store,
            account,
            names,
            info,
        }
    }

    /// Partition topology discovered for this hub.
    pub fn hub_info(&self) -> &TaskHubInfo {
        &self.info
    }

    /// Read a fresh point-in-time snapshot: one approximate count per
    /// control-queue partition plus the shared work-item queue, fetched
    /// concurrently. Counts are queue-depth estimates and accepted as-is.
    pub async fn usage(&self) -> Result<QueueUsageSnapshot, StorageError> {
        let control_reads = (0..self.info.partition_count).map(|partition| {
            let queue = self.names.control_queue(partition);
            async move {
                let depth = self.store.queue_depth(&self.account, &queue).await?;
                Ok::<u64, StorageError>(depth.message_count())
            }
        });

        let work_item_queue = self.names.work_item_queue();
        let (partition_backlogs, activity_depth) = futures::try_join!(
            try_join_all(control_reads),
            self.store.queue_depth(&self.account, &work_item_queue),
        )?;

        let snapshot = QueueUsageSnapshot {
            partition_backlogs,
            activity_backlog: activity_depth.message_count(),
        };
        debug!(
            partitions = snapshot.partition_backlogs.len(),
            activity_backlog = snapshot.activity_backlog,
            "measured task hub usage"
        );
        Ok(snapshot)
    }
}
