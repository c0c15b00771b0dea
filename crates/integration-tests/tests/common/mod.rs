// Shared test support: an in-memory task hub store
// Each test binary uses a different slice of this module.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use durascaler_core::domain::AccountInfo;
use durascaler_core::port::task_hub_store::{QueueDepth, StorageError, TaskHubStore};

pub const TEST_CONNECTION_STRING: &str =
    "DefaultEndpointsProtocol=https;AccountName=testacct;AccountKey=dGVzdC1rZXk=;EndpointSuffix=core.windows.net";

/// In-memory `TaskHubStore`: a provisioned hub is a metadata document plus
/// per-queue depths. Counts every storage call so tests can assert
/// single-flight and short-circuit behavior.
pub struct InMemoryTaskHubStore {
    metadata: Mutex<Option<Vec<u8>>>,
    queue_depths: Mutex<HashMap<String, u64>>,
    pub metadata_reads: AtomicUsize,
    pub queue_reads: AtomicUsize,
    fail: AtomicBool,
    read_delay: Mutex<Duration>,
}

impl InMemoryTaskHubStore {
    pub fn unprovisioned() -> Self {
        Self {
            metadata: Mutex::new(None),
            queue_depths: Mutex::new(HashMap::new()),
            metadata_reads: AtomicUsize::new(0),
            queue_reads: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
            read_delay: Mutex::new(Duration::ZERO),
        }
    }

    /// A hub with the given per-partition control-queue depths and
    /// work-item queue depth, provisioned under the task hub name's
    /// lowercase queue-naming convention.
    pub fn provisioned(task_hub: &str, partition_depths: &[u64], activity_depth: u64) -> Self {
        let store = Self::unprovisioned();
        let doc = format!(
            r#"{{"TaskHubName":"{task_hub}","CreatedAt":"2024-03-01T12:00:00Z","PartitionCount":{}}}"#,
            partition_depths.len()
        );
        *store.metadata.lock().unwrap() = Some(doc.into_bytes());

        let hub = task_hub.to_ascii_lowercase();
        let mut depths = store.queue_depths.lock().unwrap();
        for (partition, depth) in partition_depths.iter().enumerate() {
            depths.insert(format!("{hub}-control-{partition:02}"), *depth);
        }
        depths.insert(format!("{hub}-workitems"), activity_depth);
        drop(depths);
        store
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }

    pub fn set_read_delay(&self, delay: Duration) {
        *self.read_delay.lock().unwrap() = delay;
    }

    pub fn storage_calls(&self) -> usize {
        self.metadata_reads.load(Ordering::SeqCst) + self.queue_reads.load(Ordering::SeqCst)
    }

    async fn simulate_latency(&self) -> Result<(), StorageError> {
        let delay = *self.read_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(StorageError::Transport("simulated outage".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl TaskHubStore for InMemoryTaskHubStore {
    async fn read_metadata_record(
        &self,
        _account: &AccountInfo,
        _container: &str,
        _blob: &str,
    ) -> Result<Option<Vec<u8>>, StorageError> {
        self.metadata_reads.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await?;
        Ok(self.metadata.lock().unwrap().clone())
    }

    async fn queue_depth(
        &self,
        _account: &AccountInfo,
        queue: &str,
    ) -> Result<QueueDepth, StorageError> {
        self.queue_reads.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await?;
        Ok(match self.queue_depths.lock().unwrap().get(queue) {
            Some(depth) => QueueDepth::Messages(*depth),
            None => QueueDepth::Missing,
        })
    }
}
