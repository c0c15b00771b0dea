// Task Hub Discovery - metadata resolution and single-flight monitor cache

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::future::{BoxFuture, Shared, WeakShared};
use futures::FutureExt;
use tracing::{debug, info};

use crate::application::monitor::QueueUsageMonitor;
use crate::domain::{AccountInfo, TaskHubInfo, TaskHubNames, TASK_HUB_METADATA_BLOB};
use crate::port::task_hub_store::{StorageError, TaskHubStore};

/// Outcome of resolving a task hub's metadata.
///
/// A hub that is not yet provisioned (missing or structurally invalid
/// metadata record) is an expected state, not an error; callers map it to
/// "zero load". Transport and auth failures surface as `StorageError`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubResolution {
    Found(TaskHubInfo),
    NotFound,
}

/// Outcome of acquiring a usage monitor for a scale target.
#[derive(Clone)]
pub enum MonitorResolution {
    Ready(Arc<QueueUsageMonitor>),
    HubNotFound,
}

impl std::fmt::Debug for MonitorResolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MonitorResolution::Ready(_) => f.write_str("Ready(..)"),
            MonitorResolution::HubNotFound => f.write_str("HubNotFound"),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Hash)]
struct MonitorKey {
    account: AccountInfo,
    task_hub: String,
}

type DiscoveryFuture = BoxFuture<'static, Result<MonitorResolution, StorageError>>;

/// Cache slot per scale target. `Pending` holds only a weak handle: if
/// every waiter cancels, the in-flight discovery is dropped (its storage
/// reads abandoned) and the slot upgrades to nothing, so the next caller
/// starts a fresh discovery instead of awaiting a dead future.
enum Slot {
    Ready(Arc<QueueUsageMonitor>),
    Pending(WeakShared<DiscoveryFuture>),
}

/// Resolves `(account, task hub)` pairs and hands out cached usage
/// monitors.
///
/// The monitor cache is the only long-lived shared mutable state in the
/// scaler. Resolution of a not-yet-cached key runs at most once
/// concurrently: the first caller installs a shared discovery future and
/// every concurrent caller for the same key awaits that same future,
/// observing one outcome. Successful results are published from inside the
/// shared future, exactly once; `NotFound` and errors are never cached.
///
/// Entries are never evicted: a hub's partition count is fixed at creation,
/// and a deleted-and-recreated hub is rare enough that process restart is
/// the documented recovery path.
pub struct TaskHubDiscoveryClient {
    store: Arc<dyn TaskHubStore>,
    monitors: Arc<Mutex<HashMap<MonitorKey, Slot>>>,
}

impl TaskHubDiscoveryClient {
    pub fn new(store: Arc<dyn TaskHubStore>) -> Self {
        Self {
            store,
            monitors: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Read the hub's metadata record and parse its partition topology.
    ///
    /// Missing or structurally invalid metadata is `NotFound`; storage
    /// failures propagate.
    pub async fn resolve(
        &self,
        account: &AccountInfo,
        task_hub: &str,
    ) -> Result<HubResolution, StorageError> {
        match read_hub_info(self.store.as_ref(), account, task_hub).await? {
            Some(info) => Ok(HubResolution::Found(info)),
            None => Ok(HubResolution::NotFound),
        }
    }

    /// Get the cached monitor for a scale target, discovering the hub on
    /// first use.
    pub async fn monitor(
        &self,
        account: &AccountInfo,
        task_hub: &str,
    ) -> Result<MonitorResolution, StorageError> {
        let key = MonitorKey {
            account: account.clone(),
            task_hub: task_hub.to_string(),
        };

        let shared = {
            let mut slots = self.monitors.lock().unwrap();
            let joinable = match slots.get(&key) {
                Some(Slot::Ready(monitor)) => {
                    return Ok(MonitorResolution::Ready(Arc::clone(monitor)))
                }
                // Upgrade fails when every previous waiter cancelled and
                // the discovery was dropped; start over in that case.
                Some(Slot::Pending(weak)) => weak.upgrade(),
                None => None,
            };
            match joinable {
                Some(shared) => shared,
                None => {
                    let shared = self.begin_discovery(&key);
                    if let Some(weak) = shared.downgrade() {
                        slots.insert(key, Slot::Pending(weak));
                    }
                    shared
                }
            }
        };

        shared.await
    }

    /// Build the shared discovery future for one key. The future publishes
    /// its own outcome into the cache before completing: `Ready` is stored,
    /// anything else clears the slot so a later request retries.
    fn begin_discovery(&self, key: &MonitorKey) -> Shared<DiscoveryFuture> {
        let store = Arc::clone(&self.store);
        let monitors = Arc::clone(&self.monitors);
        let key = key.clone();

        let future: DiscoveryFuture = async move {
            let result = discover_monitor(store, &key.account, &key.task_hub).await;

            let mut slots = monitors.lock().unwrap();
            match &result {
                Ok(MonitorResolution::Ready(monitor)) => {
                    slots.insert(key, Slot::Ready(Arc::clone(monitor)));
                }
                _ => {
                    slots.remove(&key);
                }
            }
            result
        }
        .boxed();

        future.shared()
    }
}

async fn discover_monitor(
    store: Arc<dyn TaskHubStore>,
    account: &AccountInfo,
    task_hub: &str,
) -> Result<MonitorResolution, StorageError> {
    let info = match read_hub_info(store.as_ref(), account, task_hub).await? {
        Some(info) => info,
        None => return Ok(MonitorResolution::HubNotFound),
    };

    info!(
        task_hub,
        account = %account.account_name,
        partition_count = info.partition_count,
        "discovered task hub"
    );
    let monitor = QueueUsageMonitor::new(store, account.clone(), TaskHubNames::new(task_hub), info);
    Ok(MonitorResolution::Ready(Arc::new(monitor)))
}

async fn read_hub_info(
    store: &dyn TaskHubStore,
    account: &AccountInfo,
    task_hub: &str,
) -> Result<Option<TaskHubInfo>, StorageError> {
    let names = TaskHubNames::new(task_hub);
    let record = store
        .read_metadata_record(account, &names.lease_container(), TASK_HUB_METADATA_BLOB)
        .await?;

    let info = record.as_deref().and_then(TaskHubInfo::parse);
    if info.is_none() {
        debug!(
            task_hub,
            account = %account.account_name,
            "task hub metadata not found; hub not yet provisioned"
        );
    }
    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::task_hub_store::QueueDepth;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::task::JoinSet;

    const HUB_METADATA: &[u8] =
        br#"{"TaskHubName":"OrdersHub","CreatedAt":"2024-03-01T12:00:00Z","PartitionCount":4}"#;

    struct CountingStore {
        metadata: Option<Vec<u8>>,
        metadata_reads: AtomicUsize,
        read_delay: Duration,
        fail: bool,
    }

    impl CountingStore {
        fn with_hub() -> Self {
            Self {
                metadata: Some(HUB_METADATA.to_vec()),
                metadata_reads: AtomicUsize::new(0),
                read_delay: Duration::ZERO,
                fail: false,
            }
        }
    }

    #[async_trait]
    impl TaskHubStore for CountingStore {
        async fn read_metadata_record(
            &self,
            _account: &AccountInfo,
            _container: &str,
            _blob: &str,
        ) -> Result<Option<Vec<u8>>, StorageError> {
            self.metadata_reads.fetch_add(1, Ordering::SeqCst);
            if !self.read_delay.is_zero() {
                tokio::time::sleep(self.read_delay).await;
            }
            if self.fail {
                return Err(StorageError::Transport("connection refused".to_string()));
            }
            Ok(self.metadata.clone())
        }

        async fn queue_depth(
            &self,
            _account: &AccountInfo,
            _queue: &str,
        ) -> Result<QueueDepth, StorageError> {
            Ok(QueueDepth::Messages(0))
        }
    }

    fn test_account() -> AccountInfo {
        AccountInfo::for_managed_identity("testacct", "core.windows.net").unwrap()
    }

    #[tokio::test]
    async fn resolve_reports_found_and_not_found() {
        let client = TaskHubDiscoveryClient::new(Arc::new(CountingStore::with_hub()));
        match client.resolve(&test_account(), "OrdersHub").await.unwrap() {
            HubResolution::Found(info) => assert_eq!(info.partition_count, 4),
            HubResolution::NotFound => panic!("expected hub to be found"),
        }

        let empty = TaskHubDiscoveryClient::new(Arc::new(CountingStore {
            metadata: None,
            ..CountingStore::with_hub()
        }));
        assert_eq!(
            empty.resolve(&test_account(), "OrdersHub").await.unwrap(),
            HubResolution::NotFound
        );
    }

    #[tokio::test]
    async fn concurrent_monitor_requests_trigger_one_discovery() {
        let store = Arc::new(CountingStore {
            read_delay: Duration::from_millis(20),
            ..CountingStore::with_hub()
        });
        let client = Arc::new(TaskHubDiscoveryClient::new(
            Arc::clone(&store) as Arc<dyn TaskHubStore>
        ));

        let mut tasks = JoinSet::new();
        for _ in 0..8 {
            let client = Arc::clone(&client);
            tasks.spawn(async move { client.monitor(&test_account(), "OrdersHub").await });
        }
        while let Some(result) = tasks.join_next().await {
            match result.unwrap().unwrap() {
                MonitorResolution::Ready(monitor) => {
                    assert_eq!(monitor.hub_info().partition_count, 4)
                }
                MonitorResolution::HubNotFound => panic!("expected monitor"),
            }
        }

        assert_eq!(store.metadata_reads.load(Ordering::SeqCst), 1);

        // Later calls hit the cache without touching storage again.
        client.monitor(&test_account(), "OrdersHub").await.unwrap();
        assert_eq!(store.metadata_reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_waiters_observe_the_same_failure() {
        let store = Arc::new(CountingStore {
            fail: true,
            read_delay: Duration::from_millis(20),
            ..CountingStore::with_hub()
        });
        let client = Arc::new(TaskHubDiscoveryClient::new(
            Arc::clone(&store) as Arc<dyn TaskHubStore>
        ));

        let mut tasks = JoinSet::new();
        for _ in 0..4 {
            let client = Arc::clone(&client);
            tasks.spawn(async move { client.monitor(&test_account(), "OrdersHub").await });
        }
        while let Some(result) = tasks.join_next().await {
            let err = result.unwrap().unwrap_err();
            assert_eq!(err, StorageError::Transport("connection refused".to_string()));
        }
        assert_eq!(store.metadata_reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_discovery_is_not_cached() {
        let store = Arc::new(CountingStore {
            fail: true,
            ..CountingStore::with_hub()
        });
        let client = TaskHubDiscoveryClient::new(Arc::clone(&store) as Arc<dyn TaskHubStore>);

        assert!(client.monitor(&test_account(), "OrdersHub").await.is_err());
        assert!(client.monitor(&test_account(), "OrdersHub").await.is_err());
        assert_eq!(store.metadata_reads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn not_found_is_not_cached() {
        let store = Arc::new(CountingStore {
            metadata: None,
            ..CountingStore::with_hub()
        });
        let client = TaskHubDiscoveryClient::new(Arc::clone(&store) as Arc<dyn TaskHubStore>);

        for _ in 0..2 {
            match client.monitor(&test_account(), "OrdersHub").await.unwrap() {
                MonitorResolution::HubNotFound => {}
                MonitorResolution::Ready(_) => panic!("hub should not resolve"),
            }
        }
        assert_eq!(store.metadata_reads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cancelled_discovery_leaves_no_poisoned_slot() {
        let store = Arc::new(CountingStore {
            read_delay: Duration::from_millis(50),
            ..CountingStore::with_hub()
        });
        let client = TaskHubDiscoveryClient::new(Arc::clone(&store) as Arc<dyn TaskHubStore>);

        // The only waiter times out and drops the in-flight discovery.
        let cancelled = tokio::time::timeout(
            Duration::from_millis(5),
            client.monitor(&test_account(), "OrdersHub"),
        )
        .await;
        assert!(cancelled.is_err());

        // A later request discovers from scratch and succeeds.
        match client.monitor(&test_account(), "OrdersHub").await.unwrap() {
            MonitorResolution::Ready(monitor) => {
                assert_eq!(monitor.hub_info().partition_count, 4)
            }
            MonitorResolution::HubNotFound => panic!("expected monitor"),
        }
        assert_eq!(store.metadata_reads.load(Ordering::SeqCst), 2);
    }
}
