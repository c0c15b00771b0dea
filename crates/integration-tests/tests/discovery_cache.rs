// Discovery cache behavior under concurrency and cancellation

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::InMemoryTaskHubStore;
use durascaler_core::application::{MonitorResolution, TaskHubDiscoveryClient};
use durascaler_core::domain::AccountInfo;
use durascaler_core::port::task_hub_store::TaskHubStore;
use tokio::task::JoinSet;

fn test_account() -> AccountInfo {
    AccountInfo::for_managed_identity("testacct", "core.windows.net").unwrap()
}

#[tokio::test]
async fn concurrent_uncached_requests_share_one_discovery() {
    let store = Arc::new(InMemoryTaskHubStore::provisioned("OrdersHub", &[1, 1, 1], 0));
    store.set_read_delay(Duration::from_millis(25));
    let client = Arc::new(TaskHubDiscoveryClient::new(
        Arc::clone(&store) as Arc<dyn TaskHubStore>
    ));

    let mut tasks = JoinSet::new();
    for _ in 0..16 {
        let client = Arc::clone(&client);
        tasks.spawn(async move { client.monitor(&test_account(), "OrdersHub").await });
    }

    let mut ready = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined.unwrap().unwrap() {
            MonitorResolution::Ready(monitor) => {
                assert_eq!(monitor.hub_info().partition_count, 3);
                ready += 1;
            }
            MonitorResolution::HubNotFound => panic!("hub should resolve"),
        }
    }
    assert_eq!(ready, 16);
    assert_eq!(store.metadata_reads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn concurrent_waiters_see_the_same_failure_once() {
    let store = Arc::new(InMemoryTaskHubStore::provisioned("OrdersHub", &[1], 0));
    store.set_failing(true);
    store.set_read_delay(Duration::from_millis(25));
    let client = Arc::new(TaskHubDiscoveryClient::new(
        Arc::clone(&store) as Arc<dyn TaskHubStore>
    ));

    let mut tasks = JoinSet::new();
    for _ in 0..8 {
        let client = Arc::clone(&client);
        tasks.spawn(async move { client.monitor(&test_account(), "OrdersHub").await });
    }
    while let Some(joined) = tasks.join_next().await {
        assert!(joined.unwrap().is_err());
    }
    // One shared discovery failed; the failure was fanned out, not re-run.
    assert_eq!(store.metadata_reads.load(Ordering::SeqCst), 1);

    // The failure was not cached: recovery is observed on the next call.
    store.set_failing(false);
    store.set_read_delay(Duration::ZERO);
    assert!(matches!(
        client.monitor(&test_account(), "OrdersHub").await.unwrap(),
        MonitorResolution::Ready(_)
    ));
}

#[tokio::test]
async fn cancelled_discovery_is_retried_from_scratch() {
    let store = Arc::new(InMemoryTaskHubStore::provisioned("OrdersHub", &[2, 2], 4));
    store.set_read_delay(Duration::from_millis(50));
    let client = TaskHubDiscoveryClient::new(Arc::clone(&store) as Arc<dyn TaskHubStore>);

    // The caller gives up mid-discovery; dropping the future abandons the
    // in-flight read and must not leave a poisoned cache slot behind.
    let cancelled = tokio::time::timeout(
        Duration::from_millis(5),
        client.monitor(&test_account(), "OrdersHub"),
    )
    .await;
    assert!(cancelled.is_err());

    store.set_read_delay(Duration::ZERO);
    let monitor = match client.monitor(&test_account(), "OrdersHub").await.unwrap() {
        MonitorResolution::Ready(monitor) => monitor,
        MonitorResolution::HubNotFound => panic!("hub should resolve"),
    };
    assert_eq!(store.metadata_reads.load(Ordering::SeqCst), 2);

    // The fresh monitor is fully functional.
    let usage = monitor.usage().await.unwrap();
    assert_eq!(usage.partition_backlogs, vec![2, 2]);
    assert_eq!(usage.activity_backlog, 4);
}

#[tokio::test]
async fn cancelled_usage_read_produces_no_partial_snapshot() {
    let store = Arc::new(InMemoryTaskHubStore::provisioned("OrdersHub", &[3, 3], 1));
    let client = TaskHubDiscoveryClient::new(Arc::clone(&store) as Arc<dyn TaskHubStore>);

    let monitor = match client.monitor(&test_account(), "OrdersHub").await.unwrap() {
        MonitorResolution::Ready(monitor) => monitor,
        MonitorResolution::HubNotFound => panic!("hub should resolve"),
    };

    store.set_read_delay(Duration::from_millis(50));
    let cancelled =
        tokio::time::timeout(Duration::from_millis(5), monitor.usage()).await;
    assert!(cancelled.is_err());

    // The monitor stays healthy for the next caller.
    store.set_read_delay(Duration::ZERO);
    let usage = monitor.usage().await.unwrap();
    assert_eq!(usage.partition_backlogs, vec![3, 3]);
    assert_eq!(usage.activity_backlog, 1);
}

#[tokio::test]
async fn distinct_accounts_get_distinct_monitors() {
    let store = Arc::new(InMemoryTaskHubStore::provisioned("OrdersHub", &[1], 0));
    let client = TaskHubDiscoveryClient::new(Arc::clone(&store) as Arc<dyn TaskHubStore>);

    let a = AccountInfo::for_managed_identity("acct-a", "core.windows.net").unwrap();
    let b = AccountInfo::for_managed_identity("acct-b", "core.windows.net").unwrap();

    assert!(matches!(
        client.monitor(&a, "OrdersHub").await.unwrap(),
        MonitorResolution::Ready(_)
    ));
    assert!(matches!(
        client.monitor(&b, "OrdersHub").await.unwrap(),
        MonitorResolution::Ready(_)
    ));
    // Different cache keys - discovery ran once per account.
    assert_eq!(store.metadata_reads.load(Ordering::SeqCst), 2);
}
