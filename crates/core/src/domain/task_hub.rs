// Task Hub Identity - partition topology and storage naming conventions

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

/// Name of the metadata record describing a task hub, kept in the hub's
/// lease container by the worker runtime that provisions the hub.
pub const TASK_HUB_METADATA_BLOB: &str = "taskhub.json";

/// Discovered identity of a task hub.
///
/// The partition count is fixed at task-hub creation and immutable
/// thereafter; a successfully discovered hub never has zero partitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskHubInfo {
    pub partition_count: u32,
    pub created_at: DateTime<Utc>,
}

impl TaskHubInfo {
    /// Parse the metadata record. Returns `None` for structurally invalid
    /// content (bad JSON, zero partitions), which callers treat the same as
    /// a missing record: hub not yet provisioned.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let doc: TaskHubMetadataDoc = match serde_json::from_slice(bytes) {
            Ok(doc) => doc,
            Err(e) => {
                debug!(error = %e, "task hub metadata record is not valid JSON");
                return None;
            }
        };
        if doc.partition_count == 0 {
            debug!("task hub metadata record has zero partitions");
            return None;
        }
        Some(Self {
            partition_count: doc.partition_count,
            created_at: doc.created_at,
        })
    }
}

/// Wire form of the `taskhub.json` document.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TaskHubMetadataDoc {
    #[allow(dead_code)]
    task_hub_name: Option<String>,
    created_at: DateTime<Utc>,
    partition_count: u32,
}

/// Storage object names derived from a task hub name.
///
/// The durable-task convention: orchestration work is sharded over control
/// queues `<hub>-control-NN`, activity work sits in one shared
/// `<hub>-workitems` queue, and hub metadata lives in the `<hub>-leases`
/// blob container. All names are lowercase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskHubNames {
    hub_lower: String,
}

impl TaskHubNames {
    pub fn new(task_hub_name: &str) -> Self {
        Self {
            hub_lower: task_hub_name.to_ascii_lowercase(),
        }
    }

    pub fn lease_container(&self) -> String {
        format!("{}-leases", self.hub_lower)
    }

    pub fn work_item_queue(&self) -> String {
        format!("{}-workitems", self.hub_lower)
    }

    pub fn control_queue(&self, partition: u32) -> String {
        format!("{}-control-{partition:02}", self.hub_lower)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_metadata_document() {
        let info = TaskHubInfo::parse(
            br#"{"TaskHubName":"OrdersHub","CreatedAt":"2024-03-01T12:00:00Z","PartitionCount":4}"#,
        )
        .unwrap();
        assert_eq!(info.partition_count, 4);
        assert_eq!(info.created_at.to_rfc3339(), "2024-03-01T12:00:00+00:00");
    }

    #[test]
    fn invalid_json_is_not_found() {
        assert!(TaskHubInfo::parse(b"not-json").is_none());
        assert!(TaskHubInfo::parse(br#"{"PartitionCount":"four"}"#).is_none());
    }

    #[test]
    fn zero_partitions_is_not_found() {
        assert!(TaskHubInfo::parse(
            br#"{"CreatedAt":"2024-03-01T12:00:00Z","PartitionCount":0}"#
        )
        .is_none());
    }

    #[test]
    fn queue_names_follow_convention() {
        let names = TaskHubNames::new("OrdersHub");
        assert_eq!(names.lease_container(), "ordershub-leases");
        assert_eq!(names.work_item_queue(), "ordershub-workitems");
        assert_eq!(names.control_queue(0), "ordershub-control-00");
        assert_eq!(names.control_queue(13), "ordershub-control-13");
    }
}
